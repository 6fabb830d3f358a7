use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use windows::core::Interface;
use windows::Win32::Foundation::BOOL;
use windows::Win32::Media::Audio::{
    eMultimedia, eRender, IAudioSessionControl2, IAudioSessionManager2, IMMDeviceEnumerator,
    ISimpleAudioVolume, MMDeviceEnumerator,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoTaskMemFree, CLSCTX_ALL, COINIT_MULTITHREADED,
};

use super::{SessionBackend, SessionError, SessionId};
use crate::target::TargetProfile;

/// Per-process sessions on the default render endpoint.
pub struct WasapiMixer {
    volumes: HashMap<String, ISimpleAudioVolume>,
    names: System,
}

impl WasapiMixer {
    pub fn new() -> Result<Self> {
        // S_FALSE (already initialized on this thread) is fine too.
        unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) }
            .ok()
            .context("CoInitializeEx failed")?;

        Ok(Self {
            volumes: HashMap::new(),
            names: System::new(),
        })
    }

    fn process_name(&mut self, pid: u32) -> Option<String> {
        let sys_pid = Pid::from_u32(pid);
        self.names
            .refresh_processes_specifics(ProcessesToUpdate::Some(&[sys_pid]), ProcessRefreshKind::new());
        self.names
            .process(sys_pid)
            .map(|process| process.name().to_string_lossy().into_owned())
    }

    fn session_manager() -> Result<IAudioSessionManager2, SessionError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(|err| SessionError::Unavailable(format!("no audio device enumerator: {err}")))?;
            let device = enumerator
                .GetDefaultAudioEndpoint(eRender, eMultimedia)
                .map_err(|err| anyhow!("no default render endpoint: {err}"))?;
            let manager = device
                .Activate::<IAudioSessionManager2>(CLSCTX_ALL, None)
                .map_err(|err| anyhow!("IAudioSessionManager2 activation failed: {err}"))?;
            Ok(manager)
        }
    }

    /// The session instance identifier stays fixed for the life of the stream,
    /// unlike its position in the enumerator.
    unsafe fn instance_id(control: &IAudioSessionControl2) -> Option<String> {
        let raw = control.GetSessionInstanceIdentifier().ok()?;
        let id = raw.to_string().ok();
        CoTaskMemFree(Some(raw.0 as *const _));
        id.filter(|id| !id.is_empty())
    }

    fn handle(&self, session: &SessionId) -> Result<&ISimpleAudioVolume, SessionError> {
        self.volumes
            .get(&session.key)
            .ok_or_else(|| anyhow!("session {} is gone", session.key).into())
    }
}

impl SessionBackend for WasapiMixer {
    fn sessions(&mut self, profile: &TargetProfile) -> Result<Vec<SessionId>, SessionError> {
        let manager = Self::session_manager()?;
        self.volumes.clear();

        let mut found = Vec::new();
        unsafe {
            let sessions = manager
                .GetSessionEnumerator()
                .map_err(|err| anyhow!("GetSessionEnumerator failed: {err}"))?;
            let count = sessions
                .GetCount()
                .map_err(|err| anyhow!("GetCount failed: {err}"))?;

            for index in 0..count {
                let Ok(control) = sessions.GetSession(index) else {
                    continue;
                };
                let Ok(control2) = control.cast::<IAudioSessionControl2>() else {
                    continue;
                };
                let pid = match control2.GetProcessId() {
                    Ok(pid) if pid != 0 => pid,
                    _ => continue,
                };

                let Some(name) = self.process_name(pid) else {
                    continue;
                };
                if !profile.matches_process(&name) {
                    continue;
                }

                let Ok(volume) = control.cast::<ISimpleAudioVolume>() else {
                    continue;
                };
                let Some(instance) = Self::instance_id(&control2) else {
                    continue;
                };
                let key = format!("wasapi:{instance}");

                self.volumes.insert(key.clone(), volume);
                found.push(SessionId { key, label: name });
            }
        }

        Ok(found)
    }

    fn volume(&mut self, session: &SessionId) -> Result<f32, SessionError> {
        let handle = self.handle(session)?;
        unsafe { handle.GetMasterVolume() }
            .map_err(|err| anyhow!("GetMasterVolume failed: {err}").into())
    }

    fn set_volume(&mut self, session: &SessionId, volume: f32) -> Result<(), SessionError> {
        let handle = self.handle(session)?;
        unsafe { handle.SetMasterVolume(volume.clamp(0.0, 1.0), std::ptr::null()) }
            .map_err(|err| anyhow!("SetMasterVolume failed: {err}").into())
    }

    fn set_mute(&mut self, session: &SessionId, muted: bool) -> Result<(), SessionError> {
        let handle = self.handle(session)?;
        unsafe { handle.SetMute(BOOL::from(muted), std::ptr::null()) }
            .map_err(|err| anyhow!("SetMute failed: {err}").into())
    }
}
