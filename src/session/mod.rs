//! Per-application mute and volume restore on top of the OS mixer.

#[cfg(target_os = "macos")]
mod applescript;
#[cfg(all(unix, not(target_os = "macos")))]
mod pulse;
#[cfg(windows)]
mod wasapi;

use std::collections::HashMap;

use thiserror::Error;

use crate::target::TargetProfile;
use crate::{log_debug, log_info, log_warn};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The mixer API itself is missing. Permanent for this run.
    #[error("audio session control unavailable: {0}")]
    Unavailable(String),
    /// A single call failed. Worth retrying on a later tick.
    #[error("audio session call failed: {0:#}")]
    Call(#[from] anyhow::Error),
}

/// One audio stream owned by the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId {
    /// Stable while the stream exists (`sink-input:42`, `wasapi:<session instance id>`).
    pub key: String,
    pub label: String,
}

pub trait SessionBackend {
    fn sessions(&mut self, profile: &TargetProfile) -> Result<Vec<SessionId>, SessionError>;
    /// Volume in `[0, 1]`.
    fn volume(&mut self, session: &SessionId) -> Result<f32, SessionError>;
    fn set_volume(&mut self, session: &SessionId, volume: f32) -> Result<(), SessionError>;
    fn set_mute(&mut self, session: &SessionId, muted: bool) -> Result<(), SessionError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSessionState {
    pub is_muted: bool,
    /// Only meaningful while `is_muted`.
    pub original_volume: f32,
}

impl Default for AudioSessionState {
    fn default() -> Self {
        Self {
            is_muted: false,
            original_volume: 1.0,
        }
    }
}

/// Volume captured before muting one session.
struct Snapshot {
    session: SessionId,
    volume: f32,
}

pub struct AudioSessionController {
    backend: Box<dyn SessionBackend>,
    profile: TargetProfile,
    state: AudioSessionState,
    /// Keyed by `SessionId::key`. An entry lives until its session is restored.
    snapshots: HashMap<String, Snapshot>,
    disabled: bool,
}

impl AudioSessionController {
    pub fn new(backend: Box<dyn SessionBackend>, profile: TargetProfile) -> Self {
        Self {
            backend,
            profile,
            state: AudioSessionState::default(),
            snapshots: HashMap::new(),
            disabled: false,
        }
    }

    pub fn state(&self) -> AudioSessionState {
        self.state
    }

    pub fn is_muted(&self) -> bool {
        self.state.is_muted
    }

    /// False once the platform mixer turned out to be missing.
    pub fn is_available(&self) -> bool {
        !self.disabled
    }

    /// Idempotent: asking for the current state does nothing.
    pub fn set_muted(&mut self, muted: bool) {
        if self.disabled || muted == self.state.is_muted {
            return;
        }

        let sessions = match self.backend.sessions(&self.profile) {
            Ok(sessions) => sessions,
            Err(err) => {
                self.handle_error(err);
                return;
            }
        };

        if muted {
            self.mute(&sessions);
        } else {
            self.unmute(&sessions);
        }
    }

    fn mute(&mut self, sessions: &[SessionId]) {
        if sessions.is_empty() {
            log_debug!("no {} audio sessions to mute yet", self.profile.display_name);
            return;
        }

        let mut first_volume = None;
        let mut muted = 0;
        for session in sessions {
            // Without a snapshot there is nothing to restore, so leave it alone.
            let volume = match self.backend.volume(session) {
                Ok(volume) => volume,
                Err(err) => {
                    if self.handle_error(err) {
                        return;
                    }
                    log_debug!("skipping {}: volume unreadable", session.key);
                    continue;
                }
            };
            self.snapshots.insert(
                session.key.clone(),
                Snapshot {
                    session: session.clone(),
                    volume,
                },
            );

            match self.backend.set_mute(session, true) {
                Ok(()) => {
                    muted += 1;
                    first_volume.get_or_insert(volume);
                }
                Err(err) => {
                    if self.handle_error(err) {
                        return;
                    }
                    self.snapshots.remove(&session.key);
                }
            }
        }

        if muted == 0 {
            return;
        }

        self.state = AudioSessionState {
            is_muted: true,
            original_volume: first_volume.unwrap_or(1.0),
        };
        log_info!("Muted {muted} audio session(s)");
    }

    fn unmute(&mut self, sessions: &[SessionId]) {
        let mut restored = 0;
        let mut failed = 0;
        for session in sessions {
            match self.restore(session) {
                Ok(()) => {
                    self.snapshots.remove(&session.key);
                    restored += 1;
                }
                Err(err) => {
                    if self.handle_error(err) {
                        return;
                    }
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            // Stay muted so the next unmute request retries the leftovers.
            log_warn!("{failed} audio session(s) still muted, will retry");
            return;
        }

        // Streams that vanished took their mute with them.
        self.snapshots.clear();
        self.state.is_muted = false;
        if restored > 0 {
            log_info!("Unmuted {restored} audio session(s)");
        } else {
            log_debug!("no audio sessions left to unmute");
        }
    }

    fn restore(&mut self, session: &SessionId) -> Result<(), SessionError> {
        self.backend.set_mute(session, false)?;
        if let Some(snapshot) = self.snapshots.get(&session.key) {
            self.backend.set_volume(session, snapshot.volume)?;
        }
        Ok(())
    }

    /// Returns true when the error disabled the controller.
    fn handle_error(&mut self, err: SessionError) -> bool {
        match err {
            SessionError::Unavailable(reason) => {
                log_warn!("Audio muting disabled: {reason}");
                self.release_snapshots();
                self.disabled = true;
                self.state.is_muted = false;
                true
            }
            SessionError::Call(err) => {
                log_debug!("audio session call failed: {err:#}");
                false
            }
        }
    }

    /// Last attempt to undo every mute applied so far, errors ignored.
    fn release_snapshots(&mut self) {
        for (key, snapshot) in self.snapshots.drain() {
            let unmuted = self.backend.set_mute(&snapshot.session, false);
            let restored = self.backend.set_volume(&snapshot.session, snapshot.volume);
            if unmuted.is_err() || restored.is_err() {
                log_warn!("could not restore {key} before disabling");
            }
        }
    }
}

/// Used where no mixer integration exists.
pub struct UnsupportedMixer;

impl SessionBackend for UnsupportedMixer {
    fn sessions(&mut self, _profile: &TargetProfile) -> Result<Vec<SessionId>, SessionError> {
        Err(SessionError::Unavailable(
            "no per-application mixer on this platform".into(),
        ))
    }

    fn volume(&mut self, _session: &SessionId) -> Result<f32, SessionError> {
        Err(SessionError::Unavailable("unsupported platform".into()))
    }

    fn set_volume(&mut self, _session: &SessionId, _volume: f32) -> Result<(), SessionError> {
        Err(SessionError::Unavailable("unsupported platform".into()))
    }

    fn set_mute(&mut self, _session: &SessionId, _muted: bool) -> Result<(), SessionError> {
        Err(SessionError::Unavailable("unsupported platform".into()))
    }
}

/// Mixer backend for the current OS.
pub fn platform_backend() -> Box<dyn SessionBackend> {
    #[cfg(windows)]
    {
        match wasapi::WasapiMixer::new() {
            Ok(mixer) => Box::new(mixer),
            Err(err) => {
                log_warn!("WASAPI unavailable: {err:#}");
                Box::new(UnsupportedMixer)
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        Box::new(applescript::AppleScriptMixer)
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        Box::new(pulse::PulseMixer::default())
    }

    #[cfg(not(any(windows, unix)))]
    {
        Box::new(UnsupportedMixer)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    pub struct Mixer {
        pub streams: HashMap<String, (f32, bool)>,
        pub unavailable: bool,
        pub fail_calls: bool,
        pub enumerations: usize,
        pub mute_calls: usize,
        /// The next this many `volume` reads fail.
        pub fail_volume_reads: usize,
        /// The next this many unmutes fail.
        pub fail_unmutes: usize,
        /// Muting reports the mixer gone once this many streams were muted.
        pub mixer_lost_after: Option<usize>,
    }

    /// In-memory mixer; mute also drops the volume to zero like the
    /// AppleScript backend does.
    #[derive(Clone, Default)]
    pub struct FakeMixer(pub Rc<RefCell<Mixer>>);

    impl FakeMixer {
        pub fn with_stream(key: &str, volume: f32) -> Self {
            let fake = Self::default();
            fake.add_stream(key, volume);
            fake
        }

        pub fn add_stream(&self, key: &str, volume: f32) {
            self.0
                .borrow_mut()
                .streams
                .insert(key.to_string(), (volume, false));
        }

        pub fn stream(&self, key: &str) -> Option<(f32, bool)> {
            self.0.borrow().streams.get(key).copied()
        }
    }

    impl SessionBackend for FakeMixer {
        fn sessions(&mut self, _profile: &TargetProfile) -> Result<Vec<SessionId>, SessionError> {
            let mut mixer = self.0.borrow_mut();
            mixer.enumerations += 1;
            if mixer.unavailable {
                return Err(SessionError::Unavailable("no mixer".into()));
            }
            if mixer.fail_calls {
                return Err(anyhow!("mixer busy").into());
            }
            let mut keys: Vec<_> = mixer.streams.keys().cloned().collect();
            keys.sort();
            Ok(keys
                .into_iter()
                .map(|key| SessionId {
                    label: key.clone(),
                    key,
                })
                .collect())
        }

        fn volume(&mut self, session: &SessionId) -> Result<f32, SessionError> {
            let mut mixer = self.0.borrow_mut();
            if mixer.fail_volume_reads > 0 {
                mixer.fail_volume_reads -= 1;
                return Err(anyhow!("volume read timed out").into());
            }
            let volume = mixer.streams.get(&session.key).map(|(volume, _)| *volume);
            volume.ok_or_else(|| anyhow!("gone").into())
        }

        fn set_volume(&mut self, session: &SessionId, volume: f32) -> Result<(), SessionError> {
            if let Some(stream) = self.0.borrow_mut().streams.get_mut(&session.key) {
                stream.0 = volume;
            }
            Ok(())
        }

        fn set_mute(&mut self, session: &SessionId, muted: bool) -> Result<(), SessionError> {
            let mut mixer = self.0.borrow_mut();
            mixer.mute_calls += 1;
            if !muted && mixer.fail_unmutes > 0 {
                mixer.fail_unmutes -= 1;
                return Err(anyhow!("unmute rejected").into());
            }
            let already_muted = mixer.streams.values().filter(|(_, m)| *m).count();
            if muted && mixer.mixer_lost_after.is_some_and(|limit| already_muted >= limit) {
                return Err(SessionError::Unavailable("audio service stopped".into()));
            }
            if let Some(stream) = mixer.streams.get_mut(&session.key) {
                stream.1 = muted;
                if muted {
                    stream.0 = 0.0;
                }
            }
            Ok(())
        }
    }
}
