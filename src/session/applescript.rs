use anyhow::{anyhow, Context};

use super::{SessionBackend, SessionError, SessionId};
use crate::target::TargetProfile;
use crate::utils::command::{applescript_string, osascript};

/// macOS has no per-app mixer, so the target's own `sound volume` stands in
/// for a session. Mute is volume 0; unmute is the controller restoring the
/// snapshot.
pub struct AppleScriptMixer;

fn app(session: &SessionId) -> String {
    applescript_string(&session.label)
}

impl SessionBackend for AppleScriptMixer {
    fn sessions(&mut self, profile: &TargetProfile) -> Result<Vec<SessionId>, SessionError> {
        // Ask System Events first; addressing a closed app directly launches it.
        let script = format!(
            "tell application \"System Events\" to (name of processes) contains {}",
            applescript_string(&profile.display_name)
        );
        let running = osascript(&script)?;
        if running != "true" {
            return Ok(Vec::new());
        }

        Ok(vec![SessionId {
            key: format!("applescript:{}", profile.display_name),
            label: profile.display_name.clone(),
        }])
    }

    fn volume(&mut self, session: &SessionId) -> Result<f32, SessionError> {
        let output = osascript(&format!("tell application {} to get sound volume", app(session)))?;
        let percent: f32 = output
            .trim()
            .parse()
            .with_context(|| format!("unexpected sound volume {output:?}"))?;
        Ok((percent / 100.0).clamp(0.0, 1.0))
    }

    fn set_volume(&mut self, session: &SessionId, volume: f32) -> Result<(), SessionError> {
        let percent = (volume.clamp(0.0, 1.0) * 100.0).round() as u32;
        osascript(&format!(
            "tell application {} to set sound volume to {percent}",
            app(session)
        ))?;
        Ok(())
    }

    fn set_mute(&mut self, session: &SessionId, muted: bool) -> Result<(), SessionError> {
        if !muted {
            return Ok(());
        }
        osascript(&format!("tell application {} to set sound volume to 0", app(session)))
            .map(|_| ())
            .map_err(|err| anyhow!("could not silence {}: {err:#}", session.label).into())
    }
}
