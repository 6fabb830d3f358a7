use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use super::{SessionBackend, SessionError, SessionId};
use crate::target::TargetProfile;
use crate::utils::command::stdout_of;

/// PulseAudio's 100% volume.
const VOLUME_NORM: f32 = 65536.0;

#[derive(Debug, Deserialize)]
struct ChannelVolume {
    value: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SinkInput {
    index: u32,
    #[serde(default)]
    volume: HashMap<String, ChannelVolume>,
    #[serde(default)]
    properties: HashMap<String, serde_json::Value>,
}

impl SinkInput {
    fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|value| value.as_str())
    }

    fn average_volume(&self) -> f32 {
        if self.volume.is_empty() {
            return 1.0;
        }
        let total: f32 = self
            .volume
            .values()
            .map(|channel| channel.value as f32)
            .sum();
        (total / self.volume.len() as f32 / VOLUME_NORM).clamp(0.0, 1.0)
    }

    /// Matches on `application.name` loosely and on the binary exactly.
    pub(crate) fn belongs_to(&self, profile: &TargetProfile) -> bool {
        let by_name = self
            .property("application.name")
            .map_or(false, |name| profile.mentions_app(name));
        let by_binary = self
            .property("application.process.binary")
            .map_or(false, |binary| profile.matches_process(binary));
        by_name || by_binary
    }
}

pub(crate) fn parse_sink_inputs(json: &str) -> Result<Vec<SinkInput>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json).context("unexpected pactl JSON")
}

fn is_missing_program(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .map_or(false, |io| io.kind() == std::io::ErrorKind::NotFound)
}

fn pactl(args: &[&str]) -> Result<String, SessionError> {
    stdout_of("pactl", args).map_err(|err| {
        if is_missing_program(&err) {
            SessionError::Unavailable("pactl not found (PulseAudio/PipeWire utilities)".into())
        } else {
            SessionError::Call(err)
        }
    })
}

fn sink_index(session: &SessionId) -> Result<String, SessionError> {
    session
        .key
        .strip_prefix("sink-input:")
        .map(str::to_string)
        .ok_or_else(|| anyhow!("not a sink input: {}", session.key).into())
}

/// Sink inputs through `pactl`, which talks to PulseAudio and pipewire-pulse alike.
#[derive(Default)]
pub struct PulseMixer {
    volumes: HashMap<String, f32>,
}

impl SessionBackend for PulseMixer {
    fn sessions(&mut self, profile: &TargetProfile) -> Result<Vec<SessionId>, SessionError> {
        let listing = pactl(&["-f", "json", "list", "sink-inputs"])?;
        let inputs = parse_sink_inputs(&listing)?;

        self.volumes.clear();
        Ok(inputs
            .iter()
            .filter(|input| input.belongs_to(profile))
            .map(|input| {
                let key = format!("sink-input:{}", input.index);
                self.volumes.insert(key.clone(), input.average_volume());
                SessionId {
                    key,
                    label: input
                        .property("application.name")
                        .unwrap_or("unknown")
                        .to_string(),
                }
            })
            .collect())
    }

    fn volume(&mut self, session: &SessionId) -> Result<f32, SessionError> {
        self.volumes
            .get(&session.key)
            .copied()
            .ok_or_else(|| anyhow!("no volume recorded for {}", session.key).into())
    }

    fn set_volume(&mut self, session: &SessionId, volume: f32) -> Result<(), SessionError> {
        let index = sink_index(session)?;
        let raw = ((volume.clamp(0.0, 1.0) * VOLUME_NORM).round() as u32).to_string();
        pactl(&["set-sink-input-volume", &index, &raw]).map(|_| ())
    }

    fn set_mute(&mut self, session: &SessionId, muted: bool) -> Result<(), SessionError> {
        let index = sink_index(session)?;
        let flag = if muted { "1" } else { "0" };
        pactl(&["set-sink-input-mute", &index, flag]).map(|_| ())
    }
}
