use std::{fs, path::Path, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::detection::DEFAULT_THRESHOLD;
use crate::target::TargetProfile;
use crate::log_warn;

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SubstituteAudioSettings {
    pub enabled: bool,
    pub volume: f32,
}

impl Default for SubstituteAudioSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub target: TargetProfile,
    /// Root holding `voice/` and `music/`. Looked up next to the binary when unset.
    pub audio_dir: Option<PathBuf>,
    pub confidence_threshold: f64,
    pub process_cache_ms: u64,
    pub window_cache_ms: u64,
    pub substitute_audio: SubstituteAudioSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target: TargetProfile::default(),
            audio_dir: None,
            confidence_threshold: DEFAULT_THRESHOLD,
            process_cache_ms: 2_000,
            window_cache_ms: 500,
            substitute_audio: SubstituteAudioSettings::default(),
        }
    }
}

impl Settings {
    /// `<config dir>/adhush/settings.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("adhush").join("settings.json"))
    }

    /// Missing file gives defaults; a broken one is reported and also gives defaults.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match Self::read(path) {
            Ok(settings) => settings,
            Err(err) => {
                log_warn!("Ignoring settings file: {err:#}");
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid settings in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    pub fn process_cache(&self) -> Duration {
        Duration::from_millis(self.process_cache_ms)
    }

    pub fn window_cache(&self) -> Duration {
        Duration::from_millis(self.window_cache_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let settings = Settings::load(&tmp.path().join("settings.json"));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.window_cache(), Duration::from_millis(500));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("settings.json");
        fs::write(
            &path,
            r#"{"confidence_threshold": 0.8, "target": {"display_name": "Spotify"}}"#,
        )
        .expect("write");

        let settings = Settings::load(&path);
        assert_eq!(settings.confidence_threshold, 0.8);
        assert_eq!(settings.process_cache_ms, 2_000);
        assert_eq!(settings.target.idle_titles.len(), 3);
    }

    #[test]
    fn invalid_file_gives_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("settings.json");
        fs::write(&path, "{ not json").expect("write");
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn save_then_load_keeps_changes() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("nested").join("settings.json");
        let settings = Settings {
            audio_dir: Some(tmp.path().join("audio")),
            substitute_audio: SubstituteAudioSettings {
                enabled: false,
                volume: 0.5,
            },
            ..Settings::default()
        };

        settings.save(&path).expect("save");
        assert_eq!(Settings::load(&path), settings);
    }
}
