use serde::{Deserialize, Serialize};

/// Identity of the application being watched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TargetProfile {
    /// Name shown in window titles and used for loose title searches.
    pub display_name: String,
    /// Executable names as the OS reports them.
    pub process_names: Vec<String>,
    /// Titles the app shows while idle or paused ("just the app name").
    pub idle_titles: Vec<String>,
}

impl Default for TargetProfile {
    fn default() -> Self {
        Self {
            display_name: "Spotify".into(),
            process_names: default_process_names(),
            idle_titles: vec![
                "Spotify".into(),
                "Spotify Free".into(),
                "Spotify Premium".into(),
            ],
        }
    }
}

fn default_process_names() -> Vec<String> {
    let names: &[&str] = if cfg!(target_os = "windows") {
        &["Spotify.exe"]
    } else if cfg!(target_os = "macos") {
        &["Spotify"]
    } else if cfg!(target_os = "linux") {
        &["spotify", "Spotify"]
    } else {
        &["spotify", "Spotify", "Spotify.exe"]
    };
    names.iter().map(|name| name.to_string()).collect()
}

impl TargetProfile {
    pub fn matches_process(&self, name: &str) -> bool {
        self.process_names.iter().any(|candidate| candidate == name)
    }

    pub fn is_idle_title(&self, title: &str) -> bool {
        let title = title.trim();
        self.idle_titles.iter().any(|idle| idle == title)
    }

    /// Case-insensitive check used by backends that only see loose names
    /// (PulseAudio stream properties, fallback title searches).
    pub fn mentions_app(&self, text: &str) -> bool {
        text.to_lowercase()
            .contains(&self.display_name.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_titles_match_exactly_after_trim() {
        let profile = TargetProfile::default();
        assert!(profile.is_idle_title("Spotify"));
        assert!(profile.is_idle_title("  Spotify Premium "));
        assert!(!profile.is_idle_title("Spotify Premium - Upgrade"));
        assert!(!profile.is_idle_title("spotify"));
    }

    #[test]
    fn process_names_follow_platform_defaults() {
        let profile = TargetProfile::default();
        assert!(!profile.process_names.is_empty());
        for name in &profile.process_names {
            assert!(profile.matches_process(name));
        }
        assert!(!profile.matches_process("notepad"));
    }

    #[test]
    fn mentions_app_ignores_case() {
        let profile = TargetProfile::default();
        assert!(profile.mentions_app("SPOTIFY"));
        assert!(profile.mentions_app("com.spotify.client"));
        assert!(!profile.mentions_app("firefox"));
    }
}
