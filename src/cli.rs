use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::detection::{Classifier, TitleKind};
use crate::log_info;
use crate::settings::Settings;

const ENABLE_LOGS: bool = true;

#[derive(Parser, Debug)]
#[command(name = "adhush")]
#[command(about = "Mutes Spotify while it plays ads")]
#[command(version)]
pub struct Args {
    /// Settings file (defaults to <config dir>/adhush/settings.json)
    #[arg(short, long, env = "ADHUSH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Folder holding voice/ and music/ substitute audio
    #[arg(long, env = "ADHUSH_AUDIO_DIR")]
    pub audio_dir: Option<PathBuf>,

    /// Confidence needed to call a title an ad (0.0 - 1.0)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Mute only; do not play substitute audio
    #[arg(long)]
    pub no_substitute: bool,

    /// Write the effective settings, overrides included, back to the settings file
    #[arg(long)]
    pub save_settings: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Watch the player and mute ads (default)
    Run,
    /// Show how window titles would be classified
    Classify {
        #[arg(required = true)]
        titles: Vec<String>,
    },
}

impl Args {
    pub fn settings_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Settings::default_path)
    }

    /// Settings from disk with command-line overrides applied.
    pub fn settings(&self) -> Settings {
        let mut settings = match self.settings_path() {
            Some(path) => Settings::load(&path),
            None => Settings::default(),
        };

        if let Some(dir) = &self.audio_dir {
            settings.audio_dir = Some(dir.clone());
        }
        if let Some(threshold) = self.threshold {
            settings.confidence_threshold = threshold.clamp(0.0, 1.0);
        }
        if self.no_substitute {
            settings.substitute_audio.enabled = false;
        }
        settings
    }

    /// Settings for this run, persisted first when `--save-settings` is given.
    pub fn effective_settings(&self) -> Result<Settings> {
        let settings = self.settings();
        if self.save_settings {
            let path = self
                .settings_path()
                .context("no config directory to save settings into")?;
            settings.save(&path)?;
            log_info!("Saved settings to {}", path.display());
        }
        Ok(settings)
    }
}

const REPORT_THRESHOLDS: &[f64] = &[0.5, 0.6, 0.7, 0.8, 0.9];

fn kind_label(kind: TitleKind) -> &'static str {
    match kind {
        TitleKind::Ad => "AD",
        TitleKind::Content => "CONTENT",
        TitleKind::Paused => "PAUSED",
        TitleKind::Indeterminate => "IGNORED",
    }
}

/// Human-readable classification report for one title.
pub fn classification_report(classifier: &Classifier, title: &str) -> String {
    let result = classifier.classify(title);
    let breakdown = classifier.score_breakdown(title);

    let mut lines = vec![
        format!("{title:?}"),
        format!(
            "  {} (confidence {:.2}, threshold {:.2}): {}",
            kind_label(result.kind),
            result.confidence,
            classifier.threshold(),
            result.reason
        ),
        format!(
            "  pattern score {:.2}, music-shaped: {}, after penalty {:.2}",
            breakdown.raw,
            if breakdown.looks_like_music { "yes" } else { "no" },
            breakdown.penalized
        ),
    ];

    let verdicts: Vec<String> = REPORT_THRESHOLDS
        .iter()
        .map(|threshold| {
            let verdict = classifier.classify_with(title, *threshold);
            format!("{threshold:.1}={}", kind_label(verdict.kind))
        })
        .collect();
    lines.push(format!("  by threshold: {}", verdicts.join(" ")));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{PatternCatalog, DEFAULT_THRESHOLD};
    use crate::target::TargetProfile;

    #[test]
    fn parses_classify_subcommand() {
        let args = Args::parse_from(["adhush", "--threshold", "0.8", "classify", "Advertisement", "Titta nu"]);
        assert_eq!(args.threshold, Some(0.8));
        assert_eq!(
            args.command,
            Some(Command::Classify {
                titles: vec!["Advertisement".into(), "Titta nu".into()]
            })
        );
    }

    #[test]
    fn no_subcommand_means_run() {
        let args = Args::parse_from(["adhush", "--no-substitute", "-v"]);
        assert!(args.command.is_none());
        assert!(args.no_substitute);
        assert!(args.verbose);
    }

    #[test]
    fn overrides_win_over_file() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let config = tmp.path().join("settings.json");
        let args = Args::parse_from([
            "adhush".to_string(),
            "--config".to_string(),
            config.display().to_string(),
            "--threshold".to_string(),
            "1.5".to_string(),
            "--no-substitute".to_string(),
        ]);

        let settings = args.settings();
        assert_eq!(settings.confidence_threshold, 1.0);
        assert!(!settings.substitute_audio.enabled);
    }

    #[test]
    fn report_lists_every_threshold() {
        let classifier = Classifier::new(
            PatternCatalog::new().expect("catalog"),
            TargetProfile::default(),
            DEFAULT_THRESHOLD,
        );
        let report = classification_report(&classifier, "Premium");
        assert!(report.contains("0.5=AD"));
        assert!(report.contains("0.7=CONTENT"));
        assert!(report.contains("0.9=CONTENT"));
    }

    #[test]
    fn save_settings_persists_overrides() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let config = tmp.path().join("adhush").join("settings.json");
        let args = Args::parse_from([
            "adhush".to_string(),
            "--config".to_string(),
            config.display().to_string(),
            "--threshold".to_string(),
            "0.85".to_string(),
            "--save-settings".to_string(),
        ]);

        let settings = args.effective_settings().expect("saved");
        assert_eq!(Settings::load(&config), settings);
        assert_eq!(Settings::load(&config).confidence_threshold, 0.85);
    }

    #[test]
    fn settings_are_not_written_without_the_flag() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let config = tmp.path().join("settings.json");
        let args = Args::parse_from([
            "adhush".to_string(),
            "--config".to_string(),
            config.display().to_string(),
            "--no-substitute".to_string(),
        ]);

        args.effective_settings().expect("settings");
        assert!(!config.exists());
    }
}
