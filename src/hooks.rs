//! Narrow interfaces to the pieces that live outside the monitor: version
//! lookup, end-of-session reporting and the support reminder.

use crate::log_info;

const ENABLE_LOGS: bool = true;

/// Rough length of one skipped ad, used for the "time saved" estimate.
pub const SECONDS_PER_AD: u64 = 30;

pub trait VersionSource {
    fn current_app_version(&self) -> String;
}

/// Version baked in at build time.
pub struct PackageVersion;

impl VersionSource for PackageVersion {
    fn current_app_version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

pub trait ReminderPolicy {
    fn should_show_message(&self, ads_blocked: u64) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct EveryNthAd(pub u64);

impl Default for EveryNthAd {
    fn default() -> Self {
        Self(10)
    }
}

impl ReminderPolicy for EveryNthAd {
    fn should_show_message(&self, ads_blocked: u64) -> bool {
        self.0 > 0 && ads_blocked > 0 && ads_blocked % self.0 == 0
    }
}

pub trait SessionReporter {
    /// Called once when monitoring stops. Must not block.
    fn on_session_end(&mut self, ads_blocked: u64, elapsed_seconds: u64);
}

/// Writes the session summary to the log.
pub struct LogReporter {
    reminder: Box<dyn ReminderPolicy>,
}

impl LogReporter {
    pub fn new(reminder: Box<dyn ReminderPolicy>) -> Self {
        Self { reminder }
    }

    /// Lines logged for a finished session, without the logging.
    pub fn summary(&self, ads_blocked: u64, elapsed_seconds: u64) -> Vec<String> {
        let mut lines = vec![format!(
            "Session over: {} ad(s) muted in {}",
            ads_blocked,
            format_duration(elapsed_seconds)
        )];
        if ads_blocked > 0 {
            lines.push(format!(
                "Roughly {} of ads you didn't have to hear",
                format_duration(ads_blocked * SECONDS_PER_AD)
            ));
        }
        if self.reminder.should_show_message(ads_blocked) {
            lines.push(format!(
                "That's {ads_blocked} ads so far. If adhush helps you, consider supporting the project."
            ));
        }
        lines
    }
}

impl SessionReporter for LogReporter {
    fn on_session_end(&mut self, ads_blocked: u64, elapsed_seconds: u64) {
        for line in self.summary(ads_blocked, elapsed_seconds) {
            log_info!("{line}");
        }
    }
}

pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    match (hours, minutes) {
        (0, 0) => format!("{secs}s"),
        (0, _) => format!("{minutes}m {secs}s"),
        _ => format!("{hours}h {minutes}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminder_every_tenth_ad() {
        let policy = EveryNthAd::default();
        assert!(!policy.should_show_message(0));
        assert!(!policy.should_show_message(9));
        assert!(policy.should_show_message(10));
        assert!(policy.should_show_message(20));
        assert!(!EveryNthAd(0).should_show_message(10));
    }

    #[test]
    fn summary_mentions_time_saved() {
        let reporter = LogReporter::new(Box::new(EveryNthAd::default()));
        let lines = reporter.summary(10, 3725);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("10 ad(s)"));
        assert!(lines[0].contains("1h 2m"));
        assert!(lines[1].contains("5m 0s"));
    }

    #[test]
    fn quiet_session_has_one_line() {
        let reporter = LogReporter::new(Box::new(EveryNthAd::default()));
        assert_eq!(reporter.summary(0, 42), vec!["Session over: 0 ad(s) muted in 42s"]);
    }

    #[test]
    fn package_version_is_not_empty() {
        assert!(!PackageVersion.current_app_version().is_empty());
    }
}
