use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutedBy {
    AdPlaying,
    /// Muted during an ad, then the player paused; mute is held.
    PausedHold,
}

/// What the monitor is doing, for phase-change logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    WaitingForProcess,
    WaitingForWindow,
    Unmuted,
    Muted(MutedBy),
}

impl fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorPhase::WaitingForProcess => write!(f, "waiting for the player to start"),
            MonitorPhase::WaitingForWindow => write!(f, "player running, waiting for its window"),
            MonitorPhase::Unmuted => write!(f, "listening"),
            MonitorPhase::Muted(MutedBy::AdPlaying) => write!(f, "muted (ad playing)"),
            MonitorPhase::Muted(MutedBy::PausedHold) => write!(f, "muted (paused during ad)"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoopState {
    pub was_muted: bool,
    pub last_title: String,
    pub ads_blocked: u64,
    pub phase: Option<MonitorPhase>,
}

impl LoopState {
    /// Title memory goes when the target window does; the counter stays.
    pub fn forget_window(&mut self) {
        self.was_muted = false;
        self.last_title.clear();
    }

    /// Record `title`; true when it differs from the previous tick's.
    pub fn observe_title(&mut self, title: &str) -> bool {
        if self.last_title == title {
            return false;
        }
        self.last_title = title.to_string();
        true
    }

    /// Record `phase`; true on change.
    pub fn enter(&mut self, phase: MonitorPhase) -> bool {
        if self.phase == Some(phase) {
            return false;
        }
        self.phase = Some(phase);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_changes_are_reported_once() {
        let mut state = LoopState::default();
        assert!(state.observe_title("A - B"));
        assert!(!state.observe_title("A - B"));
        assert!(state.observe_title("Advertisement"));
    }

    #[test]
    fn forgetting_the_window_keeps_the_counter() {
        let mut state = LoopState {
            was_muted: true,
            last_title: "Advertisement".into(),
            ads_blocked: 3,
            phase: None,
        };
        state.forget_window();
        assert!(!state.was_muted);
        assert!(state.last_title.is_empty());
        assert_eq!(state.ads_blocked, 3);
    }

    #[test]
    fn phase_changes_are_reported_once() {
        let mut state = LoopState::default();
        assert!(state.enter(MonitorPhase::WaitingForProcess));
        assert!(!state.enter(MonitorPhase::WaitingForProcess));
        assert!(state.enter(MonitorPhase::Muted(MutedBy::AdPlaying)));
        assert!(state.enter(MonitorPhase::Muted(MutedBy::PausedHold)));
    }
}
