//! The control loop: one tick locates the player, reads its window title,
//! classifies it and moves the mute and substitute playback accordingly.

pub mod loop_worker;
pub mod state;

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::audio::sequencer::SubstituteSequencer;
use crate::detection::{looks_like_path, ClassificationResult, Classifier, TitleKind};
use crate::hooks::SessionReporter;
use crate::process::ProcessLocator;
use crate::session::AudioSessionController;
use crate::window::WindowResolver;
use crate::{log_debug, log_info};

use state::{LoopState, MonitorPhase, MutedBy};

const ENABLE_LOGS: bool = true;

pub const NO_PROCESS_INTERVAL: Duration = Duration::from_secs(5);
pub const NO_WINDOW_INTERVAL: Duration = Duration::from_secs(1);
pub const TRANSIENT_TITLE_INTERVAL: Duration = Duration::from_secs(2);
pub const MUTED_INTERVAL: Duration = Duration::from_millis(300);
pub const IDLE_INTERVAL: Duration = Duration::from_secs(1);
pub const AFTER_PANIC_INTERVAL: Duration = Duration::from_secs(5);

/// Content titles shorter than this without a separator are worth a second look.
const SHORT_TITLE_CHARS: usize = 20;

pub struct Monitor {
    locator: ProcessLocator,
    windows: WindowResolver,
    classifier: Classifier,
    audio: AudioSessionController,
    playback: SubstituteSequencer,
    reporter: Box<dyn SessionReporter>,
    state: LoopState,
    started_at: DateTime<Utc>,
    reported: bool,
}

impl Monitor {
    pub fn new(
        locator: ProcessLocator,
        windows: WindowResolver,
        classifier: Classifier,
        audio: AudioSessionController,
        playback: SubstituteSequencer,
        reporter: Box<dyn SessionReporter>,
    ) -> Self {
        Self {
            locator,
            windows,
            classifier,
            audio,
            playback,
            reporter,
            state: LoopState::default(),
            started_at: Utc::now(),
            reported: false,
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn ads_blocked(&self) -> u64 {
        self.state.ads_blocked
    }

    pub fn elapsed_seconds(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }

    /// One pass of the loop. Returns how long to sleep before the next.
    pub fn tick(&mut self) -> Duration {
        let pids = self.locator.find_target_pids();
        if pids.is_empty() {
            if self.is_muted() {
                self.release("player closed");
            }
            self.windows.invalidate();
            self.state.forget_window();
            self.enter(MonitorPhase::WaitingForProcess);
            return NO_PROCESS_INTERVAL;
        }

        let Some(window) = self.windows.resolve_window(&pids) else {
            if self.is_muted() {
                self.release("player window lost");
            }
            self.state.forget_window();
            self.enter(MonitorPhase::WaitingForWindow);
            return NO_WINDOW_INTERVAL;
        };

        let title = window.title.trim();
        if title.is_empty() || looks_like_path(title) {
            log_debug!("ignoring transient title {title:?}");
            if self.state.was_muted {
                self.playback.update();
            }
            return TRANSIENT_TITLE_INTERVAL;
        }

        let result = self.classifier.classify(title);
        if self.state.observe_title(title) {
            self.log_title(title, &result);
        }

        match result.kind {
            TitleKind::Paused => {
                if self.state.was_muted {
                    self.audio.set_muted(true);
                    self.playback.update();
                    self.enter(MonitorPhase::Muted(MutedBy::PausedHold));
                } else {
                    self.enter(MonitorPhase::Unmuted);
                }
            }
            TitleKind::Ad => {
                if self.state.was_muted {
                    // No-op once the controller is muted; picks up streams
                    // that only appeared after the ad started.
                    self.audio.set_muted(true);
                    self.playback.update();
                } else {
                    self.audio.set_muted(true);
                    self.playback.start_ad_sequence();
                    self.state.was_muted = true;
                    self.state.ads_blocked += 1;
                    log_info!(
                        "Ad muted ({:.2}, {}), {} so far",
                        result.confidence,
                        result.reason,
                        self.state.ads_blocked
                    );
                }
                self.enter(MonitorPhase::Muted(MutedBy::AdPlaying));
            }
            TitleKind::Content => {
                if self.is_muted() {
                    self.release("content resumed");
                }
                self.enter(MonitorPhase::Unmuted);
            }
            TitleKind::Indeterminate => return TRANSIENT_TITLE_INTERVAL,
        }

        if self.state.was_muted {
            MUTED_INTERVAL
        } else {
            IDLE_INTERVAL
        }
    }

    /// Unmute and silence substitute audio, whatever the loop believed.
    pub fn restore_audio(&mut self) {
        self.audio.set_muted(false);
        self.playback.stop();
        self.state.was_muted = false;
    }

    /// Restore audio and hand the session totals to the reporter, once.
    pub fn shutdown(&mut self) {
        self.restore_audio();
        if !self.reported {
            self.reported = true;
            let elapsed = self.elapsed_seconds();
            self.reporter.on_session_end(self.state.ads_blocked, elapsed);
        }
    }

    fn is_muted(&self) -> bool {
        self.state.was_muted || self.audio.is_muted()
    }

    fn release(&mut self, why: &str) {
        self.restore_audio();
        log_info!("Unmuted: {why}");
    }

    fn enter(&mut self, phase: MonitorPhase) {
        if self.state.enter(phase) {
            log_info!("Now {phase}");
        }
    }

    fn log_title(&self, title: &str, result: &ClassificationResult) {
        match result.kind {
            TitleKind::Paused => log_info!("[PAUSED] {title}"),
            TitleKind::Ad => log_info!("[AD] {title}"),
            TitleKind::Content => {
                log_info!("[MUSIC] {title}");
                let short = title.chars().count() < SHORT_TITLE_CHARS;
                if short && !title.contains(" - ") {
                    log_info!(
                        "Possible missed ad: {title:?} scored {:.2} ({})",
                        result.confidence,
                        result.reason
                    );
                }
            }
            TitleKind::Indeterminate => log_debug!("[?] {title}"),
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if self.is_muted() || self.playback.is_active() {
            self.restore_audio();
        }
    }
}
