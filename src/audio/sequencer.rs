use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::library::AudioLibrary;
use super::PlaybackEngine;
use crate::{log_debug, log_info, log_warn};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Idle,
    Voice,
    Music,
}

#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    pub stage: Stage,
    pub current_file: Option<PathBuf>,
    /// Consumed front to back; reshuffled from disk when it runs dry.
    pub queue: VecDeque<PathBuf>,
}

/// Announcement, then shuffled ambient music, for as long as an ad runs.
///
/// Completion is polled: the control loop calls [`update`](Self::update)
/// every tick while the sequence is active.
pub struct SubstituteSequencer {
    engine: Box<dyn PlaybackEngine>,
    library: AudioLibrary,
    rng: StdRng,
    state: PlaybackState,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl SubstituteSequencer {
    pub fn new(engine: Box<dyn PlaybackEngine>, library: AudioLibrary) -> Self {
        Self::with_rng(engine, library, StdRng::from_entropy())
    }

    pub fn with_rng(engine: Box<dyn PlaybackEngine>, library: AudioLibrary, rng: StdRng) -> Self {
        Self {
            engine,
            library,
            rng,
            state: PlaybackState::default(),
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    pub fn is_active(&self) -> bool {
        self.state.stage != Stage::Idle
    }

    pub fn start_ad_sequence(&mut self) {
        if self.is_active() {
            return;
        }

        self.refill_queue();

        let voices = self.library.voice_files();
        if let Some(voice) = voices.choose(&mut self.rng) {
            match self.engine.play(voice) {
                Ok(()) => {
                    log_debug!("Playing announcement {}", file_name(voice));
                    self.state.stage = Stage::Voice;
                    self.state.current_file = Some(voice.clone());
                    return;
                }
                Err(err) => log_warn!("Skipping announcement {}: {err:#}", file_name(voice)),
            }
        }

        self.play_next_music();
    }

    /// Advance when the current file has finished.
    pub fn update(&mut self) {
        if !self.is_active() || self.engine.is_busy() {
            return;
        }

        if self.state.stage == Stage::Voice {
            log_debug!("Announcement finished, starting music");
        }
        self.play_next_music();
    }

    pub fn stop(&mut self) {
        if self.is_active() {
            self.engine.stop();
            if let Some(file) = &self.state.current_file {
                log_debug!("Stopped {}", file_name(file));
            }
        }
        self.state = PlaybackState::default();
    }

    fn refill_queue(&mut self) {
        let mut files = self.library.music_files();
        files.shuffle(&mut self.rng);
        self.state.queue = files.into();
    }

    /// Each file gets one attempt per call: what is left of the current
    /// queue, then one fresh reshuffle. Nothing playable ends in Idle.
    fn play_next_music(&mut self) {
        let mut refilled = false;
        loop {
            let Some(next) = self.state.queue.pop_front() else {
                if refilled {
                    break;
                }
                self.refill_queue();
                refilled = true;
                continue;
            };

            match self.engine.play(&next) {
                Ok(()) => {
                    log_debug!("Playing {}", file_name(&next));
                    self.state.stage = Stage::Music;
                    self.state.current_file = Some(next);
                    return;
                }
                Err(err) => log_warn!("Skipping {}: {err:#}", file_name(&next)),
            }
        }

        if self.is_active() {
            log_info!("No playable substitute audio left");
        }
        self.engine.stop();
        self.state = PlaybackState::default();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeEngine;
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn library(voice: &[&str], music: &[&str]) -> (TempDir, AudioLibrary) {
        let tmp = TempDir::new().expect("tempdir");
        for (dir, names) in [("voice", voice), ("music", music)] {
            let dir = tmp.path().join(dir);
            fs::create_dir_all(&dir).expect("mkdir");
            for name in names {
                fs::write(dir.join(name), b"").expect("write");
            }
        }
        let library = AudioLibrary::new(tmp.path());
        (tmp, library)
    }

    fn sequencer(engine: &FakeEngine, library: AudioLibrary) -> SubstituteSequencer {
        SubstituteSequencer::with_rng(Box::new(engine.clone()), library, StdRng::seed_from_u64(7))
    }

    #[test]
    fn voice_then_music() {
        let (_tmp, library) = library(&["hello.mp3"], &["a.mp3", "b.mp3"]);
        let engine = FakeEngine::default();
        let mut seq = sequencer(&engine, library);

        seq.start_ad_sequence();
        assert_eq!(seq.stage(), Stage::Voice);
        assert_eq!(seq.state().queue.len(), 2);

        seq.update();
        assert_eq!(seq.stage(), Stage::Voice, "still busy");

        engine.finish_track();
        seq.update();
        assert_eq!(seq.stage(), Stage::Music);
        assert_eq!(seq.state().queue.len(), 1);
        assert_eq!(engine.played_names()[0], "hello.mp3");
    }

    #[test]
    fn no_voice_goes_straight_to_music() {
        let (_tmp, library) = library(&[], &["a.mp3"]);
        let engine = FakeEngine::default();
        let mut seq = sequencer(&engine, library);

        seq.start_ad_sequence();
        assert_eq!(seq.stage(), Stage::Music);
        assert_eq!(engine.played_names(), vec!["a.mp3"]);
    }

    #[test]
    fn exhausted_queue_is_reshuffled() {
        let (_tmp, library) = library(&[], &["a.mp3", "b.mp3", "c.mp3"]);
        let engine = FakeEngine::default();
        let mut seq = sequencer(&engine, library);

        seq.start_ad_sequence();
        for _ in 0..5 {
            engine.finish_track();
            seq.update();
        }

        let played = engine.played_names();
        assert_eq!(played.len(), 6);
        let mut first_round = played[..3].to_vec();
        first_round.sort();
        assert_eq!(first_round, vec!["a.mp3", "b.mp3", "c.mp3"]);
        assert_eq!(seq.stage(), Stage::Music);
    }

    #[test]
    fn stop_clears_everything() {
        let (_tmp, library) = library(&["v.wav"], &["a.mp3", "b.mp3"]);
        let engine = FakeEngine::default();
        let mut seq = sequencer(&engine, library);

        seq.start_ad_sequence();
        seq.stop();
        assert_eq!(seq.stage(), Stage::Idle);
        assert!(seq.state().queue.is_empty());
        assert!(seq.state().current_file.is_none());
        assert_eq!(engine.0.borrow().stops, 1);
    }

    #[test]
    fn missing_audio_stays_idle() {
        let engine = FakeEngine::default();
        let mut seq = sequencer(&engine, AudioLibrary::empty());

        seq.start_ad_sequence();
        assert_eq!(seq.stage(), Stage::Idle);
        seq.update();
        assert!(engine.played_names().is_empty());
    }

    #[test]
    fn broken_files_are_skipped() {
        let (tmp, library) = library(&[], &["bad.mp3", "good.mp3"]);
        let engine = FakeEngine::default();
        engine
            .0
            .borrow_mut()
            .broken
            .insert(tmp.path().join("music").join("bad.mp3"));
        let mut seq = sequencer(&engine, library);

        seq.start_ad_sequence();
        assert_eq!(seq.stage(), Stage::Music);
        assert_eq!(engine.played_names(), vec!["good.mp3"]);
    }

    #[test]
    fn all_broken_falls_back_to_idle() {
        let (tmp, library) = library(&[], &["bad.mp3"]);
        let engine = FakeEngine::default();
        engine
            .0
            .borrow_mut()
            .broken
            .insert(tmp.path().join("music").join("bad.mp3"));
        let mut seq = sequencer(&engine, library);

        seq.start_ad_sequence();
        assert_eq!(seq.stage(), Stage::Idle);
    }

    #[test]
    fn starting_twice_does_not_restart() {
        let (_tmp, library) = library(&[], &["a.mp3", "b.mp3"]);
        let engine = FakeEngine::default();
        let mut seq = sequencer(&engine, library);

        seq.start_ad_sequence();
        seq.start_ad_sequence();
        assert_eq!(engine.played_names().len(), 1);
    }
}
