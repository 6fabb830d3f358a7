pub mod library;
pub mod sequencer;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{
    mpsc::{self, RecvTimeoutError, Sender},
    Mutex,
};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

use crate::{log_debug, log_warn};

const ENABLE_LOGS: bool = true;

/// How long a busy query may wait for the audio thread before assuming "busy".
const BUSY_QUERY_TIMEOUT: Duration = Duration::from_millis(250);
const PLAY_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Something that can play one file at a time and say whether it still is.
pub trait PlaybackEngine {
    /// Replace whatever is playing with `path`.
    fn play(&mut self, path: &Path) -> Result<()>;
    fn is_busy(&mut self) -> bool;
    fn stop(&mut self);
}

enum AudioCommand {
    Play {
        path: PathBuf,
        reply: Sender<Result<(), String>>,
    },
    Stop,
    QueryBusy(Sender<bool>),
}

/// rodio output lives on its own thread because `OutputStream` is not `Send`.
/// The thread starts on first use, so a machine without an output device
/// only pays for it when an ad actually plays.
pub struct AudioEngineHandle {
    tx: Mutex<Option<Sender<AudioCommand>>>,
    volume: f32,
}

impl AudioEngineHandle {
    pub fn new(volume: f32) -> Self {
        Self {
            tx: Mutex::new(None),
            volume: volume.clamp(0.0, 1.0),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>> {
        let mut guard = self.tx.lock().map_err(|e| anyhow!("audio sender poisoned: {e}"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let initial_volume = self.volume;

        thread::Builder::new()
            .name("audio-engine".to_string())
            .spawn(move || {
                let mut output: Option<(OutputStream, OutputStreamHandle)> = None;
                let mut sink: Option<Sink> = None;
                let volume = initial_volume;

                fn open_sink(
                    output: &mut Option<(OutputStream, OutputStreamHandle)>,
                    path: &Path,
                    volume: f32,
                ) -> Result<Sink, String> {
                    if output.is_none() {
                        let pair = OutputStream::try_default()
                            .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                        *output = Some(pair);
                    }
                    let handle = match output.as_ref() {
                        Some((_, handle)) => handle,
                        None => return Err("audio output missing".to_string()),
                    };

                    let file = File::open(path)
                        .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
                    let source = Decoder::new(BufReader::new(file))
                        .map_err(|e| format!("Failed to decode {}: {}", path.display(), e))?;
                    let new_sink = Sink::try_new(handle)
                        .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                    new_sink.set_volume(volume);
                    new_sink.append(source);
                    Ok(new_sink)
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play { path, reply } => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                            let result = open_sink(&mut output, &path, volume).map(|new_sink| {
                                sink = Some(new_sink);
                            });
                            let _ = reply.send(result);
                        }
                        AudioCommand::Stop => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                        }
                        AudioCommand::QueryBusy(reply) => {
                            let busy = sink.as_ref().map_or(false, |s| !s.empty());
                            let _ = reply.send(busy);
                        }
                    }
                }
            })
            .map_err(|e| anyhow!("failed to spawn audio thread: {e}"))?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    fn sender(&self) -> Option<Sender<AudioCommand>> {
        self.tx.lock().ok().and_then(|guard| guard.clone())
    }
}

impl PlaybackEngine for AudioEngineHandle {
    fn play(&mut self, path: &Path) -> Result<()> {
        let tx = self.ensure_thread()?;
        let (reply_tx, reply_rx) = mpsc::channel();
        tx.send(AudioCommand::Play {
            path: path.to_path_buf(),
            reply: reply_tx,
        })
        .map_err(|e| anyhow!("audio thread gone: {e}"))?;

        match reply_rx.recv_timeout(PLAY_REPLY_TIMEOUT) {
            Ok(result) => result.map_err(|message| anyhow!(message)),
            Err(err) => Err(anyhow!("audio thread did not answer: {err}")),
        }
    }

    fn is_busy(&mut self) -> bool {
        let Some(tx) = self.sender() else {
            return false;
        };
        let (reply_tx, reply_rx) = mpsc::channel();
        if tx.send(AudioCommand::QueryBusy(reply_tx)).is_err() {
            return false;
        }

        match reply_rx.recv_timeout(BUSY_QUERY_TIMEOUT) {
            Ok(busy) => busy,
            Err(RecvTimeoutError::Timeout) => {
                log_debug!("audio thread slow to answer; assuming still playing");
                true
            }
            Err(RecvTimeoutError::Disconnected) => {
                log_warn!("audio thread exited");
                false
            }
        }
    }

    fn stop(&mut self) {
        if let Some(tx) = self.sender() {
            let _ = tx.send(AudioCommand::Stop);
        }
    }
}
