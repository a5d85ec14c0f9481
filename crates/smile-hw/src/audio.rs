//! Audio playback via rodio, on a dedicated playback thread.
//!
//! rodio's output stream is not `Send`, so the stream and sink live on one
//! OS thread that services commands over a channel. Queued clips play back
//! to back (a queued voice note starts when the lead-in finishes); a new
//! queue or a stop replaces the sink, so the latest command always wins.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("playback thread exited")]
    ChannelClosed,
}

enum AudioCmd {
    /// Replace whatever is playing with these clips, in order.
    PlayQueue(Vec<PathBuf>),
    /// Stop playback and rewind to the start (an empty, fresh sink).
    StopRewind,
}

/// Clone-safe handle to the playback thread.
#[derive(Clone)]
pub struct AudioHandle {
    tx: mpsc::Sender<AudioCmd>,
}

impl AudioHandle {
    /// Interrupt any in-flight playback and play `clips` back to back.
    pub async fn play_queue(&self, clips: Vec<PathBuf>) -> Result<(), AudioError> {
        self.tx
            .send(AudioCmd::PlayQueue(clips))
            .await
            .map_err(|_| AudioError::ChannelClosed)
    }

    /// Stop any in-flight playback and reset its position to the start.
    pub async fn stop_rewind(&self) -> Result<(), AudioError> {
        self.tx
            .send(AudioCmd::StopRewind)
            .await
            .map_err(|_| AudioError::ChannelClosed)
    }
}

/// Spawn the playback thread. Fails fast when no output device exists.
pub fn spawn_player() -> Result<AudioHandle, AudioError> {
    let (tx, mut rx) = mpsc::channel::<AudioCmd>(8);
    let (init_tx, init_rx) = std::sync::mpsc::channel::<Result<(), AudioError>>();

    std::thread::Builder::new()
        .name("smile-audio".into())
        .spawn(move || {
            let (stream, handle) = match rodio::OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    let _ = init_tx.send(Err(AudioError::DeviceUnavailable(e.to_string())));
                    return;
                }
            };
            let mut sink = match rodio::Sink::try_new(&handle) {
                Ok(s) => s,
                Err(e) => {
                    let _ = init_tx.send(Err(AudioError::DeviceUnavailable(e.to_string())));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));
            tracing::info!("playback thread started");

            while let Some(cmd) = rx.blocking_recv() {
                // Replace the sink: rodio sinks cannot rewind, and a fresh
                // one gives last-write-wins over any in-flight playback.
                sink.stop();
                sink = match rodio::Sink::try_new(&handle) {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to rebuild sink");
                        continue;
                    }
                };

                if let AudioCmd::PlayQueue(clips) = cmd {
                    for clip in clips {
                        match open_clip(&clip) {
                            Ok(source) => sink.append(source),
                            // Playback failures are non-fatal; the mirror
                            // just goes mute for this clip.
                            Err(e) => {
                                tracing::warn!(clip = %clip.display(), error = %e, "skipping clip")
                            }
                        }
                    }
                }
            }

            drop(stream);
            tracing::info!("playback thread exiting");
        })
        .map_err(|e| AudioError::DeviceUnavailable(format!("failed to spawn thread: {e}")))?;

    init_rx.recv().map_err(|_| AudioError::ChannelClosed)??;
    Ok(AudioHandle { tx })
}

fn open_clip(path: &PathBuf) -> Result<rodio::Decoder<BufReader<File>>, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    rodio::Decoder::new(BufReader::new(file)).map_err(|e| e.to_string())
}
