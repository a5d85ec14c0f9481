//! The controller owns every long-lived handle — camera feed, detection
//! cadence, audio, slot store — with one lifecycle: construct at startup,
//! tear down when the event loop exits. All state changes flow through a
//! single mpsc event loop, so at most one detection cadence is ever armed.

use crate::config::Config;
use crate::shell::{self, ShellView, CAMERA_DENIED_MESSAGE, IDLE_PROMPT, MODEL_UNAVAILABLE_MESSAGE};
use crate::store::SqliteSlotStore;
use smile_core::poller::{FrameGrab, PollHandle, Poller, PollerState, SmileEvent};
use smile_core::{ComplimentBag, ExpressionProbe, ProbeError, SmilePipeline, VoiceNoteSequencer};
use smile_hw::{AudioHandle, FrameFeed};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const PREVIEW_INTERVAL: Duration = Duration::from_secs(1);
const PREVIEW_COLS: usize = 64;

/// Everything that can make the controller act: a smile from the cadence,
/// a control from the shell, or shutdown.
#[derive(Debug)]
pub enum ControlEvent {
    /// Tagged with the arming sequence so an event from a superseded
    /// cadence cannot fire a reaction after a re-arm.
    Smile { seq: u64, event: SmileEvent },
    OnceMore,
    Reset,
    Shutdown,
}

/// Adapts the camera feed to the poller's frame-source seam.
struct FeedFrames(FrameFeed);

impl FrameGrab for FeedFrames {
    fn grab(&mut self) -> Option<(Vec<u8>, u32, u32)> {
        self.0.latest().map(|f| (f.data, f.width, f.height))
    }
}

/// Shares one detection pipeline across successive cadence arms.
struct SharedProbe(Arc<Mutex<SmilePipeline>>);

impl ExpressionProbe for SharedProbe {
    fn probe(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<smile_core::Detection>, ProbeError> {
        let mut pipeline = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        pipeline.probe(frame, width, height)
    }
}

pub struct Controller {
    cfg: Config,
    view: ShellView,
    audio: Option<AudioHandle>,
    bag: ComplimentBag<SqliteSlotStore>,
    notes: VoiceNoteSequencer,
    feed: Option<FrameFeed>,
    probe: Option<Arc<Mutex<SmilePipeline>>>,
    cadence: Option<PollHandle>,
    state: PollerState,
    arm_seq: u64,
    last_message: String,
    tx: mpsc::Sender<ControlEvent>,
    rx: mpsc::Receiver<ControlEvent>,
}

impl Controller {
    pub fn new(
        cfg: Config,
        feed: Option<FrameFeed>,
        pipeline: Option<SmilePipeline>,
        audio: Option<AudioHandle>,
        store: SqliteSlotStore,
    ) -> Self {
        let (tx, rx) = mpsc::channel(16);
        Self {
            cfg,
            view: ShellView,
            audio,
            bag: ComplimentBag::new(store),
            notes: VoiceNoteSequencer::new(),
            feed,
            probe: pipeline.map(|p| Arc::new(Mutex::new(p))),
            cadence: None,
            state: PollerState::Idle,
            arm_seq: 0,
            last_message: String::new(),
            tx,
            rx,
        }
    }

    /// Sender for external event producers (the shell, ctrl-c).
    pub fn sender(&self) -> mpsc::Sender<ControlEvent> {
        self.tx.clone()
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn message(&self) -> &str {
        &self.last_message
    }

    /// Run until shutdown. Arms the first cadence, then serves events.
    pub async fn run(mut self) {
        self.view.show_controls();
        self.show(IDLE_PROMPT);
        self.arm();

        let preview = self.spawn_preview();

        while let Some(event) = self.rx.recv().await {
            match event {
                ControlEvent::Smile { seq, event }
                    if seq == self.arm_seq && self.state == PollerState::Polling =>
                {
                    self.trigger(event).await;
                }
                ControlEvent::Smile { seq, .. } => {
                    tracing::debug!(seq, current = self.arm_seq, "stale smile event ignored");
                }
                ControlEvent::OnceMore => self.once_more().await,
                ControlEvent::Reset => self.reset().await,
                ControlEvent::Shutdown => break,
            }
        }

        // Teardown: no cadence or preview task may outlive the controller.
        self.cadence.take();
        if let Some(task) = preview {
            task.abort();
        }
        tracing::info!("controller stopped");
    }

    /// Idle → Polling, cancelling any previous cadence first. Stays Idle
    /// (with the matching message) when the camera or model is missing.
    fn arm(&mut self) {
        self.cadence.take();

        let Some(feed) = &self.feed else {
            self.state = PollerState::Idle;
            self.show(CAMERA_DENIED_MESSAGE);
            return;
        };
        let Some(probe) = &self.probe else {
            self.state = PollerState::Idle;
            self.show(MODEL_UNAVAILABLE_MESSAGE);
            return;
        };

        self.arm_seq += 1;
        let seq = self.arm_seq;
        let tx = self.tx.clone();
        let poller = Poller::new(FeedFrames(feed.clone()), SharedProbe(probe.clone()));
        self.cadence = Some(poller.spawn(move |event| {
            let _ = tx.try_send(ControlEvent::Smile { seq, event });
        }));
        self.state = PollerState::Polling;
        tracing::info!(seq, "detection cadence armed");
    }

    /// Polling → Triggered: confetti, lead-in plus sequenced voice note,
    /// and a fresh compliment. Audio and message update are independent.
    async fn trigger(&mut self, event: SmileEvent) {
        self.state = PollerState::Triggered;
        self.cadence.take();
        tracing::info!(
            happy = event.detection.expressions.happy,
            "smile detected, reaction triggered"
        );

        shell::confetti_burst(self.cfg.particle_count, self.cfg.spread_degrees);

        // The cursor advances on every successful trigger, audible or not.
        let note = self.notes.next();
        if let Some(audio) = &self.audio {
            let clips = vec![self.cfg.lead_in_path(), self.cfg.voice_note_path(note)];
            if let Err(err) = audio.play_queue(clips).await {
                tracing::warn!(error = %err, "voice note playback failed");
            }
        }

        match self.bag.next() {
            Ok(compliment) => self.show(&compliment),
            Err(err) => tracing::warn!(error = %err, "compliment draw failed"),
        }
    }

    /// Stop and rewind audio, restore the idle prompt, re-arm polling.
    /// Leaves the persisted pool and the voice-note cursor alone.
    async fn once_more(&mut self) {
        if let Some(audio) = &self.audio {
            if let Err(err) = audio.stop_rewind().await {
                tracing::warn!(error = %err, "audio stop failed");
            }
        }
        self.show(IDLE_PROMPT);
        self.arm();
    }

    /// Once More, plus: drop the persisted pool and rewind the voice notes.
    async fn reset(&mut self) {
        if let Err(err) = self.bag.clear() {
            tracing::warn!(error = %err, "failed to clear compliment pool");
        }
        self.notes.reset();
        tracing::info!("rotation state reset");
        self.once_more().await;
    }

    fn show(&mut self, message: &str) {
        self.last_message = message.to_string();
        self.view.show_message(message);
    }

    fn spawn_preview(&self) -> Option<JoinHandle<()>> {
        if !self.cfg.preview {
            return None;
        }
        let feed = self.feed.clone()?;
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PREVIEW_INTERVAL);
            loop {
                ticker.tick().await;
                if let Some(frame) = feed.latest() {
                    print!("{}", shell::render_preview(&frame, PREVIEW_COLS));
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smile_core::types::{Detection, ExpressionScores, FaceBox};
    use smile_core::COMPLIMENTS;

    fn test_controller() -> (tempfile::TempDir, Controller) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSlotStore::open(&dir.path().join("slots.db")).unwrap();
        let mut cfg = Config::from_env();
        cfg.db_path = dir.path().join("slots.db");
        let controller = Controller::new(cfg, None, None, None, store);
        (dir, controller)
    }

    fn smile_event(happy: f32) -> SmileEvent {
        SmileEvent {
            detection: Detection {
                face: FaceBox {
                    x: 0.0,
                    y: 0.0,
                    width: 10.0,
                    height: 10.0,
                    confidence: 0.99,
                },
                expressions: ExpressionScores {
                    happy,
                    ..Default::default()
                },
            },
        }
    }

    #[tokio::test]
    async fn test_camera_denied_stays_idle_with_fixed_message() {
        let (_dir, mut controller) = test_controller();
        controller.arm();

        assert_eq!(controller.state(), PollerState::Idle);
        assert_eq!(controller.message(), CAMERA_DENIED_MESSAGE);
        assert!(controller.cadence.is_none());
    }

    #[tokio::test]
    async fn test_trigger_advances_rotation_and_shows_compliment() {
        let (_dir, mut controller) = test_controller();
        controller.state = PollerState::Polling;

        controller.trigger(smile_event(0.95)).await;

        assert_eq!(controller.state(), PollerState::Triggered);
        assert!(COMPLIMENTS.contains(&controller.message()));
        assert_eq!(controller.notes.cursor(), 1);
        assert_eq!(
            controller.bag.remaining().unwrap().len(),
            COMPLIMENTS.len() - 1
        );
    }

    #[tokio::test]
    async fn test_reset_clears_pool_and_cursor() {
        let (_dir, mut controller) = test_controller();
        controller.state = PollerState::Polling;
        controller.trigger(smile_event(0.95)).await;
        controller.trigger(smile_event(0.99)).await;
        assert_eq!(controller.notes.cursor(), 2);

        controller.reset().await;

        assert!(controller.bag.remaining().unwrap().is_empty());
        assert_eq!(controller.notes.cursor(), 0);
        // Next draw reproduces first-draw behavior: full refill minus one.
        controller.bag.next().unwrap();
        assert_eq!(
            controller.bag.remaining().unwrap().len(),
            COMPLIMENTS.len() - 1
        );
    }

    #[tokio::test]
    async fn test_once_more_keeps_rotation_state() {
        let (_dir, mut controller) = test_controller();
        controller.state = PollerState::Polling;
        controller.trigger(smile_event(0.95)).await;
        let remaining_before = controller.bag.remaining().unwrap();
        assert_eq!(controller.notes.cursor(), 1);

        controller.once_more().await;

        assert_eq!(controller.bag.remaining().unwrap(), remaining_before);
        assert_eq!(controller.notes.cursor(), 1);
        // No camera in this rig, so re-arm lands back on the denial message.
        assert_eq!(controller.message(), CAMERA_DENIED_MESSAGE);
    }
}
