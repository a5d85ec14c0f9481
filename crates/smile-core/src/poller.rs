//! The detection poller — a fixed-cadence watch for a smiling face.
//!
//! States: Idle → Polling on camera readiness, Polling → Triggered the
//! moment one probe reports `happy` strictly above the threshold. The
//! cadence cancels itself on that transition and never re-arms on its own;
//! returning to Polling takes an explicit control action. Per-tick probe
//! failures and face-less frames are silent.

use crate::types::Detection;
use crate::ExpressionProbe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Wall-clock gap between detector invocations.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A reaction fires only on `happy` confidence strictly greater than this.
pub const HAPPY_THRESHOLD: f32 = 0.9;

/// Where the detection loop currently is. Owned by the controller; the
/// cadence task itself only ever lives through Polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Triggered,
}

/// Emitted at most once per armed cadence, on Polling → Triggered.
#[derive(Debug)]
pub struct SmileEvent {
    pub detection: Detection,
}

/// Supplies the most recent grayscale camera frame, if any has arrived yet.
pub trait FrameGrab: Send {
    fn grab(&mut self) -> Option<(Vec<u8>, u32, u32)>;
}

/// Handle to an armed cadence. At most one may be alive; arming a new one
/// must cancel (or drop) the previous handle first. Dropping cancels.
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A fixed-cadence detection loop over a frame source and a probe.
pub struct Poller<F, P> {
    frames: F,
    probe: P,
    interval: Duration,
    threshold: f32,
}

impl<F, P> Poller<F, P>
where
    F: FrameGrab + 'static,
    P: ExpressionProbe + 'static,
{
    pub fn new(frames: F, probe: P) -> Self {
        Self {
            frames,
            probe,
            interval: POLL_INTERVAL,
            threshold: HAPPY_THRESHOLD,
        }
    }

    /// Arm the cadence. `on_smile` runs exactly once, on the tick whose
    /// probe crosses the threshold; the task exits immediately after.
    pub fn spawn(self, on_smile: impl FnOnce(SmileEvent) + Send + 'static) -> PollHandle {
        let task = tokio::spawn(self.run(on_smile));
        PollHandle { task }
    }

    async fn run(mut self, on_smile: impl FnOnce(SmileEvent) + Send) {
        let mut ticker = tokio::time::interval(self.interval);
        // A slow probe delays its tick rather than bunching catch-up ticks.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some((data, width, height)) = self.frames.grab() else {
                // Camera has not produced a frame yet.
                continue;
            };

            match self.probe.probe(&data, width, height) {
                Err(err) => {
                    tracing::trace!(error = %err, "probe failed this tick");
                }
                Ok(None) => {}
                Ok(Some(detection)) if detection.expressions.happy > self.threshold => {
                    tracing::info!(
                        happy = detection.expressions.happy,
                        "smile detected, cancelling cadence"
                    );
                    on_smile(SmileEvent { detection });
                    return;
                }
                Ok(Some(detection)) => {
                    tracing::trace!(happy = detection.expressions.happy, "below threshold");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExpressionScores, FaceBox};
    use crate::ProbeError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout};

    /// A 2x2 all-gray frame source that is always ready.
    struct StaticFrames;

    impl FrameGrab for StaticFrames {
        fn grab(&mut self) -> Option<(Vec<u8>, u32, u32)> {
            Some((vec![128; 4], 2, 2))
        }
    }

    /// A frame source that never becomes ready.
    struct NoFrames;

    impl FrameGrab for NoFrames {
        fn grab(&mut self) -> Option<(Vec<u8>, u32, u32)> {
            None
        }
    }

    enum Tick {
        Happy(f32),
        NoFace,
        Fail,
    }

    /// Plays back a script of per-tick outcomes, counting invocations.
    /// Repeats the last entry once the script is exhausted.
    struct ScriptedProbe {
        script: VecDeque<Tick>,
        last_happy: f32,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedProbe {
        fn new(script: Vec<Tick>, calls: Arc<AtomicUsize>) -> Self {
            Self {
                script: script.into(),
                last_happy: 0.0,
                calls,
            }
        }
    }

    impl ExpressionProbe for ScriptedProbe {
        fn probe(
            &mut self,
            _frame: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Option<Detection>, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.pop_front() {
                Some(Tick::Fail) => Err(ProbeError::Detector(
                    crate::detector::DetectorError::InferenceFailed("scripted".into()),
                )),
                Some(Tick::NoFace) => Ok(None),
                Some(Tick::Happy(happy)) => {
                    self.last_happy = happy;
                    Ok(Some(detection(happy)))
                }
                None => Ok(Some(detection(self.last_happy))),
            }
        }
    }

    fn detection(happy: f32) -> Detection {
        Detection {
            face: FaceBox {
                x: 0.0,
                y: 0.0,
                width: 2.0,
                height: 2.0,
                confidence: 0.99,
            },
            expressions: ExpressionScores {
                happy,
                ..Default::default()
            },
        }
    }

    fn arm(script: Vec<Tick>) -> (Arc<AtomicUsize>, mpsc::Receiver<SmileEvent>, PollHandle) {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = ScriptedProbe::new(script, calls.clone());
        let (tx, rx) = mpsc::channel(4);
        let handle = Poller::new(StaticFrames, probe).spawn(move |ev| {
            let _ = tx.try_send(ev);
        });
        (calls, rx, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_on_third_tick_then_stops() {
        let (calls, mut rx, _handle) =
            arm(vec![Tick::Happy(0.5), Tick::Happy(0.85), Tick::Happy(0.95)]);

        let ev = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("cadence should trigger")
            .expect("event sent");
        assert!((ev.detection.expressions.happy - 0.95).abs() < 1e-6);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Cadence is cancelled immediately: no further invocations, ever.
        sleep(Duration::from_secs(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_threshold_does_not_trigger() {
        let (calls, mut rx, _handle) = arm(vec![Tick::Happy(0.9)]);

        sleep(Duration::from_millis(1100)).await;
        // Strictly-greater-than: 0.9 never fires, cadence keeps ticking.
        assert!(rx.try_recv().is_err());
        assert!(calls.load(Ordering::SeqCst) >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_200ms_cadence() {
        let (calls, _rx, _handle) = arm(vec![Tick::NoFace]);

        sleep(Duration::from_millis(1100)).await;
        // First tick at t=0, then every 200ms: 0, 200, ..., 1000.
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_is_silent_and_nonfatal() {
        let (calls, mut rx, _handle) =
            arm(vec![Tick::Fail, Tick::Fail, Tick::NoFace, Tick::Happy(0.95)]);

        let ev = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("cadence should survive failures")
            .expect("event sent");
        assert!(ev.detection.expressions.happy > HAPPY_THRESHOLD);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_frames_means_no_probe_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = ScriptedProbe::new(vec![Tick::Happy(0.99)], calls.clone());
        let _handle = Poller::new(NoFrames, probe).spawn(|_| {});

        sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_invocations() {
        let (calls, _rx, handle) = arm(vec![Tick::NoFace]);

        sleep(Duration::from_millis(500)).await;
        let before = calls.load(Ordering::SeqCst);
        assert!(before >= 2);

        handle.cancel();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), before);
    }
}
