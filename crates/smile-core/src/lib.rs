//! smile-core — Expression detection and reaction logic for Smile Mirror.
//!
//! Detection runs as a two-stage ONNX pipeline: UltraFace finds the face,
//! FER+ classifies its expression. Around that sit the pieces of behavior
//! the mirror is actually about: a compliment bag that never repeats within
//! a cycle, a voice-note sequencer, and the detection poller that watches
//! for a smile at a fixed cadence.

pub mod detector;
pub mod expression;
pub mod poller;
pub mod rotation;
pub mod sequencer;
pub mod store;
pub mod types;

pub use detector::FaceFinder;
pub use expression::ExpressionNet;
pub use poller::{PollHandle, Poller, PollerState, SmileEvent};
pub use rotation::{ComplimentBag, COMPLIMENTS};
pub use sequencer::{VoiceNoteSequencer, VOICE_NOTES};
pub use store::{MemoryStore, SlotStore, StoreError};
pub use types::{Detection, ExpressionScores, FaceBox};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("face detection: {0}")]
    Detector(#[from] detector::DetectorError),
    #[error("expression classification: {0}")]
    Expression(#[from] expression::ExpressionError),
}

/// One "detect single face with expressions" invocation against a grayscale
/// frame. `Ok(None)` means no face this tick; both that and `Err` are
/// non-fatal to the caller's cadence.
pub trait ExpressionProbe: Send {
    fn probe(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<Detection>, ProbeError>;
}

/// The full detection pipeline: face finder + expression classifier.
pub struct SmilePipeline {
    finder: FaceFinder,
    net: ExpressionNet,
}

impl SmilePipeline {
    pub fn new(finder: FaceFinder, net: ExpressionNet) -> Self {
        Self { finder, net }
    }
}

impl ExpressionProbe for SmilePipeline {
    /// Detect the single most confident face and classify its expression.
    fn probe(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<Detection>, ProbeError> {
        let faces = self.finder.detect(frame, width, height)?;
        let Some(face) = faces.into_iter().next() else {
            return Ok(None);
        };

        let expressions = self.net.classify(frame, width, height, &face)?;
        tracing::trace!(
            face_confidence = face.confidence,
            happy = expressions.happy,
            "probe: face classified"
        );

        Ok(Some(Detection { face, expressions }))
    }
}
