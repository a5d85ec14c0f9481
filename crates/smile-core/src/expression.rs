//! FER+ expression classifier via ONNX Runtime.
//!
//! Takes a face crop, resizes to the 64x64 FER+ input, and softmaxes the
//! 8-class emotion head into confidences in [0, 1].

use crate::detector::resize_bilinear;
use crate::types::{ExpressionScores, FaceBox};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (different from UltraFace!) ---
const FERPLUS_INPUT_SIZE: usize = 64;
const FERPLUS_CLASSES: usize = 8;
/// FER+ works best with some context around the detector's tight face box.
const FERPLUS_CROP_MARGIN: f32 = 0.2;

#[derive(Error, Debug)]
pub enum ExpressionError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face box lies outside the frame")]
    CropOutOfBounds,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// FER+-based expression classifier.
pub struct ExpressionNet {
    session: Session,
}

impl ExpressionNet {
    /// Load the FER+ ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, ExpressionError> {
        if !Path::new(model_path).exists() {
            return Err(ExpressionError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded FER+ model"
        );

        Ok(Self { session })
    }

    /// Classify the expression of a detected face in a grayscale frame.
    pub fn classify(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        face: &FaceBox,
    ) -> Result<ExpressionScores, ExpressionError> {
        let crop = crop_face(frame, width as usize, height as usize, face)
            .ok_or(ExpressionError::CropOutOfBounds)?;

        let input = Self::preprocess(&crop.data, crop.width, crop.height);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ExpressionError::InferenceFailed(format!("emotion head: {e}")))?;

        if raw.len() != FERPLUS_CLASSES {
            return Err(ExpressionError::InferenceFailed(format!(
                "expected {FERPLUS_CLASSES} emotion logits, got {}",
                raw.len()
            )));
        }

        let mut logits = [0.0f32; FERPLUS_CLASSES];
        logits.copy_from_slice(raw);
        Ok(ExpressionScores::from_slice(&softmax(&logits)))
    }

    /// Resize a face crop to 64x64 and lay it out as a NCHW float tensor.
    /// FER+ takes raw 0–255 pixel values; no mean/std normalization.
    fn preprocess(crop: &[u8], crop_w: usize, crop_h: usize) -> Array4<f32> {
        let size = FERPLUS_INPUT_SIZE;
        let resized = resize_bilinear(crop, crop_w, crop_h, size, size);

        let mut tensor = Array4::<f32>::zeros((1, 1, size, size));
        for y in 0..size {
            for x in 0..size {
                tensor[[0, 0, y, x]] = resized[y * size + x] as f32;
            }
        }
        tensor
    }
}

struct FaceCrop {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

/// Cut the face region (with margin) out of the frame, clamped to frame
/// bounds. Returns `None` when the clamped region has no area.
fn crop_face(frame: &[u8], width: usize, height: usize, face: &FaceBox) -> Option<FaceCrop> {
    let margin_x = face.width * FERPLUS_CROP_MARGIN;
    let margin_y = face.height * FERPLUS_CROP_MARGIN;

    let x0 = ((face.x - margin_x).floor().max(0.0)) as usize;
    let y0 = ((face.y - margin_y).floor().max(0.0)) as usize;
    let x1 = ((face.x + face.width + margin_x).ceil() as usize).min(width);
    let y1 = ((face.y + face.height + margin_y).ceil() as usize).min(height);

    if x1 <= x0 || y1 <= y0 || frame.len() < width * height {
        return None;
    }

    let crop_w = x1 - x0;
    let crop_h = y1 - y0;
    let mut data = Vec::with_capacity(crop_w * crop_h);
    for y in y0..y1 {
        data.extend_from_slice(&frame[y * width + x0..y * width + x1]);
    }

    Some(FaceCrop {
        data,
        width: crop_w,
        height: crop_h,
    })
}

/// Numerically stable softmax over the 8 emotion logits.
fn softmax(logits: &[f32; FERPLUS_CLASSES]) -> [f32; FERPLUS_CLASSES] {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let mut exps = [0.0f32; FERPLUS_CLASSES];
    let mut sum = 0.0f32;
    for (e, &l) in exps.iter_mut().zip(logits.iter()) {
        *e = (l - max).exp();
        sum += *e;
    }
    for e in exps.iter_mut() {
        *e /= sum;
    }
    exps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let out = softmax(&[2.0, 1.0, 0.1, -1.0, 0.0, 3.0, -2.0, 0.5]);
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(out.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_softmax_preserves_order() {
        let out = softmax(&[5.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(out[0] > out[1]);
        assert!(out[1] > out[2]);
    }

    #[test]
    fn test_softmax_large_logits_stable() {
        let out = softmax(&[1000.0, 999.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(out.iter().all(|p| p.is_finite()));
        assert!((out.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_preprocess_output_shape() {
        let crop = vec![128u8; 100 * 80];
        let tensor = ExpressionNet::preprocess(&crop, 100, 80);
        assert_eq!(tensor.shape(), &[1, 1, FERPLUS_INPUT_SIZE, FERPLUS_INPUT_SIZE]);
        // Raw pixel values pass through unscaled.
        assert!((tensor[[0, 0, 0, 0]] - 128.0).abs() < 1e-6);
    }

    #[test]
    fn test_crop_clamps_to_frame() {
        let frame = vec![10u8; 100 * 100];
        // Box with margin extending past the top-left corner.
        let face = FaceBox {
            x: 0.0,
            y: 0.0,
            width: 50.0,
            height: 50.0,
            confidence: 0.9,
        };
        let crop = crop_face(&frame, 100, 100, &face).unwrap();
        assert!(crop.width <= 100 && crop.height <= 100);
        assert_eq!(crop.data.len(), crop.width * crop.height);
    }

    #[test]
    fn test_crop_outside_frame() {
        let frame = vec![0u8; 100 * 100];
        let face = FaceBox {
            x: 500.0,
            y: 500.0,
            width: 50.0,
            height: 50.0,
            confidence: 0.9,
        };
        assert!(crop_face(&frame, 100, 100, &face).is_none());
    }
}
