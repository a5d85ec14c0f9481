//! UltraFace face detector via ONNX Runtime.
//!
//! Runs the version-RFB-320 UltraFace model: a single forward pass produces
//! per-anchor scores and boxes in coordinates relative to the input, which
//! are thresholded, mapped back to frame pixels, and NMS-filtered.

use crate::types::FaceBox;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
const ULTRAFACE_INPUT_WIDTH: usize = 320;
const ULTRAFACE_INPUT_HEIGHT: usize = 240;
const ULTRAFACE_MEAN: f32 = 127.0;
const ULTRAFACE_STD: f32 = 128.0;
const ULTRAFACE_CONFIDENCE_THRESHOLD: f32 = 0.7;
const ULTRAFACE_NMS_THRESHOLD: f32 = 0.5;
/// Score tensor lays out [background, face] per anchor.
const ULTRAFACE_CLASSES: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// UltraFace-based face detector.
pub struct FaceFinder {
    session: Session,
    input_width: usize,
    input_height: usize,
}

impl FaceFinder {
    /// Load the UltraFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded UltraFace model"
        );

        Ok(Self {
            session,
            input_width: ULTRAFACE_INPUT_WIDTH,
            input_height: ULTRAFACE_INPUT_HEIGHT,
        })
    }

    /// Detect faces in a grayscale frame, returning boxes sorted by confidence.
    pub fn detect(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceBox>, DetectorError> {
        let input = self.preprocess(frame, width as usize, height as usize);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        // Output 0: scores [1, N, 2]; output 1: boxes [1, N, 4] relative coords.
        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("boxes: {e}")))?;

        let candidates = decode_anchors(
            scores,
            boxes,
            width as f32,
            height as f32,
            ULTRAFACE_CONFIDENCE_THRESHOLD,
        );

        let mut result = nms(candidates, ULTRAFACE_NMS_THRESHOLD);
        result.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(result)
    }

    /// Preprocess a grayscale frame into a NCHW float tensor.
    ///
    /// Plain bilinear stretch to 320x240; UltraFace outputs relative
    /// coordinates, so no letterbox bookkeeping is required to map back.
    fn preprocess(&self, frame: &[u8], width: usize, height: usize) -> Array4<f32> {
        let resized = resize_bilinear(frame, width, height, self.input_width, self.input_height);

        let mut tensor = Array4::<f32>::zeros((1, 3, self.input_height, self.input_width));
        for y in 0..self.input_height {
            for x in 0..self.input_width {
                let pixel = resized[y * self.input_width + x] as f32;
                let normalized = (pixel - ULTRAFACE_MEAN) / ULTRAFACE_STD;
                // Grayscale → 3-channel: replicate Y into R, G, B.
                tensor[[0, 0, y, x]] = normalized;
                tensor[[0, 1, y, x]] = normalized;
                tensor[[0, 2, y, x]] = normalized;
            }
        }
        tensor
    }
}

/// Bilinear-resize a grayscale image. Shared by the detector (full frame)
/// and the expression net (face crop).
pub(crate) fn resize_bilinear(
    src: &[u8],
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
) -> Vec<u8> {
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return vec![0; dst_w * dst_h];
    }

    let scale_x = src_w as f32 / dst_w as f32;
    let scale_y = src_h as f32 / dst_h as f32;
    let mut dst = vec![0u8; dst_w * dst_h];

    for y in 0..dst_h {
        let src_y = (y as f32 + 0.5) * scale_y - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, src_h as i32 - 1) as usize;
        let y1 = (y0 + 1).min(src_h - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..dst_w {
            let src_x = (x as f32 + 0.5) * scale_x - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, src_w as i32 - 1) as usize;
            let x1 = (x0 + 1).min(src_w - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            let tl = src[y0 * src_w + x0] as f32;
            let tr = src[y0 * src_w + x1] as f32;
            let bl = src[y1 * src_w + x0] as f32;
            let br = src[y1 * src_w + x1] as f32;

            let val = tl * (1.0 - fx) * (1.0 - fy)
                + tr * fx * (1.0 - fy)
                + bl * (1.0 - fx) * fy
                + br * fx * fy;

            dst[y * dst_w + x] = val.round().clamp(0.0, 255.0) as u8;
        }
    }
    dst
}

/// Decode raw UltraFace outputs into pixel-space candidate boxes.
///
/// `scores` is [N * 2] ([background, face] per anchor), `boxes` is [N * 4]
/// ([x1, y1, x2, y2] relative to the input, each in [0, 1]).
fn decode_anchors(
    scores: &[f32],
    boxes: &[f32],
    frame_w: f32,
    frame_h: f32,
    threshold: f32,
) -> Vec<FaceBox> {
    let num_anchors = scores.len() / ULTRAFACE_CLASSES;
    let mut candidates = Vec::new();

    for idx in 0..num_anchors {
        let confidence = scores[idx * ULTRAFACE_CLASSES + 1];
        if confidence <= threshold {
            continue;
        }

        let off = idx * 4;
        if off + 3 >= boxes.len() {
            continue;
        }

        let x1 = (boxes[off].clamp(0.0, 1.0)) * frame_w;
        let y1 = (boxes[off + 1].clamp(0.0, 1.0)) * frame_h;
        let x2 = (boxes[off + 2].clamp(0.0, 1.0)) * frame_w;
        let y2 = (boxes[off + 3].clamp(0.0, 1.0)) * frame_h;
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        candidates.push(FaceBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence,
        });
    }

    candidates
}

/// Greedy non-maximum suppression by confidence.
fn nms(mut candidates: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceBox> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_below_threshold() {
        // Two anchors: one at 0.6 (below 0.7), one at 0.9.
        let scores = [0.4, 0.6, 0.1, 0.9];
        let boxes = [0.1, 0.1, 0.3, 0.3, 0.5, 0.5, 0.9, 0.9];
        let out = decode_anchors(&scores, &boxes, 320.0, 240.0, 0.7);
        assert_eq!(out.len(), 1);
        assert!((out[0].confidence - 0.9).abs() < 1e-6);
        assert!((out[0].x - 0.5 * 320.0).abs() < 1e-4);
        assert!((out[0].width - 0.4 * 320.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_rejects_degenerate_box() {
        let scores = [0.1, 0.9];
        let boxes = [0.5, 0.5, 0.5, 0.5]; // zero area
        let out = decode_anchors(&scores, &boxes, 320.0, 240.0, 0.7);
        assert!(out.is_empty());
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let a = FaceBox {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            confidence: 0.95,
        };
        let b = FaceBox {
            x: 5.0,
            y: 5.0,
            width: 100.0,
            height: 100.0,
            confidence: 0.8,
        };
        let c = FaceBox {
            x: 200.0,
            y: 200.0,
            width: 50.0,
            height: 50.0,
            confidence: 0.85,
        };
        let keep = nms(vec![a, b, c], 0.5);
        assert_eq!(keep.len(), 2);
        // Highest-confidence of the overlapping pair survives.
        assert!((keep[0].confidence - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_resize_constant_image() {
        let src = vec![200u8; 8 * 8];
        let dst = resize_bilinear(&src, 8, 8, 4, 4);
        assert_eq!(dst.len(), 16);
        assert!(dst.iter().all(|&p| p == 200));
    }

    #[test]
    fn test_resize_empty_dims() {
        let dst = resize_bilinear(&[], 0, 0, 4, 4);
        assert_eq!(dst, vec![0; 16]);
    }
}
