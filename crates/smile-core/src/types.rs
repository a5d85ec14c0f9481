use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, in original-frame pixel coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl FaceBox {
    /// Intersection-over-union with another box. Returns 0.0 for disjoint boxes.
    pub fn iou(&self, other: &FaceBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.width * self.height + other.width * other.height - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }
}

/// Per-class expression confidences, each in [0, 1], softmax-normalized.
///
/// Field order matches the FER+ output head: neutral, happiness, surprise,
/// sadness, anger, disgust, fear, contempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpressionScores {
    pub neutral: f32,
    pub happy: f32,
    pub surprise: f32,
    pub sad: f32,
    pub anger: f32,
    pub disgust: f32,
    pub fear: f32,
    pub contempt: f32,
}

impl ExpressionScores {
    /// Build from an 8-element logit/probability slice in FER+ class order.
    pub fn from_slice(v: &[f32; 8]) -> Self {
        Self {
            neutral: v[0],
            happy: v[1],
            surprise: v[2],
            sad: v[3],
            anger: v[4],
            disgust: v[5],
            fear: v[6],
            contempt: v[7],
        }
    }

    /// Name and confidence of the highest-scoring class.
    pub fn dominant(&self) -> (&'static str, f32) {
        let all = [
            ("neutral", self.neutral),
            ("happy", self.happy),
            ("surprise", self.surprise),
            ("sad", self.sad),
            ("anger", self.anger),
            ("disgust", self.disgust),
            ("fear", self.fear),
            ("contempt", self.contempt),
        ];
        all.into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or(("neutral", 0.0))
    }
}

/// A detected face together with its expression confidences.
#[derive(Debug, Clone)]
pub struct Detection {
    pub face: FaceBox,
    pub expressions: ExpressionScores,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bx(x: f32, y: f32, w: f32, h: f32) -> FaceBox {
        FaceBox {
            x,
            y,
            width: w,
            height: h,
            confidence: 1.0,
        }
    }

    #[test]
    fn test_iou_identical() {
        let a = bx(10.0, 10.0, 50.0, 50.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = bx(0.0, 0.0, 10.0, 10.0);
        let b = bx(100.0, 100.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        // b covers the right half of a
        let a = bx(0.0, 0.0, 20.0, 10.0);
        let b = bx(10.0, 0.0, 10.0, 10.0);
        // inter = 100, union = 200 + 100 - 100 = 200
        assert!((a.iou(&b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_dominant_picks_happy() {
        let scores = ExpressionScores {
            happy: 0.95,
            neutral: 0.05,
            ..Default::default()
        };
        let (name, conf) = scores.dominant();
        assert_eq!(name, "happy");
        assert!((conf - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_from_slice_order() {
        let scores = ExpressionScores::from_slice(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8]);
        assert_eq!(scores.neutral, 0.1);
        assert_eq!(scores.happy, 0.2);
        assert_eq!(scores.contempt, 0.8);
    }
}
