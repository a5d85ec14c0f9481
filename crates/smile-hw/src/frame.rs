//! Frame type and pixel conversion — YUYV to grayscale, dark-frame check.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("buffer too short: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// A captured grayscale camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
}

/// Convert packed YUYV (4:2:2) to grayscale by extracting the Y channel.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V].
/// Grayscale = every even-indexed byte.
pub fn yuyv_to_grayscale(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }
    Ok(yuyv[..expected].iter().step_by(2).copied().collect())
}

/// True when more than `threshold_pct` of pixels fall in the darkest band
/// (0–31). Used to discard frames captured before auto-exposure settles.
pub fn is_dark_frame(gray: &[u8], threshold_pct: f32) -> bool {
    if gray.is_empty() {
        return true;
    }
    let dark_count = gray.iter().filter(|&&p| p < 32).count();
    (dark_count as f32 / gray.len() as f32) > threshold_pct
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_extracts_y_channel() {
        // 2x1 pixels: [Y0=10, U=20, Y1=30, V=40]
        let yuyv = [10u8, 20, 30, 40];
        let gray = yuyv_to_grayscale(&yuyv, 2, 1).unwrap();
        assert_eq!(gray, vec![10, 30]);
    }

    #[test]
    fn test_yuyv_short_buffer_errors() {
        let err = yuyv_to_grayscale(&[1, 2], 2, 1).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidLength {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_dark_frame_detection() {
        assert!(is_dark_frame(&vec![0u8; 100], 0.95));
        assert!(!is_dark_frame(&vec![200u8; 100], 0.95));
        assert!(is_dark_frame(&[], 0.95));
    }

    #[test]
    fn test_mixed_frame_not_dark() {
        let mut pixels = vec![0u8; 100];
        for p in pixels.iter_mut().take(10) {
            *p = 255;
        }
        // 90% dark is below the 95% cutoff.
        assert!(!is_dark_frame(&pixels, 0.95));
    }
}
