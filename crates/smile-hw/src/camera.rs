//! V4L2 camera capture via the `v4l` crate.
//!
//! `Camera::open` negotiates a format and fails with a typed error when the
//! device is absent, busy, or permission-denied. `spawn_feed` moves the
//! device onto a dedicated capture thread that publishes the latest
//! grayscale frame over a watch channel; the thread exits once every feed
//! handle has been dropped.

use crate::frame::{self, Frame};
use std::path::Path;
use thiserror::Error;
use tokio::sync::watch;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

/// Fraction of near-black pixels above which a frame is discarded.
const DARK_FRAME_CUTOFF: f32 = 0.95;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("camera access denied: {0}")]
    AccessDenied(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel, extract Y channel).
    Yuyv,
    /// 8-bit grayscale (1 byte/pixel).
    Grey,
}

/// V4L2 camera device handle.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            let text = e.to_string();
            if text.contains("denied") || text.contains("os error 13") {
                CameraError::AccessDenied(device_path.to_string())
            } else if text.contains("busy") || text.contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(CameraError::StreamingNotSupported);
        }

        // Request YUYV at 640x480; accept GREY if the driver insists.
        let mut fmt = device
            .format()
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("failed to get format: {e}")))?;

        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = 640;
        fmt.height = 480;

        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("failed to set format: {e}")))?;

        let pixel_format = if negotiated.fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else if negotiated.fourcc == FourCC::new(b"GREY") {
            PixelFormat::Grey
        } else {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {:?} (need YUYV or GREY)",
                negotiated.fourcc
            )));
        };

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            pixel_format,
        })
    }

    /// Move the camera onto a capture thread that continuously publishes
    /// the newest non-dark frame. The first `warmup_frames` captures are
    /// discarded so auto-exposure can settle.
    pub fn spawn_feed(self, warmup_frames: usize) -> Result<FrameFeed, CameraError> {
        let (tx, rx) = watch::channel::<Option<Frame>>(None);
        let width = self.width;
        let height = self.height;

        std::thread::Builder::new()
            .name("smile-camera".into())
            .spawn(move || self.capture_loop(tx, warmup_frames))
            .map_err(|e| CameraError::CaptureFailed(format!("failed to spawn capture thread: {e}")))?;

        Ok(FrameFeed { rx, width, height })
    }

    fn capture_loop(self, tx: watch::Sender<Option<Frame>>, warmup_frames: usize) {
        tracing::info!(device = %self.device_path, "capture thread started");

        let mut stream = match MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to create mmap stream, capture thread exiting");
                return;
            }
        };

        let mut discarded = 0usize;
        loop {
            if tx.is_closed() {
                break;
            }

            let (buf, meta) = match stream.next() {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to dequeue buffer");
                    continue;
                }
            };

            let gray = match self.buf_to_grayscale(buf) {
                Ok(g) => g,
                Err(e) => {
                    tracing::warn!(error = %e, "frame conversion failed");
                    continue;
                }
            };

            if discarded < warmup_frames {
                discarded += 1;
                continue;
            }
            if frame::is_dark_frame(&gray, DARK_FRAME_CUTOFF) {
                tracing::debug!(seq = meta.sequence, "skipping dark frame");
                continue;
            }

            let _ = tx.send(Some(Frame {
                data: gray,
                width: self.width,
                height: self.height,
                sequence: meta.sequence,
            }));
        }

        tracing::info!(device = %self.device_path, "capture thread exiting");
    }

    /// Convert a raw buffer to grayscale based on the negotiated format.
    fn buf_to_grayscale(&self, buf: &[u8]) -> Result<Vec<u8>, CameraError> {
        let pixels = (self.width * self.height) as usize;

        match self.pixel_format {
            PixelFormat::Grey => {
                if buf.len() < pixels {
                    return Err(CameraError::CaptureFailed(format!(
                        "GREY buffer too short: expected {pixels}, got {}",
                        buf.len()
                    )));
                }
                Ok(buf[..pixels].to_vec())
            }
            PixelFormat::Yuyv => frame::yuyv_to_grayscale(buf, self.width, self.height)
                .map_err(|e| CameraError::CaptureFailed(format!("YUYV conversion failed: {e}"))),
        }
    }
}

/// Clone-safe view of the capture thread's newest frame.
#[derive(Clone)]
pub struct FrameFeed {
    rx: watch::Receiver<Option<Frame>>,
    pub width: u32,
    pub height: u32,
}

impl FrameFeed {
    /// The most recent frame, or `None` before the first capture lands.
    pub fn latest(&self) -> Option<Frame> {
        self.rx.borrow().clone()
    }
}
