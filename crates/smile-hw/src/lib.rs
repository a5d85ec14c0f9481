//! smile-hw — Hardware abstraction for the Smile Mirror.
//!
//! Provides V4L2-based camera access (with a background sampler thread
//! publishing the latest frame) and rodio-based audio playback.

pub mod audio;
pub mod camera;
pub mod frame;

pub use audio::{AudioError, AudioHandle};
pub use camera::{Camera, CameraError, FrameFeed, PixelFormat};
pub use frame::Frame;
