//! Audio frame production: sources, capture and file replay.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod source;
pub mod wav;

pub use source::{FrameSource, FrameSourceConfig, MockFrameSource};
pub use wav::WavFrameSource;
