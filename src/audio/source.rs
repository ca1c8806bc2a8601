//! Frame source abstraction for the client.
//!
//! A frame source produces fixed-duration 16-bit mono PCM frames at the
//! configured sample rate. The connection manager paces reads on a frame
//! timer, so implementations only buffer and hand out whatever is ready.

use crate::defaults;
use crate::error::{Result, VoxError};

/// Trait for audio frame producers.
///
/// This trait allows swapping implementations (microphone, WAV file, mock).
pub trait FrameSource: Send {
    /// Start producing audio.
    fn start(&mut self) -> Result<()>;

    /// Stop producing audio.
    fn stop(&mut self) -> Result<()>;

    /// Read the next frame of samples.
    ///
    /// Returns `Ok(Some(frame))` when a frame is ready, `Ok(None)` when the
    /// source is exhausted (file sources), and an empty frame is legal when
    /// the device has nothing buffered yet.
    fn read_frame(&mut self) -> Result<Option<Vec<i16>>>;
}

/// Configuration shared by frame source implementations.
#[derive(Debug, Clone, Copy)]
pub struct FrameSourceConfig {
    pub sample_rate: u32,
    /// Frame duration in milliseconds.
    pub chunk_ms: u32,
}

impl FrameSourceConfig {
    /// Samples per frame at this rate and duration.
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate as usize / 1000) * self.chunk_ms as usize
    }
}

impl Default for FrameSourceConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            chunk_ms: defaults::CHUNK_MS,
        }
    }
}

/// Mock frame source for testing.
#[derive(Debug, Clone)]
pub struct MockFrameSource {
    frames: Vec<Vec<i16>>,
    position: usize,
    repeat: bool,
    is_started: bool,
    should_fail_start: bool,
}

impl MockFrameSource {
    /// Create a mock that yields 10 silent default-size frames.
    pub fn new() -> Self {
        Self {
            frames: vec![vec![0i16; defaults::SAMPLES_PER_FRAME]; 10],
            position: 0,
            repeat: false,
            is_started: false,
            should_fail_start: false,
        }
    }

    /// Configure the mock to yield these frames in order.
    pub fn with_frames(mut self, frames: Vec<Vec<i16>>) -> Self {
        self.frames = frames;
        self
    }

    /// Repeat the frame list forever instead of exhausting.
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Configure the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Check if the source is started.
    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl Default for MockFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for MockFrameSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            return Err(VoxError::AudioCapture {
                message: "mock start failure".to_string(),
            });
        }
        self.is_started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Vec<i16>>> {
        if self.frames.is_empty() {
            return Ok(None);
        }
        if self.position >= self.frames.len() {
            if self.repeat {
                self.position = 0;
            } else {
                return Ok(None);
            }
        }
        let frame = self.frames[self.position].clone();
        self.position += 1;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_samples_per_frame() {
        let config = FrameSourceConfig::default();
        assert_eq!(config.samples_per_frame(), 960);

        let config = FrameSourceConfig {
            sample_rate: 16000,
            chunk_ms: 100,
        };
        assert_eq!(config.samples_per_frame(), 1600);
    }

    #[test]
    fn test_mock_yields_frames_in_order() {
        let mut source =
            MockFrameSource::new().with_frames(vec![vec![1i16; 4], vec![2i16; 4]]);
        source.start().unwrap();

        assert_eq!(source.read_frame().unwrap(), Some(vec![1i16; 4]));
        assert_eq!(source.read_frame().unwrap(), Some(vec![2i16; 4]));
        assert_eq!(source.read_frame().unwrap(), None);
    }

    #[test]
    fn test_mock_repeating() {
        let mut source = MockFrameSource::new()
            .with_frames(vec![vec![1i16; 4]])
            .repeating();

        for _ in 0..5 {
            assert!(source.read_frame().unwrap().is_some());
        }
    }

    #[test]
    fn test_mock_start_failure() {
        let mut source = MockFrameSource::new().with_start_failure();
        assert!(source.start().is_err());
        assert!(!source.is_started());
    }
}
