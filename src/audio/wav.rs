//! WAV file frame source.
//!
//! Reads a whole WAV file up front, downmixes stereo to mono and resamples
//! to 16kHz if needed, then hands out fixed-duration frames. Paced by the
//! connection manager's frame timer, this replays a recording as if it were
//! live microphone input.

use crate::audio::source::{FrameSource, FrameSourceConfig};
use crate::defaults::SAMPLE_RATE;
use crate::error::{Result, VoxError};
use std::io::Read;
use std::path::Path;

/// Frame source backed by WAV data.
pub struct WavFrameSource {
    samples: Vec<i16>,
    position: usize,
    samples_per_frame: usize,
}

impl WavFrameSource {
    /// Create from a WAV file on disk.
    pub fn open(path: &Path, config: FrameSourceConfig) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| VoxError::AudioCapture {
            message: format!("Failed to open {}: {}", path.display(), e),
        })?;
        Self::from_reader(Box::new(file), config)
    }

    /// Create from any reader (for testing/flexibility).
    pub fn from_reader(reader: Box<dyn Read + Send>, config: FrameSourceConfig) -> Result<Self> {
        let mut wav_reader =
            hound::WavReader::new(reader).map_err(|e| VoxError::AudioCapture {
                message: format!("Failed to parse WAV file: {}", e),
            })?;

        let spec = wav_reader.spec();
        let source_rate = spec.sample_rate;
        let source_channels = spec.channels;

        let raw_samples: Vec<i16> = wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VoxError::AudioCapture {
                message: format!("Failed to read WAV samples: {}", e),
            })?;

        // Convert to mono if stereo
        let mono_samples = if source_channels == 2 {
            raw_samples
                .chunks_exact(2)
                .map(|pair| {
                    let left = pair[0] as i32;
                    let right = pair[1] as i32;
                    ((left + right) / 2) as i16
                })
                .collect()
        } else {
            raw_samples
        };

        // Resample to 16kHz if needed
        let samples = if source_rate != SAMPLE_RATE {
            resample(&mono_samples, source_rate, SAMPLE_RATE)
        } else {
            mono_samples
        };

        Ok(Self {
            samples,
            position: 0,
            samples_per_frame: config.samples_per_frame(),
        })
    }

    /// Total duration of the loaded audio in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.samples.len() as u64 * 1000 / SAMPLE_RATE as u64
    }
}

impl FrameSource for WavFrameSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Vec<i16>>> {
        if self.position >= self.samples.len() {
            return Ok(None);
        }
        let end = (self.position + self.samples_per_frame).min(self.samples.len());
        let frame = self.samples[self.position..end].to_vec();
        self.position = end;
        Ok(Some(frame))
    }
}

/// Linear interpolation resampler.
///
/// Adequate for speech input; anything fancier belongs in the capture
/// pipeline of a real deployment.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if samples.is_empty() || from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let a = samples[idx] as f64;
        let b = samples.get(idx + 1).copied().unwrap_or(samples[idx]) as f64;
        out.push((a + (b - a) * frac) as i16);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn wav_bytes(spec: hound::WavSpec, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &sample in samples {
                writer.write_sample(sample).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn mono_16k_spec() -> hound::WavSpec {
        hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    #[test]
    fn test_reads_mono_16k_into_frames() {
        let samples: Vec<i16> = (0..2400).map(|i| i as i16).collect();
        let bytes = wav_bytes(mono_16k_spec(), &samples);

        let mut source = WavFrameSource::from_reader(
            Box::new(Cursor::new(bytes)),
            FrameSourceConfig::default(),
        )
        .unwrap();

        let first = source.read_frame().unwrap().unwrap();
        assert_eq!(first.len(), 960);
        assert_eq!(first[0], 0);

        let second = source.read_frame().unwrap().unwrap();
        assert_eq!(second.len(), 960);
        assert_eq!(second[0], 960);

        // Trailing partial frame, then exhaustion
        let third = source.read_frame().unwrap().unwrap();
        assert_eq!(third.len(), 480);
        assert_eq!(source.read_frame().unwrap(), None);
    }

    #[test]
    fn test_stereo_downmix() {
        let spec = hound::WavSpec {
            channels: 2,
            ..mono_16k_spec()
        };
        // L=100, R=300 → mono 200
        let samples = vec![100i16, 300, 100, 300];
        let bytes = wav_bytes(spec, &samples);

        let source = WavFrameSource::from_reader(
            Box::new(Cursor::new(bytes)),
            FrameSourceConfig::default(),
        )
        .unwrap();
        assert_eq!(source.samples, vec![200i16, 200]);
    }

    #[test]
    fn test_resamples_to_16k() {
        let spec = hound::WavSpec {
            sample_rate: 32000,
            ..mono_16k_spec()
        };
        let samples = vec![0i16; 3200]; // 100ms at 32kHz
        let bytes = wav_bytes(spec, &samples);

        let source = WavFrameSource::from_reader(
            Box::new(Cursor::new(bytes)),
            FrameSourceConfig::default(),
        )
        .unwrap();
        // 100ms at 16kHz
        assert_eq!(source.samples.len(), 1600);
        assert_eq!(source.duration_ms(), 100);
    }

    #[test]
    fn test_rejects_non_wav_data() {
        let result = WavFrameSource::from_reader(
            Box::new(Cursor::new(vec![1u8, 2, 3, 4])),
            FrameSourceConfig::default(),
        );
        assert!(matches!(result, Err(VoxError::AudioCapture { .. })));
    }

    #[test]
    fn test_resample_linear_midpoints() {
        let out = resample(&[0, 100], 32000, 16000);
        assert_eq!(out[0], 0);
    }
}
