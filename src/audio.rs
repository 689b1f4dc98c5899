//! Audio sample types shared across the pipeline.

use crate::error::{Result, VoxscribeError};

/// One fixed-size chunk of mono f32 audio pushed into the pipeline.
///
/// `start_sample` is the offset of the first sample from the beginning of
/// the stream; it only ever increases across the chunks of one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub start_sample: u64,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, start_sample: u64) -> Self {
        Self {
            samples,
            start_sample,
        }
    }

    /// Sample offset one past the last sample in this chunk.
    pub fn end_sample(&self) -> u64 {
        self.start_sample + self.samples.len() as u64
    }

    /// Rejects chunks the VAD model cannot consume: wrong length or
    /// non-finite samples.
    pub fn validate(&self, expected_samples: usize) -> Result<()> {
        if self.samples.len() != expected_samples {
            return Err(VoxscribeError::MalformedAudio {
                reason: format!(
                    "expected {} samples, got {}",
                    expected_samples,
                    self.samples.len()
                ),
            });
        }
        if self.samples.iter().any(|s| !s.is_finite()) {
            return Err(VoxscribeError::MalformedAudio {
                reason: "contains non-finite samples".to_string(),
            });
        }
        Ok(())
    }
}

/// A finalized run of speech produced by the VAD engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSegment {
    pub samples: Vec<f32>,
    pub start_sample: u64,
    pub end_sample: u64,
}

impl SpeechSegment {
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        self.samples.len() as f32 / sample_rate as f32
    }

    /// Stream-relative start time in seconds.
    pub fn start_secs(&self, sample_rate: u32) -> f32 {
        self.start_sample as f32 / sample_rate as f32
    }

    /// Stream-relative end time in seconds.
    pub fn end_secs(&self, sample_rate: u32) -> f32 {
        self.end_sample as f32 / sample_rate as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_end_sample() {
        let chunk = AudioChunk::new(vec![0.0; 512], 1024);
        assert_eq!(chunk.end_sample(), 1536);
    }

    #[test]
    fn test_validate_accepts_correct_chunk() {
        let chunk = AudioChunk::new(vec![0.1; 512], 0);
        assert!(chunk.validate(512).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_length() {
        let chunk = AudioChunk::new(vec![0.1; 100], 0);
        let err = chunk.validate(512).unwrap_err();
        assert!(err.to_string().contains("expected 512 samples"));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let mut samples = vec![0.1; 512];
        samples[7] = f32::NAN;
        let chunk = AudioChunk::new(samples, 0);
        let err = chunk.validate(512).unwrap_err();
        assert!(err.to_string().contains("non-finite"));
    }

    #[test]
    fn test_validate_rejects_infinity() {
        let mut samples = vec![0.1; 512];
        samples[511] = f32::INFINITY;
        let chunk = AudioChunk::new(samples, 0);
        assert!(chunk.validate(512).is_err());
    }

    #[test]
    fn test_segment_times() {
        let segment = SpeechSegment {
            samples: vec![0.0; 16_000],
            start_sample: 8_000,
            end_sample: 24_000,
        };
        assert!((segment.duration_secs(16_000) - 1.0).abs() < 1e-6);
        assert!((segment.start_secs(16_000) - 0.5).abs() < 1e-6);
        assert!((segment.end_secs(16_000) - 1.5).abs() < 1e-6);
    }
}
