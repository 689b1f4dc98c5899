//! Acoustic feature preparation shared by both decoding strategies:
//! log-mel frames from the filterbank port, low-frame-rate stacking, and
//! padding to the fixed frame budget the models were exported with.

use std::sync::Arc;

use crate::defaults;
use crate::error::{Result, VoxscribeError};
use crate::inference::Tensor;

/// Port to the application's mel-filterbank implementation. Returns one
/// log-mel frame per analysis hop.
pub trait MelFilterbank: Send + Sync {
    fn compute(&self, samples: &[f32]) -> Result<Vec<Vec<f32>>>;
    fn n_mels(&self) -> usize;
}

impl<T: MelFilterbank + ?Sized> MelFilterbank for Arc<T> {
    fn compute(&self, samples: &[f32]) -> Result<Vec<Vec<f32>>> {
        (**self).compute(samples)
    }

    fn n_mels(&self) -> usize {
        (**self).n_mels()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureConfig {
    pub n_mels: usize,
    /// Mel frames stacked into each output frame.
    pub lfr_stack: usize,
    /// Mel frames advanced between output frames.
    pub lfr_skip: usize,
    /// Output frame count the model expects; shorter inputs are zero-padded,
    /// longer ones truncated.
    pub fixed_frames: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_mels: defaults::N_MELS,
            lfr_stack: defaults::LFR_STACK,
            lfr_skip: defaults::LFR_SKIP,
            fixed_frames: defaults::FIXED_FRAMES,
        }
    }
}

impl FeatureConfig {
    /// Dimension of one stacked output frame.
    pub fn feature_dim(&self) -> usize {
        self.n_mels * self.lfr_stack
    }
}

pub struct FeatureExtractor {
    mel: Arc<dyn MelFilterbank>,
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(mel: Arc<dyn MelFilterbank>, config: FeatureConfig) -> Self {
        Self { mel, config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Produces the model input tensor, shape `[1, fixed_frames, dim]`.
    pub fn extract(&self, samples: &[f32]) -> Result<Tensor> {
        let frames = self.mel.compute(samples)?;
        if frames.is_empty() {
            return Err(VoxscribeError::FeatureExtraction {
                message: "filterbank produced no frames".to_string(),
            });
        }
        for frame in &frames {
            if frame.len() != self.config.n_mels {
                return Err(VoxscribeError::FeatureExtraction {
                    message: format!(
                        "filterbank frame has {} bands, expected {}",
                        frame.len(),
                        self.config.n_mels
                    ),
                });
            }
        }

        let stacked = self.stack_lfr(&frames);
        let padded = self.pad_or_truncate(stacked);

        let dim = self.config.feature_dim();
        let data: Vec<f32> = padded.into_iter().flatten().collect();
        Tensor::new(vec![1, self.config.fixed_frames, dim], data)
    }

    /// Low-frame-rate stacking: each output frame is `lfr_stack` mel frames
    /// flattened, windows advance by `lfr_skip`. The first frame is
    /// replicated on the left and the last on the right so every window is
    /// full.
    fn stack_lfr(&self, frames: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let m = self.config.lfr_stack;
        let n = self.config.lfr_skip;
        let left_pad = (m - 1) / 2;

        let t = frames.len() + left_pad;
        let t_out = t.div_ceil(n);

        let frame_at = |i: usize| -> &[f32] {
            if i < left_pad {
                &frames[0]
            } else {
                let idx = i - left_pad;
                &frames[idx.min(frames.len() - 1)]
            }
        };

        (0..t_out)
            .map(|i| {
                let mut row = Vec::with_capacity(m * self.config.n_mels);
                for j in 0..m {
                    row.extend_from_slice(frame_at(i * n + j));
                }
                row
            })
            .collect()
    }

    fn pad_or_truncate(&self, mut rows: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
        let target = self.config.fixed_frames;
        if rows.len() > target {
            rows.truncate(target);
        } else {
            let dim = self.config.feature_dim();
            while rows.len() < target {
                rows.push(vec![0.0; dim]);
            }
        }
        rows
    }
}

/// Deterministic filterbank for tests: one frame per `hop` samples, frame
/// `t` filled with the value `t`.
pub struct MockMelFilterbank {
    n_mels: usize,
    hop: usize,
    fail: bool,
}

impl MockMelFilterbank {
    pub fn new(n_mels: usize, hop: usize) -> Self {
        Self {
            n_mels,
            hop,
            fail: false,
        }
    }

    pub fn failing(n_mels: usize) -> Self {
        Self {
            n_mels,
            hop: 160,
            fail: true,
        }
    }
}

impl MelFilterbank for MockMelFilterbank {
    fn compute(&self, samples: &[f32]) -> Result<Vec<Vec<f32>>> {
        if self.fail {
            return Err(VoxscribeError::FeatureExtraction {
                message: "mock filterbank configured to fail".to_string(),
            });
        }
        Ok((0..samples.len() / self.hop)
            .map(|t| vec![t as f32; self.n_mels])
            .collect())
    }

    fn n_mels(&self) -> usize {
        self.n_mels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> FeatureConfig {
        FeatureConfig {
            n_mels: 2,
            lfr_stack: 3,
            lfr_skip: 2,
            fixed_frames: 4,
        }
    }

    fn extractor(config: FeatureConfig) -> FeatureExtractor {
        FeatureExtractor::new(Arc::new(MockMelFilterbank::new(config.n_mels, 10)), config)
    }

    #[test]
    fn test_output_shape_is_fixed() {
        let config = small_config();
        let ex = extractor(config);
        let t = ex.extract(&vec![0.0; 100]).unwrap();
        assert_eq!(t.shape(), &[1, 4, 6]);
    }

    #[test]
    fn test_lfr_stacks_and_advances() {
        let config = small_config();
        let ex = extractor(config);
        // 10 mel frames (values 0..9), left pad = 1 copy of frame 0
        let t = ex.extract(&vec![0.0; 100]).unwrap();
        let row0 = &t.data()[0..6];
        // window 0 over padded stream: [0, 0, 1]
        assert_eq!(row0, &[0.0, 0.0, 0.0, 0.0, 1.0, 1.0]);
        let row1 = &t.data()[6..12];
        // window 1 starts at padded index 2: frames [1, 2, 3]
        assert_eq!(row1, &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn test_short_input_right_pads_with_last_frame_then_zeros() {
        let config = small_config();
        let ex = extractor(config);
        // 3 mel frames; padded stream length 4, two LFR windows
        let t = ex.extract(&vec![0.0; 30]).unwrap();
        // window 1 runs off the end: frames [1, 2, 2-replicated]
        let row1 = &t.data()[6..12];
        assert_eq!(row1, &[1.0, 1.0, 2.0, 2.0, 2.0, 2.0]);
        // remaining rows are zero padding
        assert!(t.data()[12..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_long_input_truncates() {
        let config = small_config();
        let ex = extractor(config);
        let t = ex.extract(&vec![0.0; 1000]).unwrap();
        assert_eq!(t.shape(), &[1, 4, 6]);
    }

    #[test]
    fn test_empty_input_is_error() {
        let config = small_config();
        let ex = extractor(config);
        assert!(ex.extract(&[]).is_err());
    }

    #[test]
    fn test_failing_filterbank_propagates() {
        let config = small_config();
        let ex = FeatureExtractor::new(Arc::new(MockMelFilterbank::failing(2)), config);
        assert!(ex.extract(&vec![0.0; 100]).is_err());
    }

    #[test]
    fn test_wrong_band_count_is_error() {
        let config = FeatureConfig {
            n_mels: 4,
            ..small_config()
        };
        // mock produces 2-band frames, config expects 4
        let ex = FeatureExtractor::new(Arc::new(MockMelFilterbank::new(2, 10)), config);
        assert!(ex.extract(&vec![0.0; 100]).is_err());
    }

    #[test]
    fn test_default_feature_dim() {
        assert_eq!(FeatureConfig::default().feature_dim(), 560);
    }
}
