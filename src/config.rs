//! TOML configuration with defaults, environment overrides, and
//! validation.
//!
//! Every section and field is optional in the file; anything omitted falls
//! back to the constants in [`crate::defaults`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::asr::{DecodeStrategy, FeatureConfig};
use crate::defaults;
use crate::error::{Result, VoxscribeError};
use crate::pipeline::PipelineConfig;
use crate::speaker::MatcherConfig;
use crate::vad::VadConfig;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vad: VadSection,
    pub speaker: SpeakerSection,
    pub asr: AsrSection,
    pub pipeline: PipelineSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadSection {
    pub sample_rate: u32,
    pub chunk_samples: usize,
    pub context_samples: usize,
    pub state_dim: usize,
    pub speech_threshold: f32,
    pub min_speech_frames: u32,
    pub min_silence_frames: u32,
    pub min_segment_secs: f32,
}

impl Default for VadSection {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            chunk_samples: defaults::CHUNK_SAMPLES,
            context_samples: defaults::CONTEXT_SAMPLES,
            state_dim: defaults::VAD_STATE_DIM,
            speech_threshold: defaults::SPEECH_THRESHOLD,
            min_speech_frames: defaults::MIN_SPEECH_FRAMES,
            min_silence_frames: defaults::MIN_SILENCE_FRAMES,
            min_segment_secs: defaults::MIN_SEGMENT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerSection {
    pub boundary_threshold: f32,
    pub auto_learn_threshold: f32,
    pub conflict_margin: f32,
}

impl Default for SpeakerSection {
    fn default() -> Self {
        Self {
            boundary_threshold: defaults::BOUNDARY_THRESHOLD,
            auto_learn_threshold: defaults::AUTO_LEARN_THRESHOLD,
            conflict_margin: defaults::CONFLICT_MARGIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsrSection {
    /// `"ctc"` or `"autoregressive"`.
    pub strategy: String,
    pub n_mels: usize,
    pub lfr_stack: usize,
    pub lfr_skip: usize,
    pub fixed_frames: usize,
    pub max_tokens: usize,
}

impl Default for AsrSection {
    fn default() -> Self {
        Self {
            strategy: "ctc".to_string(),
            n_mels: defaults::N_MELS,
            lfr_stack: defaults::LFR_STACK,
            lfr_skip: defaults::LFR_SKIP,
            fixed_frames: defaults::FIXED_FRAMES,
            max_tokens: defaults::MAX_DECODE_TOKENS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub auto_learn: bool,
    pub chunk_capacity: usize,
    pub segment_capacity: usize,
    pub result_capacity: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            auto_learn: true,
            chunk_capacity: defaults::CHUNK_CHANNEL_CAPACITY,
            segment_capacity: defaults::SEGMENT_CHANNEL_CAPACITY,
            result_capacity: defaults::RESULT_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    /// Loads and validates a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parses and validates TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `VOXSCRIBE_*` environment overrides. Unparseable values are
    /// rejected, unset variables leave the file/default value in place.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("VOXSCRIBE_SPEECH_THRESHOLD") {
            self.vad.speech_threshold =
                value
                    .parse()
                    .map_err(|_| VoxscribeError::ConfigInvalidValue {
                        key: "VOXSCRIBE_SPEECH_THRESHOLD".to_string(),
                        message: format!("not a number: {value}"),
                    })?;
        }
        if let Ok(value) = std::env::var("VOXSCRIBE_AUTO_LEARN") {
            self.pipeline.auto_learn =
                value
                    .parse()
                    .map_err(|_| VoxscribeError::ConfigInvalidValue {
                        key: "VOXSCRIBE_AUTO_LEARN".to_string(),
                        message: format!("not a boolean: {value}"),
                    })?;
        }
        if let Ok(value) = std::env::var("VOXSCRIBE_STRATEGY") {
            self.asr.strategy = value;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        fn check(ok: bool, key: &str, message: &str) -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(VoxscribeError::ConfigInvalidValue {
                    key: key.to_string(),
                    message: message.to_string(),
                })
            }
        }

        check(
            self.vad.sample_rate > 0,
            "vad.sample_rate",
            "must be positive",
        )?;
        check(
            self.vad.chunk_samples > 0,
            "vad.chunk_samples",
            "must be positive",
        )?;
        check(
            self.vad.context_samples < self.vad.chunk_samples,
            "vad.context_samples",
            "must be smaller than chunk_samples",
        )?;
        check(
            (0.0..=1.0).contains(&self.vad.speech_threshold),
            "vad.speech_threshold",
            "must be within 0..=1",
        )?;
        check(
            self.vad.min_speech_frames > 0,
            "vad.min_speech_frames",
            "must be positive",
        )?;
        check(
            self.vad.min_silence_frames > 0,
            "vad.min_silence_frames",
            "must be positive",
        )?;
        check(
            self.vad.min_segment_secs >= 0.0,
            "vad.min_segment_secs",
            "must not be negative",
        )?;

        check(
            (0.0..=1.0).contains(&self.speaker.boundary_threshold),
            "speaker.boundary_threshold",
            "must be within 0..=1",
        )?;
        check(
            (0.0..=1.0).contains(&self.speaker.auto_learn_threshold),
            "speaker.auto_learn_threshold",
            "must be within 0..=1",
        )?;
        check(
            self.speaker.auto_learn_threshold >= self.speaker.boundary_threshold,
            "speaker.auto_learn_threshold",
            "must not be below boundary_threshold",
        )?;
        check(
            self.speaker.conflict_margin > 0.0,
            "speaker.conflict_margin",
            "must be positive",
        )?;

        check(
            matches!(self.asr.strategy.as_str(), "ctc" | "autoregressive"),
            "asr.strategy",
            "must be \"ctc\" or \"autoregressive\"",
        )?;
        check(self.asr.n_mels > 0, "asr.n_mels", "must be positive")?;
        check(self.asr.lfr_stack > 0, "asr.lfr_stack", "must be positive")?;
        check(self.asr.lfr_skip > 0, "asr.lfr_skip", "must be positive")?;
        check(
            self.asr.fixed_frames > 0,
            "asr.fixed_frames",
            "must be positive",
        )?;
        check(
            self.asr.max_tokens > 0,
            "asr.max_tokens",
            "must be positive",
        )?;

        check(
            self.pipeline.chunk_capacity > 0,
            "pipeline.chunk_capacity",
            "must be positive",
        )?;
        check(
            self.pipeline.segment_capacity > 0,
            "pipeline.segment_capacity",
            "must be positive",
        )?;
        check(
            self.pipeline.result_capacity > 0,
            "pipeline.result_capacity",
            "must be positive",
        )?;

        Ok(())
    }

    pub fn vad_config(&self) -> VadConfig {
        VadConfig {
            sample_rate: self.vad.sample_rate,
            chunk_samples: self.vad.chunk_samples,
            context_samples: self.vad.context_samples,
            state_dim: self.vad.state_dim,
            speech_threshold: self.vad.speech_threshold,
            min_speech_frames: self.vad.min_speech_frames,
            min_silence_frames: self.vad.min_silence_frames,
            min_segment_secs: self.vad.min_segment_secs,
        }
    }

    pub fn matcher_config(&self) -> MatcherConfig {
        MatcherConfig {
            boundary_threshold: self.speaker.boundary_threshold,
            auto_learn_threshold: self.speaker.auto_learn_threshold,
            conflict_margin: self.speaker.conflict_margin,
        }
    }

    pub fn feature_config(&self) -> FeatureConfig {
        FeatureConfig {
            n_mels: self.asr.n_mels,
            lfr_stack: self.asr.lfr_stack,
            lfr_skip: self.asr.lfr_skip,
            fixed_frames: self.asr.fixed_frames,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            vad: self.vad_config(),
            auto_learn: self.pipeline.auto_learn,
            chunk_capacity: self.pipeline.chunk_capacity,
            segment_capacity: self.pipeline.segment_capacity,
            result_capacity: self.pipeline.result_capacity,
        }
    }

    /// The validated decode strategy.
    pub fn strategy(&self) -> DecodeStrategy {
        match self.asr.strategy.as_str() {
            "autoregressive" => DecodeStrategy::Autoregressive,
            _ => DecodeStrategy::Ctc,
        }
    }
}
