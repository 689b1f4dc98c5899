//! Autoregressive decoding: one encoder pass over the features, then a
//! greedy token-by-token loop that feeds the growing sequence back through
//! the decoder model until EOS or the token budget.

use std::collections::HashSet;
use std::sync::Arc;

use crate::asr::features::FeatureExtractor;
use crate::asr::vocab::Vocabulary;
use crate::asr::{DecodeStrategy, Transcription};
use crate::audio::SpeechSegment;
use crate::defaults;
use crate::error::{Result, VoxscribeError};
use crate::inference::{expect_outputs, InferenceEngine, ModelId, Tensor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoregressiveConfig {
    /// Start-of-transcript token.
    pub sot_id: u32,
    /// Language tag to decode in.
    pub language_id: u32,
    /// Task token (transcribe vs translate).
    pub task_id: u32,
    /// Disables timestamp emission.
    pub no_timestamps_id: u32,
    pub eos_id: u32,
    /// Token ids never emitted, regardless of their logit.
    pub suppressed: Vec<u32>,
    pub max_tokens: usize,
}

impl AutoregressiveConfig {
    fn preamble(&self) -> Vec<u32> {
        vec![
            self.sot_id,
            self.language_id,
            self.task_id,
            self.no_timestamps_id,
        ]
    }
}

impl Default for AutoregressiveConfig {
    fn default() -> Self {
        Self {
            sot_id: 1,
            language_id: 2,
            task_id: 3,
            no_timestamps_id: 4,
            eos_id: 5,
            suppressed: Vec::new(),
            max_tokens: defaults::MAX_DECODE_TOKENS,
        }
    }
}

pub struct AutoregressiveDecoder {
    engine: Arc<dyn InferenceEngine>,
    features: FeatureExtractor,
    vocab: Arc<Vocabulary>,
    config: AutoregressiveConfig,
}

impl AutoregressiveDecoder {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        features: FeatureExtractor,
        vocab: Arc<Vocabulary>,
        config: AutoregressiveConfig,
    ) -> Self {
        Self {
            engine,
            features,
            vocab,
            config,
        }
    }

    pub fn decode(&self, segment: &SpeechSegment) -> Result<Transcription> {
        let features = self.features.extract(&segment.samples)?;
        let outputs = self.engine.run(ModelId::Encoder, &[features])?;
        let encoded = expect_outputs(ModelId::Encoder, outputs, 1)?.remove(0);

        let suppressed: HashSet<u32> = self.config.suppressed.iter().copied().collect();
        let preamble = self.config.preamble();
        let mut tokens = preamble.clone();

        while tokens.len() - preamble.len() < self.config.max_tokens {
            let next = self.next_token(&tokens, &encoded, &suppressed)?;
            if next == self.config.eos_id {
                break;
            }
            tokens.push(next);
        }

        let generated: Vec<u32> = tokens[preamble.len()..].to_vec();
        let language = self.vocab.language_tag(self.config.language_id);
        let text = self.vocab.decode(&generated);
        let generated = generated
            .into_iter()
            .filter(|id| !self.vocab.is_special(*id))
            .collect();

        Ok(Transcription {
            text,
            tokens: generated,
            language,
            strategy: DecodeStrategy::Autoregressive,
        })
    }

    /// One decoder step: the whole token sequence (ids as f32) plus the
    /// encoder output, arg-max over the final position's logits.
    fn next_token(
        &self,
        tokens: &[u32],
        encoded: &Tensor,
        suppressed: &HashSet<u32>,
    ) -> Result<u32> {
        let token_tensor = Tensor::new(
            vec![1, tokens.len()],
            tokens.iter().map(|t| *t as f32).collect(),
        )?;
        let outputs = self
            .engine
            .run(ModelId::Decoder, &[token_tensor, encoded.clone()])?;
        let logits = expect_outputs(ModelId::Decoder, outputs, 1)?.remove(0);

        let vocab_size = self.vocab.len();
        let data = logits.data();
        if vocab_size == 0 || data.len() < vocab_size || data.len() % vocab_size != 0 {
            return Err(VoxscribeError::TensorShape {
                expected: format!("multiple of vocab size {vocab_size}"),
                actual: format!("{:?}", logits.shape()),
            });
        }
        let last = &data[data.len() - vocab_size..];

        last.iter()
            .enumerate()
            .filter(|(i, _)| !suppressed.contains(&(*i as u32)))
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i as u32)
            .ok_or_else(|| VoxscribeError::Decode {
                message: "all vocabulary tokens suppressed".to_string(),
            })
    }
}
