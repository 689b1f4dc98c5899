//! Single-pass CTC decoding: one acoustic inference, greedy arg-max over
//! the per-frame logits, collapse, then token cleanup.

use std::sync::Arc;

use crate::asr::features::FeatureExtractor;
use crate::asr::vocab::Vocabulary;
use crate::asr::{DecodeStrategy, Transcription};
use crate::audio::SpeechSegment;
use crate::defaults;
use crate::error::{Result, VoxscribeError};
use crate::inference::{expect_outputs, InferenceEngine, ModelId, Tensor};

pub struct CtcDecoder {
    engine: Arc<dyn InferenceEngine>,
    features: FeatureExtractor,
    vocab: Arc<Vocabulary>,
    blank_id: u32,
}

impl CtcDecoder {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        features: FeatureExtractor,
        vocab: Arc<Vocabulary>,
    ) -> Self {
        Self {
            engine,
            features,
            vocab,
            blank_id: defaults::CTC_BLANK_ID,
        }
    }

    /// Overrides the blank token id for vocabularies that place it
    /// somewhere other than slot zero.
    pub fn with_blank_id(mut self, blank_id: u32) -> Self {
        self.blank_id = blank_id;
        self
    }

    pub fn decode(&self, segment: &SpeechSegment) -> Result<Transcription> {
        let features = self.features.extract(&segment.samples)?;
        let outputs = self.engine.run(ModelId::CtcAcoustic, &[features])?;
        let logits = expect_outputs(ModelId::CtcAcoustic, outputs, 1)?.remove(0);

        let path = greedy_path(&logits, self.vocab.len())?;
        let tokens = ctc_collapse(&path, self.blank_id);

        // language tag rides in front of the text tokens
        let language = tokens
            .iter()
            .take_while(|id| self.vocab.is_special(**id))
            .find_map(|id| self.vocab.language_tag(*id));
        let text = self.vocab.decode(&tokens);
        let tokens = tokens
            .into_iter()
            .filter(|id| !self.vocab.is_special(*id))
            .collect();

        Ok(Transcription {
            text,
            tokens,
            language,
            strategy: DecodeStrategy::Ctc,
        })
    }
}

/// Per-frame arg-max over logits laid out as `[..., frames, vocab]`.
fn greedy_path(logits: &Tensor, vocab_size: usize) -> Result<Vec<u32>> {
    let data = logits.data();
    if vocab_size == 0 || data.len() % vocab_size != 0 {
        return Err(VoxscribeError::TensorShape {
            expected: format!("multiple of vocab size {vocab_size}"),
            actual: format!("{:?}", logits.shape()),
        });
    }
    Ok(data
        .chunks_exact(vocab_size)
        .map(|frame| {
            frame
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i as u32)
                .unwrap_or(0)
        })
        .collect())
}

/// Collapses a greedy CTC path: consecutive duplicates merge, blanks
/// separate repeats and are dropped.
pub(crate) fn ctc_collapse(path: &[u32], blank_id: u32) -> Vec<u32> {
    let mut tokens = Vec::new();
    let mut prev: Option<u32> = None;
    for &id in path {
        if id != blank_id && prev != Some(id) {
            tokens.push(id);
        }
        prev = Some(id);
    }
    tokens
}
