//! Speech recognition: feature preparation, vocabulary, and the two
//! decoding strategies behind one interface.

mod autoregressive;
mod ctc;
mod features;
mod vocab;

pub use autoregressive::{AutoregressiveConfig, AutoregressiveDecoder};
pub use ctc::CtcDecoder;
pub use features::{FeatureConfig, FeatureExtractor, MelFilterbank, MockMelFilterbank};
pub use vocab::Vocabulary;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::audio::SpeechSegment;
use crate::error::Result;

/// Which decoding strategy a pipeline runs. Chosen once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeStrategy {
    Ctc,
    Autoregressive,
}

impl fmt::Display for DecodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeStrategy::Ctc => write!(f, "ctc"),
            DecodeStrategy::Autoregressive => write!(f, "autoregressive"),
        }
    }
}

/// Decoded text for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    /// Text token ids, specials stripped.
    pub tokens: Vec<u32>,
    /// Language code if the decode surfaced one.
    pub language: Option<String>,
    pub strategy: DecodeStrategy,
}

impl Transcription {
    /// Whether the text carries anything worth showing. Empty and
    /// punctuation-only decodes are noise, but they are still valid
    /// results; attribution metadata survives either way.
    pub fn has_text(&self) -> bool {
        self.text.chars().any(char::is_alphanumeric)
    }
}

/// The decoder a pipeline runs over each speech segment.
pub enum AsrDecoder {
    Ctc(CtcDecoder),
    Autoregressive(AutoregressiveDecoder),
}

impl AsrDecoder {
    pub fn strategy(&self) -> DecodeStrategy {
        match self {
            AsrDecoder::Ctc(_) => DecodeStrategy::Ctc,
            AsrDecoder::Autoregressive(_) => DecodeStrategy::Autoregressive,
        }
    }

    /// Full decode with error detail, for callers that report failures.
    pub fn decode(&self, segment: &SpeechSegment) -> Result<Transcription> {
        match self {
            AsrDecoder::Ctc(d) => d.decode(segment),
            AsrDecoder::Autoregressive(d) => d.decode(segment),
        }
    }

    /// Lossy decode: any internal failure becomes `None` so the caller can
    /// keep the segment's speaker attribution.
    pub fn transcribe(&self, segment: &SpeechSegment) -> Option<Transcription> {
        self.decode(segment).ok()
    }
}
