//! Result types flowing out of the pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::asr::DecodeStrategy;

/// Who spoke a segment, as far as the library could tell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SpeakerLabel {
    /// A resolved profile (including freshly auto-enrolled ones).
    Known { name: String },
    /// Two profiles were too close to separate.
    Ambiguous { first: String, second: String },
    /// Embedding extraction failed; no attribution for this segment.
    Unknown,
}

impl fmt::Display for SpeakerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeakerLabel::Known { name } => write!(f, "{}", name),
            SpeakerLabel::Ambiguous { first, second } => write!(f, "[{}/{}?]", first, second),
            SpeakerLabel::Unknown => write!(f, "???"),
        }
    }
}

/// Wall-clock cost of the two per-segment branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SegmentTiming {
    pub decode_ms: u64,
    pub speaker_ms: u64,
}

/// One attributed transcription, emitted per finalized speech segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Decoded text; empty when decoding failed or produced nothing.
    pub text: String,
    /// Text token ids, empty on decode failure.
    pub tokens: Vec<u32>,
    pub speaker: SpeakerLabel,
    pub language: Option<String>,
    /// Stream-relative segment start, seconds.
    pub start_secs: f32,
    /// Segment length, seconds.
    pub duration_secs: f32,
    pub strategy: DecodeStrategy,
    pub timing: SegmentTiming,
}

impl TranscriptionResult {
    /// Whether the text carries anything worth showing.
    pub fn has_text(&self) -> bool {
        self.text.chars().any(char::is_alphanumeric)
    }

    /// One-line rendering in the `[speaker] (start-end) text` shape the
    /// stdout sink prints.
    pub fn display_line(&self) -> String {
        format!(
            "[{}] ({:.1}s-{:.1}s) {}",
            self.speaker,
            self.start_secs,
            self.start_secs + self.duration_secs,
            self.text
        )
    }
}
