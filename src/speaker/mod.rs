//! Self-improving speaker identification: embeddings, two-layer profiles
//! and the library that matches and grows them.

mod embedding;
mod library;
mod profile;

pub use embedding::{Embedding, EmbeddingExtractor, MockEmbeddingExtractor};
pub use library::{Confidence, MatchOutcome, MatcherConfig, ProfileStats, VoiceLibrary};
pub use profile::{LayerPlacement, SpeakerProfile};
