//! voxscribe - Real-time speaker-attributed transcription core.
//!
//! Streaming voice activity detection, self-improving speaker profiles,
//! and CTC or autoregressive decoding behind one pipeline. Model
//! inference, audio capture and persistence stay outside the crate,
//! reached through ports the embedding application implements.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod asr;
pub mod audio;
pub mod config;
pub mod defaults;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod speaker;
pub mod vad;

// Core data types
pub use audio::{AudioChunk, SpeechSegment};
pub use inference::{InferenceEngine, ModelId, Tensor};

// Speaker identification
pub use speaker::{
    Confidence, Embedding, EmbeddingExtractor, MatchOutcome, MatcherConfig, SpeakerProfile,
    VoiceLibrary,
};

// Decoding
pub use asr::{AsrDecoder, DecodeStrategy, MelFilterbank, Transcription, Vocabulary};

// VAD
pub use vad::{StreamingVad, VadConfig};

// Pipeline
pub use pipeline::{
    CollectorSink, Pipeline, PipelineConfig, PipelineHandle, PipelinePorts, SpeakerLabel,
    StdoutSink, TranscriptSink, TranscriptionResult,
};

// Station framework (for embedders extending the pipeline)
pub use pipeline::{ErrorReporter, LogReporter, Station, StationError};

// Error handling
pub use error::{Result, VoxscribeError};

// Config
pub use config::Config;
