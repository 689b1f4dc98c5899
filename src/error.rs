//! Error types for voxscribe.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxscribeError {
    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Input validation errors
    #[error("Malformed audio chunk: {reason}")]
    MalformedAudio { reason: String },

    #[error("Tensor shape mismatch: expected {expected}, got {actual}")]
    TensorShape { expected: String, actual: String },

    // Inference port errors
    #[error("Inference failed for {model}: {message}")]
    InferenceFailed { model: String, message: String },

    #[error("Inference for {model} returned {got} outputs, expected {expected}")]
    InferenceOutputArity {
        model: String,
        expected: usize,
        got: usize,
    },

    // Speaker identification errors
    #[error("Embedding extraction failed: {message}")]
    EmbeddingFailed { message: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimension { expected: usize, actual: usize },

    #[error("Unknown speaker: {name}")]
    UnknownSpeaker { name: String },

    // Decoding errors
    #[error("Feature extraction failed: {message}")]
    FeatureExtraction { message: String },

    #[error("Decoding failed: {message}")]
    Decode { message: String },

    // Pipeline lifecycle
    #[error("Pipeline is no longer accepting input")]
    PipelineClosed,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxscribeError>;
