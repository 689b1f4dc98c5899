//! Streaming voice activity detection.

mod engine;

pub use engine::{RecurrentState, StreamingVad, VadConfig};
