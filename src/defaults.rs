//! Default tuning constants for voxscribe.
//!
//! All values can be overridden through [`crate::config::Config`]; these are
//! the baselines that ship with the crate.

/// Audio sample rate in Hz expected by every model port.
pub const SAMPLE_RATE: u32 = 16_000;

/// Samples per VAD chunk (32 ms at 16 kHz).
pub const CHUNK_SAMPLES: usize = 512;

/// Trailing-context samples prepended to each VAD chunk. The recurrent VAD
/// model sees `[context] ++ [chunk]` and the context is refreshed from the
/// tail of every chunk, including chunks whose inference failed.
pub const CONTEXT_SAMPLES: usize = 64;

/// Width of the VAD recurrent hidden and cell state vectors.
pub const VAD_STATE_DIM: usize = 128;

/// Speech probability at or above which a chunk counts as speech.
pub const SPEECH_THRESHOLD: f32 = 0.5;

/// Consecutive speech chunks required to open a segment (~256 ms).
pub const MIN_SPEECH_FRAMES: u32 = 8;

/// Consecutive silence chunks required to close a segment (~320 ms).
pub const MIN_SILENCE_FRAMES: u32 = 10;

/// Segments shorter than this are discarded instead of emitted.
pub const MIN_SEGMENT_SECS: f32 = 0.3;

/// Phase-1 screen: a profile survives matching only if some stored
/// embedding reaches this cosine similarity.
pub const BOUNDARY_THRESHOLD: f32 = 0.35;

/// Similarity at or above which a match is High confidence and the
/// embedding is fed back into the matched profile.
pub const AUTO_LEARN_THRESHOLD: f32 = 0.55;

/// Minimum core-score gap between the top two candidates before a
/// multi-candidate match resolves instead of reporting a conflict.
pub const CONFLICT_MARGIN: f32 = 0.1;

/// Minimum cosine distance to every embedding already in the target layer;
/// near-duplicates are rejected to keep profiles diverse.
pub const MIN_DIVERSITY: f32 = 0.1;

/// Maximum embeddings in a profile's core layer.
pub const MAX_CORE_EMBEDDINGS: usize = 5;

/// Maximum embeddings in a profile's boundary layer.
pub const MAX_BOUNDARY_EMBEDDINGS: usize = 10;

/// Assumed distance spread for a profile until enough history accumulates.
pub const STD_DEV_DEFAULT: f32 = 0.2;

/// Floor applied to the estimated spread once history is available, so a
/// cluster of near-identical samples cannot collapse the acceptance bands.
pub const STD_DEV_FLOOR: f32 = 0.05;

/// Distance samples required before the spread is estimated from history.
pub const MIN_HISTORY_FOR_STD: usize = 3;

/// Mel bands produced by the filterbank port.
pub const N_MELS: usize = 80;

/// Low-frame-rate stacking: frames stacked per output frame.
pub const LFR_STACK: usize = 7;

/// Low-frame-rate stacking: input frames advanced per output frame.
pub const LFR_SKIP: usize = 6;

/// Fixed feature-frame budget the acoustic models were exported with.
pub const FIXED_FRAMES: usize = 250;

/// CTC blank token id.
pub const CTC_BLANK_ID: u32 = 0;

/// Hard cap on generated tokens per segment in autoregressive decoding.
pub const MAX_DECODE_TOKENS: usize = 224;

/// Bounded capacity of the chunk channel into the VAD station.
pub const CHUNK_CHANNEL_CAPACITY: usize = 64;

/// Bounded capacity of the segment channel into the transcription station.
pub const SEGMENT_CHANNEL_CAPACITY: usize = 8;

/// Bounded capacity of the result channel into the sink station.
pub const RESULT_CHANNEL_CAPACITY: usize = 16;
