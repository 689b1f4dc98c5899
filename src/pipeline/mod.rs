//! The live pipeline: threaded stations connected by bounded channels,
//! from raw audio chunks to attributed transcription results.

mod error;
mod orchestrator;
mod segment_station;
mod sink;
mod station;
mod types;
mod vad_station;

pub use error::{CollectingReporter, ErrorReporter, LogReporter, StationError};
pub use orchestrator::{Pipeline, PipelineConfig, PipelineHandle, PipelinePorts};
pub use segment_station::SegmentStation;
pub use sink::{CollectorSink, SinkStation, StdoutSink, TranscriptSink};
pub use station::{Station, StationRunner};
pub use types::{SegmentTiming, SpeakerLabel, TranscriptionResult};
pub use vad_station::{VadInput, VadStation};
