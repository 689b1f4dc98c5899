//! Wires the stations into a running pipeline and owns its lifecycle.
//!
//! Three threads: VAD segmentation, per-segment transcription and speaker
//! identification, and result delivery. Bounded channels between them keep
//! backpressure capped; chunk ingestion stays push-based and sequential.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::asr::AsrDecoder;
use crate::audio::AudioChunk;
use crate::defaults;
use crate::error::{Result, VoxscribeError};
use crate::inference::InferenceEngine;
use crate::pipeline::error::{ErrorReporter, LogReporter, StationError};
use crate::pipeline::segment_station::SegmentStation;
use crate::pipeline::sink::{SinkStation, TranscriptSink};
use crate::pipeline::station::StationRunner;
use crate::pipeline::vad_station::{VadInput, VadStation};
use crate::speaker::{Embedding, EmbeddingExtractor, VoiceLibrary};
use crate::vad::{StreamingVad, VadConfig};

/// How long `stop()` waits for the final transcript before giving up.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub vad: VadConfig,
    /// Feed high-confidence matches back into their profiles.
    pub auto_learn: bool,
    pub chunk_capacity: usize,
    pub segment_capacity: usize,
    pub result_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vad: VadConfig::default(),
            auto_learn: true,
            chunk_capacity: defaults::CHUNK_CHANNEL_CAPACITY,
            segment_capacity: defaults::SEGMENT_CHANNEL_CAPACITY,
            result_capacity: defaults::RESULT_CHANNEL_CAPACITY,
        }
    }
}

/// Everything the pipeline borrows from the embedding application.
pub struct PipelinePorts {
    pub engine: Arc<dyn InferenceEngine>,
    pub decoder: Arc<AsrDecoder>,
    pub embedder: Arc<dyn EmbeddingExtractor>,
    pub library: Arc<RwLock<VoiceLibrary>>,
}

pub struct Pipeline {
    config: PipelineConfig,
    reporter: Arc<dyn ErrorReporter>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            reporter: Arc::new(LogReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Spawns the station threads and returns the handle that feeds them.
    pub fn start(&self, ports: PipelinePorts, sink: Box<dyn TranscriptSink>) -> PipelineHandle {
        let (chunk_tx, chunk_rx) = bounded(self.config.chunk_capacity);
        let (segment_tx, segment_rx) = bounded(self.config.segment_capacity);
        let (result_tx, result_rx) = bounded(self.config.result_capacity);
        let (transcript_tx, transcript_rx) = bounded(1);
        // terminal station produces no output; keep a channel for the runner
        let (unit_tx, _unit_rx) = bounded::<()>(1);

        let vad_runner = StationRunner::spawn(
            VadStation::new(StreamingVad::new(self.config.vad, ports.engine)),
            chunk_rx,
            segment_tx,
            self.reporter.clone(),
        );

        let segment_runner = StationRunner::spawn(
            SegmentStation::new(
                ports.decoder,
                ports.embedder.clone(),
                ports.library.clone(),
                self.reporter.clone(),
                self.config.vad.sample_rate,
                self.config.auto_learn,
            ),
            segment_rx,
            result_tx,
            self.reporter.clone(),
        );

        let sink_runner = StationRunner::spawn(
            SinkStation::new(sink, transcript_tx),
            result_rx,
            unit_tx,
            self.reporter.clone(),
        );

        PipelineHandle {
            chunk_tx: Some(chunk_tx),
            transcript_rx,
            vad_runner: Some(vad_runner),
            segment_runner: Some(segment_runner),
            sink_runner: Some(sink_runner),
            reporter: self.reporter.clone(),
            embedder: ports.embedder,
            library: ports.library,
            chunk_samples: self.config.vad.chunk_samples,
            next_sample: 0,
        }
    }
}

/// Push interface to a running pipeline. One handle per audio stream;
/// chunk submission is `&mut self`, so in-order delivery is enforced by
/// the borrow checker.
pub struct PipelineHandle {
    chunk_tx: Option<Sender<VadInput>>,
    transcript_rx: Receiver<Option<String>>,
    vad_runner: Option<StationRunner<VadStation>>,
    segment_runner: Option<StationRunner<SegmentStation>>,
    sink_runner: Option<StationRunner<SinkStation>>,
    reporter: Arc<dyn ErrorReporter>,
    embedder: Arc<dyn EmbeddingExtractor>,
    library: Arc<RwLock<VoiceLibrary>>,
    chunk_samples: usize,
    next_sample: u64,
}

impl PipelineHandle {
    /// Submits the next chunk of the stream. Blocks while the chunk
    /// channel is full; fails once the pipeline has stopped.
    pub fn process_chunk(&mut self, samples: Vec<f32>) -> Result<()> {
        if samples.len() != self.chunk_samples {
            return Err(VoxscribeError::MalformedAudio {
                reason: format!(
                    "expected {} samples, got {}",
                    self.chunk_samples,
                    samples.len()
                ),
            });
        }
        let tx = self
            .chunk_tx
            .as_ref()
            .ok_or(VoxscribeError::PipelineClosed)?;
        let chunk = AudioChunk::new(samples, self.next_sample);
        self.next_sample += self.chunk_samples as u64;
        tx.send(VadInput::Chunk(chunk))
            .map_err(|_| VoxscribeError::PipelineClosed)
    }

    /// Force-closes the in-flight segment without stopping the stream.
    pub fn flush(&mut self) -> Result<()> {
        let tx = self
            .chunk_tx
            .as_ref()
            .ok_or(VoxscribeError::PipelineClosed)?;
        tx.send(VadInput::Flush)
            .map_err(|_| VoxscribeError::PipelineClosed)
    }

    /// Runs the embedding port over caller-held clips and enrolls the
    /// speaker. Clips that fail to embed are skipped; enrolling requires
    /// at least one usable clip.
    pub fn enroll_from_audio(&self, name: &str, clips: &[Vec<f32>]) -> Result<usize> {
        let embeddings: Vec<Embedding> = clips
            .iter()
            .filter_map(|clip| match self.embedder.embed(clip) {
                Ok(e) => Some(e),
                Err(e) => {
                    self.reporter
                        .report("Enroll", &StationError::Recoverable(e.to_string()));
                    None
                }
            })
            .collect();
        if embeddings.is_empty() {
            return Err(VoxscribeError::EmbeddingFailed {
                message: format!("no usable clips for '{name}'"),
            });
        }
        let mut library = self.library.write().unwrap_or_else(|e| e.into_inner());
        Ok(library.enroll(name, &embeddings))
    }

    /// Shared access to the voice library backing this pipeline.
    pub fn library(&self) -> Arc<RwLock<VoiceLibrary>> {
        self.library.clone()
    }

    /// Stops accepting input, flushes the in-flight segment through the
    /// stations, and returns the sink's assembled transcript.
    pub fn stop(mut self) -> Option<String> {
        // closing the chunk channel cascades a drain through every station
        self.chunk_tx = None;

        let transcript = self
            .transcript_rx
            .recv_timeout(STOP_TIMEOUT)
            .ok()
            .flatten();

        for result in [
            self.vad_runner.take().map(StationRunner::join),
            self.segment_runner.take().map(StationRunner::join),
            self.sink_runner.take().map(StationRunner::join),
        ]
        .into_iter()
        .flatten()
        {
            if let Err(msg) = result {
                self.reporter
                    .report("Pipeline", &StationError::Fatal(msg));
            }
        }

        transcript
    }
}
