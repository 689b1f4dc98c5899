//! The streaming VAD engine: recurrent model state, trailing-context
//! buffer, and the Silent/Speaking state machine that turns per-chunk
//! speech probabilities into finalized [`SpeechSegment`]s.

use std::sync::Arc;

use crate::audio::{AudioChunk, SpeechSegment};
use crate::defaults;
use crate::error::Result;
use crate::inference::{expect_outputs, InferenceEngine, ModelId, Tensor};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadConfig {
    pub sample_rate: u32,
    pub chunk_samples: usize,
    pub context_samples: usize,
    pub state_dim: usize,
    pub speech_threshold: f32,
    pub min_speech_frames: u32,
    pub min_silence_frames: u32,
    pub min_segment_secs: f32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            chunk_samples: defaults::CHUNK_SAMPLES,
            context_samples: defaults::CONTEXT_SAMPLES,
            state_dim: defaults::VAD_STATE_DIM,
            speech_threshold: defaults::SPEECH_THRESHOLD,
            min_speech_frames: defaults::MIN_SPEECH_FRAMES,
            min_silence_frames: defaults::MIN_SILENCE_FRAMES,
            min_segment_secs: defaults::MIN_SEGMENT_SECS,
        }
    }
}

/// The model's hidden and cell vectors. Replaced wholesale by each
/// successful inference, never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrentState {
    hidden: Vec<f32>,
    cell: Vec<f32>,
}

impl RecurrentState {
    fn zeros(dim: usize) -> Self {
        Self {
            hidden: vec![0.0; dim],
            cell: vec![0.0; dim],
        }
    }
}

/// Tracks an in-progress run. `Silent` accumulates a tentative speech run
/// that is discarded if it fizzles; `Speaking` owns the open segment.
#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Silent {
        speech_run: u32,
        pending: Vec<f32>,
        pending_start: u64,
    },
    Speaking {
        samples: Vec<f32>,
        start_sample: u64,
        silence_run: u32,
    },
}

impl Phase {
    fn silent() -> Self {
        Phase::Silent {
            speech_run: 0,
            pending: Vec::new(),
            pending_start: 0,
        }
    }
}

pub struct StreamingVad {
    config: VadConfig,
    engine: Arc<dyn InferenceEngine>,
    state: RecurrentState,
    /// Last `context_samples` of the most recent chunk, prepended to the
    /// next model input. Refreshed even when inference fails.
    context: Vec<f32>,
    phase: Phase,
    dropped_chunks: u64,
}

impl StreamingVad {
    pub fn new(config: VadConfig, engine: Arc<dyn InferenceEngine>) -> Self {
        let state = RecurrentState::zeros(config.state_dim);
        let context = vec![0.0; config.context_samples];
        Self {
            config,
            engine,
            state,
            context,
            phase: Phase::silent(),
            dropped_chunks: 0,
        }
    }

    pub fn config(&self) -> &VadConfig {
        &self.config
    }

    /// Chunks whose inference failed and were therefore excluded from
    /// state-machine decisions.
    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks
    }

    /// Consumes one chunk, in stream order. Returns a finalized segment
    /// when this chunk closes one.
    ///
    /// Malformed chunks are rejected before any state is touched. A chunk
    /// whose inference fails makes no decision: the state machine and
    /// recurrent state stay as they were, only the raw-audio context buffer
    /// is refreshed.
    pub fn process_chunk(&mut self, chunk: &AudioChunk) -> Result<Option<SpeechSegment>> {
        chunk.validate(self.config.chunk_samples)?;

        let prob = match self.infer(&chunk.samples) {
            Some(prob) => prob,
            None => {
                self.refresh_context(&chunk.samples);
                self.dropped_chunks += 1;
                return Ok(None);
            }
        };
        self.refresh_context(&chunk.samples);

        let is_speech = prob >= self.config.speech_threshold;
        Ok(self.advance(chunk, is_speech))
    }

    /// Force-closes any accumulating segment, subject to the same minimum
    /// duration floor as a natural close. Counters and buffers reset; the
    /// recurrent state is kept so the stream can continue.
    pub fn flush(&mut self) -> Option<SpeechSegment> {
        let phase = std::mem::replace(&mut self.phase, Phase::silent());
        match phase {
            Phase::Speaking {
                samples,
                start_sample,
                ..
            } => self.finalize(samples, start_sample),
            Phase::Silent { .. } => None,
        }
    }

    /// Returns the engine to its initial state: zeroed recurrent state and
    /// context, all counters and buffers cleared.
    pub fn reset(&mut self) {
        self.state = RecurrentState::zeros(self.config.state_dim);
        self.context = vec![0.0; self.config.context_samples];
        self.phase = Phase::silent();
        self.dropped_chunks = 0;
    }

    /// Runs the model over `[context ++ chunk]` with the current recurrent
    /// state. On success the state is replaced with the returned vectors.
    fn infer(&mut self, samples: &[f32]) -> Option<f32> {
        let mut input = Vec::with_capacity(self.context.len() + samples.len());
        input.extend_from_slice(&self.context);
        input.extend_from_slice(samples);

        let inputs = [
            Tensor::from_vec(input),
            Tensor::from_vec(self.state.hidden.clone()),
            Tensor::from_vec(self.state.cell.clone()),
        ];
        let outputs = self
            .engine
            .run(ModelId::Vad, &inputs)
            .and_then(|out| expect_outputs(ModelId::Vad, out, 3))
            .ok()?;

        let mut iter = outputs.into_iter();
        let prob = iter.next()?.scalar().ok()?;
        let hidden = iter.next()?.into_data();
        let cell = iter.next()?.into_data();
        self.state = RecurrentState { hidden, cell };
        Some(prob)
    }

    fn refresh_context(&mut self, samples: &[f32]) {
        let k = self.config.context_samples;
        if samples.len() >= k {
            self.context.clear();
            self.context.extend_from_slice(&samples[samples.len() - k..]);
        }
    }

    fn advance(&mut self, chunk: &AudioChunk, is_speech: bool) -> Option<SpeechSegment> {
        match std::mem::replace(&mut self.phase, Phase::silent()) {
            Phase::Silent {
                mut speech_run,
                mut pending,
                mut pending_start,
            } => {
                if is_speech {
                    if speech_run == 0 {
                        pending_start = chunk.start_sample;
                    }
                    speech_run += 1;
                    pending.extend_from_slice(&chunk.samples);
                    if speech_run >= self.config.min_speech_frames {
                        // whole run retained, pre-threshold frames included
                        self.phase = Phase::Speaking {
                            samples: pending,
                            start_sample: pending_start,
                            silence_run: 0,
                        };
                    } else {
                        self.phase = Phase::Silent {
                            speech_run,
                            pending,
                            pending_start,
                        };
                    }
                }
                // a silent chunk discards the tentative run
                None
            }
            Phase::Speaking {
                mut samples,
                start_sample,
                mut silence_run,
            } => {
                samples.extend_from_slice(&chunk.samples);
                if is_speech {
                    silence_run = 0;
                } else {
                    silence_run += 1;
                    if silence_run >= self.config.min_silence_frames {
                        return self.finalize(samples, start_sample);
                    }
                }
                self.phase = Phase::Speaking {
                    samples,
                    start_sample,
                    silence_run,
                };
                None
            }
        }
    }

    fn finalize(&self, samples: Vec<f32>, start_sample: u64) -> Option<SpeechSegment> {
        let duration = samples.len() as f32 / self.config.sample_rate as f32;
        if duration < self.config.min_segment_secs {
            return None;
        }
        let end_sample = start_sample + samples.len() as u64;
        Some(SpeechSegment {
            samples,
            start_sample,
            end_sample,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoxscribeError;
    use std::sync::Mutex;

    /// Engine scripted with one probability (or failure) per call.
    struct ScriptedVadEngine {
        script: Mutex<Vec<Option<f32>>>,
        calls: Mutex<Vec<Vec<Tensor>>>,
        state_dim: usize,
    }

    impl ScriptedVadEngine {
        fn new(script: Vec<Option<f32>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().rev().collect()),
                calls: Mutex::new(Vec::new()),
                state_dim: 4,
            })
        }
    }

    impl InferenceEngine for ScriptedVadEngine {
        fn run(&self, _model: ModelId, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
            self.calls.lock().unwrap().push(inputs.to_vec());
            let next = self.script.lock().unwrap().pop().flatten();
            match next {
                Some(prob) => {
                    let step = self.calls.lock().unwrap().len() as f32;
                    Ok(vec![
                        Tensor::from_vec(vec![prob]),
                        Tensor::from_vec(vec![step; self.state_dim]),
                        Tensor::from_vec(vec![-step; self.state_dim]),
                    ])
                }
                None => Err(VoxscribeError::InferenceFailed {
                    model: "vad".to_string(),
                    message: "scripted failure".to_string(),
                }),
            }
        }
    }

    fn test_config() -> VadConfig {
        VadConfig {
            sample_rate: 16_000,
            chunk_samples: 512,
            context_samples: 64,
            state_dim: 4,
            speech_threshold: 0.5,
            min_speech_frames: 2,
            min_silence_frames: 2,
            min_segment_secs: 0.05,
        }
    }

    fn chunk(n: u64, value: f32) -> AudioChunk {
        AudioChunk::new(vec![value; 512], n * 512)
    }

    /// Drives `probs` through a fresh engine and collects emitted segments.
    fn run_script(config: VadConfig, script: Vec<Option<f32>>) -> (StreamingVad, Vec<SpeechSegment>) {
        let engine = ScriptedVadEngine::new(script.clone());
        let mut vad = StreamingVad::new(config, engine);
        let mut segments = Vec::new();
        for (i, _) in script.iter().enumerate() {
            if let Some(seg) = vad.process_chunk(&chunk(i as u64, 0.1)).unwrap() {
                segments.push(seg);
            }
        }
        (vad, segments)
    }

    #[test]
    fn test_silence_only_emits_nothing() {
        let script = vec![Some(0.1); 20];
        let (mut vad, segments) = run_script(test_config(), script);
        assert!(segments.is_empty());
        assert!(vad.flush().is_none());
    }

    #[test]
    fn test_speech_run_then_silence_emits_one_segment() {
        let mut script = vec![Some(0.1); 2];
        script.extend(vec![Some(0.9); 4]);
        script.extend(vec![Some(0.1); 3]);
        let (_, segments) = run_script(test_config(), script);
        assert_eq!(segments.len(), 1);

        // whole run retained: 4 speech chunks + 2 trailing silence chunks
        let seg = &segments[0];
        assert_eq!(seg.samples.len(), 6 * 512);
        // run started at chunk index 2
        assert_eq!(seg.start_sample, 2 * 512);
        assert_eq!(seg.end_sample, 8 * 512);
    }

    #[test]
    fn test_short_speech_blip_never_opens_segment() {
        // single speech chunk, below min_speech_frames
        let script = vec![Some(0.1), Some(0.9), Some(0.1), Some(0.1), Some(0.1)];
        let (mut vad, segments) = run_script(test_config(), script);
        assert!(segments.is_empty());
        assert!(vad.flush().is_none());
    }

    #[test]
    fn test_speech_resets_silence_counter() {
        // silence run is broken before reaching min_silence_frames
        let mut script = vec![Some(0.9); 3];
        script.push(Some(0.1));
        script.extend(vec![Some(0.9); 2]);
        script.extend(vec![Some(0.1); 2]);
        let (_, segments) = run_script(test_config(), script);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].samples.len(), 8 * 512);
    }

    #[test]
    fn test_min_duration_floor_discards_segment() {
        let config = VadConfig {
            // 6 chunks = 0.192 s, below the floor
            min_segment_secs: 0.5,
            ..test_config()
        };
        let mut script = vec![Some(0.9); 4];
        script.extend(vec![Some(0.1); 2]);
        let (_, segments) = run_script(config, script);
        assert!(segments.is_empty());
    }

    #[test]
    fn test_flush_closes_open_segment() {
        let script = vec![Some(0.9); 5];
        let (mut vad, segments) = run_script(test_config(), script);
        assert!(segments.is_empty());

        let seg = vad.flush().expect("open segment should flush");
        assert_eq!(seg.samples.len(), 5 * 512);
        // flushing again is a no-op
        assert!(vad.flush().is_none());
    }

    #[test]
    fn test_flush_respects_duration_floor() {
        let config = VadConfig {
            min_segment_secs: 1.0,
            ..test_config()
        };
        let script = vec![Some(0.9); 3];
        let (mut vad, _) = run_script(config, script);
        assert!(vad.flush().is_none());
    }

    #[test]
    fn test_inference_failure_makes_no_decision() {
        // failure lands mid speech-run; the run must not advance on it
        let script = vec![
            Some(0.9),
            None,
            Some(0.9),
            Some(0.9),
            Some(0.1),
            Some(0.1),
        ];
        let engine = ScriptedVadEngine::new(script);
        let mut vad = StreamingVad::new(test_config(), engine);

        let mut segments = Vec::new();
        for i in 0..6 {
            if let Some(seg) = vad.process_chunk(&chunk(i, 0.1)).unwrap() {
                segments.push(seg);
            }
        }
        assert_eq!(vad.dropped_chunks(), 1);
        assert_eq!(segments.len(), 1);
        // dropped chunk is absent from the segment: chunks 0,2,3 + trailing 4,5
        assert_eq!(segments[0].samples.len(), 5 * 512);
    }

    #[test]
    fn test_inference_failure_keeps_recurrent_state() {
        let engine = ScriptedVadEngine::new(vec![Some(0.9), None, Some(0.9)]);
        let mut vad = StreamingVad::new(test_config(), engine.clone());

        vad.process_chunk(&chunk(0, 0.1)).unwrap();
        let state_after_success = vad.state.clone();
        vad.process_chunk(&chunk(1, 0.1)).unwrap();
        assert_eq!(vad.state, state_after_success);

        // the third call must feed the state from the first success
        vad.process_chunk(&chunk(2, 0.1)).unwrap();
        let calls = engine.calls.lock().unwrap();
        assert_eq!(calls[2][1].data(), state_after_success.hidden.as_slice());
    }

    #[test]
    fn test_context_prepended_and_refreshed() {
        let engine = ScriptedVadEngine::new(vec![Some(0.1), Some(0.1)]);
        let mut vad = StreamingVad::new(test_config(), engine.clone());

        vad.process_chunk(&AudioChunk::new(vec![0.25; 512], 0)).unwrap();
        vad.process_chunk(&AudioChunk::new(vec![0.75; 512], 512)).unwrap();

        let calls = engine.calls.lock().unwrap();
        // first call: zero context
        assert!(calls[0][0].data()[..64].iter().all(|v| *v == 0.0));
        assert_eq!(calls[0][0].data().len(), 64 + 512);
        // second call: context is the tail of the first chunk
        assert!(calls[1][0].data()[..64].iter().all(|v| *v == 0.25));
        assert!(calls[1][0].data()[64..].iter().all(|v| *v == 0.75));
    }

    #[test]
    fn test_malformed_chunk_rejected_without_state_change() {
        let engine = ScriptedVadEngine::new(vec![Some(0.9); 4]);
        let mut vad = StreamingVad::new(test_config(), engine.clone());

        vad.process_chunk(&chunk(0, 0.1)).unwrap();
        let state_before = vad.state.clone();

        let bad = AudioChunk::new(vec![0.1; 100], 512);
        assert!(vad.process_chunk(&bad).is_err());
        assert_eq!(vad.state, state_before);
        // no inference call was made for the bad chunk
        assert_eq!(engine.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_reset_returns_to_initial_state() {
        let engine = ScriptedVadEngine::new(vec![Some(0.9); 3]);
        let mut vad = StreamingVad::new(test_config(), engine);
        for i in 0..3 {
            vad.process_chunk(&chunk(i, 0.1)).unwrap();
        }
        vad.reset();
        assert_eq!(vad.state, RecurrentState::zeros(4));
        assert!(vad.context.iter().all(|v| *v == 0.0));
        assert!(vad.flush().is_none());
        assert_eq!(vad.dropped_chunks(), 0);
    }

    #[test]
    fn test_two_utterances_emit_two_segments() {
        let mut script = vec![Some(0.9); 3];
        script.extend(vec![Some(0.1); 3]);
        script.extend(vec![Some(0.9); 3]);
        script.extend(vec![Some(0.1); 3]);
        let (_, segments) = run_script(test_config(), script);
        assert_eq!(segments.len(), 2);
        assert!(segments[0].end_sample <= segments[1].start_sample);
    }
}
