//! Station that turns finalized speech segments into attributed
//! transcription results. Decoding and speaker identification run
//! concurrently per segment and join before the result is emitted.

use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Instant;

use crate::asr::{AsrDecoder, Transcription};
use crate::audio::SpeechSegment;
use crate::pipeline::error::{ErrorReporter, StationError};
use crate::pipeline::station::Station;
use crate::pipeline::types::{SegmentTiming, SpeakerLabel, TranscriptionResult};
use crate::speaker::{Confidence, EmbeddingExtractor, MatchOutcome, VoiceLibrary};

pub struct SegmentStation {
    decoder: Arc<AsrDecoder>,
    embedder: Arc<dyn EmbeddingExtractor>,
    library: Arc<RwLock<VoiceLibrary>>,
    reporter: Arc<dyn ErrorReporter>,
    sample_rate: u32,
    auto_learn: bool,
}

impl SegmentStation {
    pub fn new(
        decoder: Arc<AsrDecoder>,
        embedder: Arc<dyn EmbeddingExtractor>,
        library: Arc<RwLock<VoiceLibrary>>,
        reporter: Arc<dyn ErrorReporter>,
        sample_rate: u32,
        auto_learn: bool,
    ) -> Self {
        Self {
            decoder,
            embedder,
            library,
            reporter,
            sample_rate,
            auto_learn,
        }
    }

    /// Embedding extraction, matching, and the follow-up library updates.
    /// Failures degrade to an unattributed label instead of dropping the
    /// segment.
    fn attribute(&self, segment: &SpeechSegment) -> SpeakerLabel {
        let embedding = match self.embedder.embed(&segment.samples) {
            Ok(e) => e,
            Err(e) => {
                self.reporter
                    .report(self.name(), &StationError::Recoverable(e.to_string()));
                return SpeakerLabel::Unknown;
            }
        };

        let outcome = {
            let library = self.library.read().unwrap_or_else(|e| e.into_inner());
            library.match_embedding(&embedding)
        };

        match outcome {
            MatchOutcome::Matched {
                name,
                score,
                confidence,
            } => {
                if self.auto_learn && confidence == Confidence::High {
                    let mut library = self.library.write().unwrap_or_else(|e| e.into_inner());
                    if let Err(e) = library.auto_learn(&name, embedding, score) {
                        self.reporter
                            .report(self.name(), &StationError::Recoverable(e.to_string()));
                    }
                }
                SpeakerLabel::Known { name }
            }
            MatchOutcome::Conflict { first, second, .. } => {
                SpeakerLabel::Ambiguous { first, second }
            }
            MatchOutcome::Unmatched => {
                let mut library = self.library.write().unwrap_or_else(|e| e.into_inner());
                let name = library.auto_enroll(embedding);
                SpeakerLabel::Known { name }
            }
        }
    }
}

impl Station for SegmentStation {
    type Input = SpeechSegment;
    type Output = TranscriptionResult;

    fn process(&mut self, segment: SpeechSegment) -> Result<Option<TranscriptionResult>, StationError> {
        let (decoded, decode_ms, speaker, speaker_ms) = thread::scope(|scope| {
            let decode_branch = scope.spawn(|| {
                let started = Instant::now();
                let decoded = self.decoder.decode(&segment);
                (decoded, started.elapsed().as_millis() as u64)
            });

            let started = Instant::now();
            let speaker = self.attribute(&segment);
            let speaker_ms = started.elapsed().as_millis() as u64;

            let (decoded, decode_ms) = decode_branch.join().unwrap_or_else(|_| {
                (
                    Err(crate::error::VoxscribeError::Decode {
                        message: "decode branch panicked".to_string(),
                    }),
                    0,
                )
            });
            (decoded, decode_ms, speaker, speaker_ms)
        });

        let transcription: Option<Transcription> = match decoded {
            Ok(t) => Some(t),
            Err(e) => {
                self.reporter
                    .report(self.name(), &StationError::Recoverable(e.to_string()));
                None
            }
        };

        // decode failure still yields a result carrying the attribution
        let (text, tokens, language) = match transcription {
            Some(t) => (t.text, t.tokens, t.language),
            None => (String::new(), Vec::new(), None),
        };

        Ok(Some(TranscriptionResult {
            text,
            tokens,
            speaker,
            language,
            start_secs: segment.start_secs(self.sample_rate),
            duration_secs: segment.duration_secs(self.sample_rate),
            strategy: self.decoder.strategy(),
            timing: SegmentTiming {
                decode_ms,
                speaker_ms,
            },
        }))
    }

    fn name(&self) -> &'static str {
        "Segment"
    }
}
