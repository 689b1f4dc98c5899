//! Station wrapping the streaming VAD engine.

use crate::audio::{AudioChunk, SpeechSegment};
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::vad::StreamingVad;

/// Input to the VAD station: audio, or a command to force-close the
/// in-flight segment.
#[derive(Debug, Clone, PartialEq)]
pub enum VadInput {
    Chunk(AudioChunk),
    Flush,
}

pub struct VadStation {
    vad: StreamingVad,
}

impl VadStation {
    pub fn new(vad: StreamingVad) -> Self {
        Self { vad }
    }
}

impl Station for VadStation {
    type Input = VadInput;
    type Output = SpeechSegment;

    fn process(&mut self, input: VadInput) -> Result<Option<SpeechSegment>, StationError> {
        match input {
            VadInput::Chunk(chunk) => self
                .vad
                .process_chunk(&chunk)
                .map_err(|e| StationError::Recoverable(e.to_string())),
            VadInput::Flush => Ok(self.vad.flush()),
        }
    }

    fn name(&self) -> &'static str {
        "Vad"
    }

    /// End of stream: force-close whatever is accumulating.
    fn drain(&mut self) -> Option<SpeechSegment> {
        self.vad.flush()
    }
}
