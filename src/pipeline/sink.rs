//! Pluggable delivery of transcription results.

use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;

use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::TranscriptionResult;

/// Receives each result as it is produced and assembles the final
/// transcript.
pub trait TranscriptSink: Send + 'static {
    fn deliver(&mut self, result: &TranscriptionResult);

    /// Called once when the pipeline stops. Returns the assembled
    /// transcript, if the sink builds one.
    fn finish(&mut self) -> Option<String> {
        None
    }
}

/// Prints each result line to stdout as it arrives. Results without
/// readable text are skipped.
#[derive(Debug, Default)]
pub struct StdoutSink {
    lines: Vec<String>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TranscriptSink for StdoutSink {
    fn deliver(&mut self, result: &TranscriptionResult) {
        if !result.has_text() {
            return;
        }
        let line = result.display_line();
        println!("{}", line);
        self.lines.push(line);
    }

    fn finish(&mut self) -> Option<String> {
        if self.lines.is_empty() {
            None
        } else {
            Some(self.lines.join("\n"))
        }
    }
}

/// Collects every result behind a shared handle, for tests and embedders
/// that want structured access.
#[derive(Debug, Default)]
pub struct CollectorSink {
    results: Arc<Mutex<Vec<TranscriptionResult>>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that stays valid after the sink moves into the pipeline.
    pub fn results(&self) -> Arc<Mutex<Vec<TranscriptionResult>>> {
        self.results.clone()
    }
}

impl TranscriptSink for CollectorSink {
    fn deliver(&mut self, result: &TranscriptionResult) {
        if let Ok(mut results) = self.results.lock() {
            results.push(result.clone());
        }
    }

    fn finish(&mut self) -> Option<String> {
        let results = self.results.lock().ok()?;
        if results.is_empty() {
            return None;
        }
        Some(
            results
                .iter()
                .filter(|r| r.has_text())
                .map(TranscriptionResult::display_line)
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

/// Terminal station: feeds results to the sink and ships the assembled
/// transcript out when the stream ends.
pub struct SinkStation {
    sink: Box<dyn TranscriptSink>,
    transcript_tx: Option<Sender<Option<String>>>,
}

impl SinkStation {
    pub fn new(sink: Box<dyn TranscriptSink>, transcript_tx: Sender<Option<String>>) -> Self {
        Self {
            sink,
            transcript_tx: Some(transcript_tx),
        }
    }
}

impl Station for SinkStation {
    type Input = TranscriptionResult;
    type Output = ();

    fn process(&mut self, result: TranscriptionResult) -> Result<Option<()>, StationError> {
        self.sink.deliver(&result);
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "Sink"
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.transcript_tx.take() {
            let _ = tx.send(self.sink.finish());
        }
    }
}
