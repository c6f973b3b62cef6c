//! Scanned text → signed token decode pipeline.
//!
//! Stages run in a fixed order and never retry:
//!
//! 1. `base45-decode`: BASE45 text to bytes
//! 2. `inflate`: zlib-framed DEFLATE to token text
//! 3. `token-parse`: `header.payload.signature` with base64url JSON parts
//!
//! Each successful stage appends a [`StageRecord`] to the [`DecodeTrace`].
//! The trace is observational only; no decision reads it.

use std::io::Read;

use flate2::read::ZlibDecoder;
use serde::Serialize;
use tracing::debug;

use crate::error::{Stage, StageError, StageResult};
use crate::progress::{NoopSink, ProgressEvent, ProgressSink};

pub mod base45;
mod token;

pub use token::{ParsedToken, TokenHeader};

/// Name of the record describing the raw input.
pub const INPUT_RECORD: &str = "input";

/// Context prefix some issuers put in front of the BASE45 text.
const HC1_PREFIX: &str = "HC1:";

/// One successful pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    pub name: String,
    pub payload_size: usize,
    pub payload: String,
    pub percent_of_previous: u32,
}

/// Ordered stage records for one decode attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DecodeTrace(Vec<StageRecord>);

impl DecodeTrace {
    pub fn records(&self) -> &[StageRecord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&StageRecord> {
        self.0.iter().find(|r| r.name == name)
    }

    fn push(&mut self, name: &str, payload_size: usize, payload: String) -> &StageRecord {
        let previous = self.0.last().map(|r| r.payload_size);
        let percent_of_previous = match previous {
            Some(0) => 0,
            Some(prev) => ((payload_size as f64 / prev as f64) * 100.0).round() as u32,
            None => 100,
        };
        self.0.push(StageRecord {
            name: name.to_string(),
            payload_size,
            payload,
            percent_of_previous,
        });
        &self.0[self.0.len() - 1]
    }
}

/// Trace plus terminal outcome of a decode attempt.
#[derive(Debug, Clone)]
pub struct DecodeOutcome {
    pub trace: DecodeTrace,
    pub result: StageResult<ParsedToken>,
}

/// Decode scanned text without progress reporting.
pub fn decode(raw: &str) -> DecodeOutcome {
    decode_with_sink(raw, &NoopSink)
}

/// Decode scanned text, emitting one progress event per stage.
pub fn decode_with_sink(raw: &str, sink: &dyn ProgressSink) -> DecodeOutcome {
    let mut trace = DecodeTrace::default();
    let result = run_stages(raw, &mut trace, sink);

    if let Err(e) = &result {
        debug!(stage = %e.stage, error = %e.message, "decode pipeline failed");
        sink.emit(ProgressEvent::StageFailed(e.clone()));
    }

    DecodeOutcome { trace, result }
}

fn run_stages(
    raw: &str,
    trace: &mut DecodeTrace,
    sink: &dyn ProgressSink,
) -> StageResult<ParsedToken> {
    let text = strip_context(raw);
    record(trace, sink, INPUT_RECORD, text.len(), text.to_string());

    let compressed = base45::decode(text)
        .map_err(|e| StageError::new(Stage::Base45Decode, e.to_string()))?;
    record(
        trace,
        sink,
        Stage::Base45Decode.as_str(),
        compressed.len(),
        hex::encode(&compressed),
    );

    let token = inflate(&compressed)?;
    record(
        trace,
        sink,
        Stage::Inflate.as_str(),
        token.len(),
        token.clone(),
    );

    let parsed = ParsedToken::parse(&token)?;
    let parsed_json = serde_json::json!({
        "header": parsed.header_json,
        "payload": parsed.payload,
    });
    let rendered = parsed_json.to_string();
    record(
        trace,
        sink,
        Stage::TokenParse.as_str(),
        rendered.len(),
        rendered,
    );

    Ok(parsed)
}

fn record(
    trace: &mut DecodeTrace,
    sink: &dyn ProgressSink,
    name: &str,
    size: usize,
    payload: String,
) {
    let rec = trace.push(name, size, payload);
    debug!(
        stage = %rec.name,
        size = rec.payload_size,
        percent = rec.percent_of_previous,
        "decode stage complete"
    );
    sink.emit(ProgressEvent::StageCompleted(rec.clone()));
}

fn strip_context(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix(HC1_PREFIX).unwrap_or(trimmed)
}

fn inflate(compressed: &[u8]) -> StageResult<String> {
    let mut out = Vec::new();
    ZlibDecoder::new(compressed)
        .read_to_end(&mut out)
        .map_err(|e| StageError::new(Stage::Inflate, e.to_string()))?;
    String::from_utf8(out)
        .map_err(|e| StageError::new(Stage::Inflate, format!("inflated token is not UTF-8: {}", e)))
}
