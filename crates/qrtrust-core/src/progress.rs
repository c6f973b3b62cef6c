//! Progress reporting for verification runs.
//!
//! The core never owns session state. Callers that stream progress (for
//! example a route layer serving server-sent events) inject a sink per
//! request; [`BroadcastSink`] covers the common one-producer,
//! many-subscribers case and is dropped with the session.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::decode::StageRecord;
use crate::error::StageError;
use crate::types::IssuerInfo;

/// A progress event emitted during verification.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ProgressEvent {
    StageCompleted(StageRecord),
    StageFailed(StageError),
    RegistryLookup {
        thumbprint: String,
        found: bool,
        from_cache: bool,
    },
    SignatureChecked {
        valid: bool,
        issuer: Option<IssuerInfo>,
    },
}

/// Receiver of progress events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Fans events out to any number of subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<ProgressEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }
}

impl ProgressSink for BroadcastSink {
    fn emit(&self, event: ProgressEvent) {
        // No subscribers is not an error: the session may have disconnected.
        let _ = self.tx.send(event);
    }
}
