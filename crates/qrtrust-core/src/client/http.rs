//! HTTP layer: pacing, status mapping, IssuerOutcome.
//!
//! This is the ONLY place for status code handling. client/mod.rs never
//! interprets status codes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Stage, StageError};
use crate::resolver;

use super::helpers::{body_excerpt, issuers_url};

/// Result of one issuer query. Never an `Err`: every failure is recorded.
#[derive(Debug)]
pub(crate) enum IssuerOutcome {
    /// 2xx with an issuer list (possibly empty). Records are not inspected.
    Answered {
        status: u16,
        body: serde_json::Value,
    },
    Failed {
        /// `None` when no HTTP response was received.
        status: Option<u16>,
        /// Body, when one parsed but had the wrong shape.
        body: Option<serde_json::Value>,
        error: StageError,
    },
}

/// Enforces a minimum spacing between registry calls.
#[derive(Debug)]
pub(crate) struct Pacer {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Pacer {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until a call is allowed, then claim the slot.
    pub(crate) async fn wait_turn(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// HTTP backend for registry requests (holds reqwest client and pacing).
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) pacer: Arc<Pacer>,
}

impl HttpBackend {
    /// `GET /issuers?x509Thumbprint=...` mapped to an [`IssuerOutcome`].
    pub(crate) async fn fetch_issuers(&self, thumbprint: &str) -> IssuerOutcome {
        let url = match issuers_url(&self.base_url, thumbprint) {
            Ok(url) => url,
            Err(error) => {
                return IssuerOutcome::Failed {
                    status: None,
                    body: None,
                    error,
                }
            }
        };

        self.pacer.wait_turn().await;
        debug!(url = %url, "querying trust registry");

        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return transport_failure(thumbprint, e),
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                let mut outcome = transport_failure(thumbprint, e);
                if let IssuerOutcome::Failed { status: s, .. } = &mut outcome {
                    *s = Some(status);
                }
                return outcome;
            }
        };

        match status {
            200..=299 => parse_issuers(thumbprint, status, &text),
            _ => {
                let error = StageError::new(
                    Stage::RegistryUnreachable,
                    format!("registry returned HTTP {}: {}", status, body_excerpt(&text)),
                );
                warn!(thumbprint = %thumbprint, status, "registry lookup failed");
                IssuerOutcome::Failed {
                    status: Some(status),
                    body: None,
                    error,
                }
            }
        }
    }
}

fn parse_issuers(thumbprint: &str, status: u16, text: &str) -> IssuerOutcome {
    let body: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!(thumbprint = %thumbprint, error = %e, "registry body is not JSON");
            return IssuerOutcome::Failed {
                status: Some(status),
                body: None,
                error: StageError::new(
                    Stage::InvalidRegistryResponse,
                    format!("registry body is not JSON: {}", e),
                ),
            };
        }
    };

    let shape = resolver::issuer_list(&body).map(|_| ());
    match shape {
        Ok(_) => IssuerOutcome::Answered { status, body },
        Err(error) => {
            warn!(thumbprint = %thumbprint, error = %error, "malformed registry response");
            IssuerOutcome::Failed {
                status: Some(status),
                body: Some(body),
                error,
            }
        }
    }
}

fn transport_failure(thumbprint: &str, err: reqwest::Error) -> IssuerOutcome {
    let error = StageError::from(err);
    warn!(thumbprint = %thumbprint, stage = %error.stage, error = %error.message, "registry unreachable");
    IssuerOutcome::Failed {
        status: None,
        body: None,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_issuers_shapes() {
        assert!(matches!(
            parse_issuers("tp", 200, "[]"),
            IssuerOutcome::Answered { status: 200, .. }
        ));
        assert!(matches!(
            parse_issuers("tp", 200, r#"{"results":[{"name":"x"}]}"#),
            IssuerOutcome::Answered { .. }
        ));

        assert!(matches!(
            parse_issuers("tp", 200, r#"[{"publicKeys":[{"n":"AQAB"}]}]"#),
            IssuerOutcome::Answered { .. }
        ));

        match parse_issuers("tp", 200, r#"{"error":"nope"}"#) {
            IssuerOutcome::Failed { status, body, error } => {
                assert_eq!(status, Some(200));
                assert!(body.is_some());
                assert_eq!(error.stage, Stage::InvalidRegistryResponse);
            }
            other => panic!("expected failure, got {:?}", other),
        }

        match parse_issuers("tp", 200, "<html>") {
            IssuerOutcome::Failed { body, error, .. } => {
                assert!(body.is_none());
                assert_eq!(error.stage, Stage::InvalidRegistryResponse);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pacer_spaces_calls() {
        let pacer = Pacer::new(Duration::from_millis(30));
        let start = std::time::Instant::now();
        pacer.wait_turn().await;
        pacer.wait_turn().await;
        pacer.wait_turn().await;
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
