//! End-to-end credential verification.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::client::TrustRegistryClient;
use crate::decode::{self, DecodeTrace};
use crate::error::{Stage, StageError};
use crate::progress::{NoopSink, ProgressEvent, ProgressSink};
use crate::resolver::{self, KeySource, ResolvedKey};
use crate::types::{CacheSource, IssuerInfo};
use crate::validate;

/// Verdict for one scanned credential.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub steps: DecodeTrace,
    pub signature_valid: bool,
    pub issuer_info: Option<IssuerInfo>,
    /// Thumbprint read from the token header, normalized.
    pub thumbprint: Option<String>,
    /// Thumbprint of the key the signature was checked with.
    pub key_thumbprint: Option<String>,
    pub key_source: Option<KeySource>,
    pub error: Option<StageError>,
}

impl VerificationResult {
    fn failed(steps: DecodeTrace, error: StageError) -> Self {
        Self {
            steps,
            signature_valid: false,
            issuer_info: None,
            thumbprint: None,
            key_thumbprint: None,
            key_source: None,
            error: Some(error),
        }
    }

    /// Stage tag of the failure, if any.
    pub fn failed_stage(&self) -> Option<Stage> {
        self.error.as_ref().map(|e| e.stage)
    }
}

/// Runs decode, key lookup and signature validation.
#[derive(Clone)]
pub struct Verifier {
    client: TrustRegistryClient,
    sink: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl Verifier {
    pub fn new(client: TrustRegistryClient) -> Self {
        Self {
            client,
            sink: Arc::new(NoopSink),
        }
    }

    /// Report progress to `sink` instead of discarding it.
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn client(&self) -> &TrustRegistryClient {
        &self.client
    }

    /// Verify one scanned credential.
    ///
    /// Never fails outright: every problem ends up in `error` with its stage
    /// tag. Cache errors are reported as `registry-unreachable`.
    pub async fn verify(&self, raw: &str) -> VerificationResult {
        let decoded = decode::decode_with_sink(raw, self.sink.as_ref());
        let steps = decoded.trace;
        let token = match decoded.result {
            Ok(token) => token,
            Err(e) => return VerificationResult::failed(steps, e),
        };

        if let Err(e) = validate::check_algorithm(&token.header) {
            return self.fail(steps, None, e);
        }

        let Some(raw_thumbprint) = token.header.thumbprint() else {
            let e = StageError::new(
                Stage::NoKeyMaterial,
                "token header carries no certificate thumbprint",
            );
            return self.fail(steps, None, e);
        };
        let thumbprint = crate::thumbprint::normalize(raw_thumbprint).value;

        let lookup = match self
            .client
            .lookup_entry(&thumbprint, false, CacheSource::Verification)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                let e = StageError::new(
                    Stage::RegistryUnreachable,
                    format!("trust cache unavailable: {}", e),
                );
                return self.fail(steps, Some(thumbprint), e);
            }
        };
        self.sink.emit(ProgressEvent::RegistryLookup {
            thumbprint: thumbprint.clone(),
            found: lookup.found(),
            from_cache: lookup.from_cache,
        });

        let entry = lookup.entry;
        if !entry.found {
            let e = lookup.failure.unwrap_or_else(|| {
                StageError::new(Stage::NoKeyMaterial, "issuer not found in trust registry")
            });
            return self.fail(steps, Some(thumbprint), e);
        }

        let key = match resolve_entry_key(entry.registry_response.as_ref()) {
            Ok(key) => key,
            Err(e) => return self.fail(steps, Some(thumbprint), e),
        };

        let report = match validate::validate_signature(&token, &key, &thumbprint) {
            Ok(report) => report,
            Err(e) => return self.fail(steps, Some(thumbprint), e),
        };
        self.sink.emit(ProgressEvent::SignatureChecked {
            valid: report.valid,
            issuer: Some(report.issuer.clone()),
        });
        info!(
            thumbprint = %thumbprint,
            valid = report.valid,
            issuer = ?report.issuer.official_id,
            "credential verified"
        );

        VerificationResult {
            steps,
            signature_valid: report.valid,
            issuer_info: Some(report.issuer),
            thumbprint: Some(thumbprint),
            key_thumbprint: Some(report.key_thumbprint),
            key_source: Some(report.key_source),
            error: report
                .error
                .map(|reason| StageError::new(Stage::SignatureVerify, reason)),
        }
    }

    fn fail(
        &self,
        steps: DecodeTrace,
        thumbprint: Option<String>,
        error: StageError,
    ) -> VerificationResult {
        debug!(stage = %error.stage, error = %error.message, "verification aborted");
        self.sink.emit(ProgressEvent::StageFailed(error.clone()));
        VerificationResult {
            thumbprint,
            ..VerificationResult::failed(steps, error)
        }
    }
}

fn resolve_entry_key(response: Option<&serde_json::Value>) -> Result<ResolvedKey, StageError> {
    match response {
        Some(response) => resolver::resolve_key(response),
        None => Err(StageError::new(
            Stage::NoKeyMaterial,
            "cached entry holds no registry response",
        )),
    }
}
