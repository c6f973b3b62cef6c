//! Three-segment signed token (`header.payload.signature`).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{Stage, StageError, StageResult};

/// Header fields the verifier acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    #[serde(default)]
    pub alg: Option<String>,

    #[serde(default)]
    pub kid: Option<String>,

    /// SHA-256 thumbprint of the signing certificate.
    #[serde(default, rename = "x5t#S256")]
    pub x5t_s256: Option<String>,

    #[serde(default)]
    pub typ: Option<String>,
}

impl TokenHeader {
    /// Certificate thumbprint used to look the issuer up.
    pub fn thumbprint(&self) -> Option<&str> {
        let present = |t: &&str| !t.trim().is_empty();
        self.x5t_s256
            .as_deref()
            .filter(present)
            .or_else(|| self.kid.as_deref().filter(present))
    }
}

/// A parsed token. Segments are kept verbatim for signature verification.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToken {
    raw: String,
    payload_end: usize,
    pub header: TokenHeader,
    pub header_json: serde_json::Value,
    pub payload: serde_json::Value,
}

impl ParsedToken {
    /// Parse `header.payload.signature`; header and payload are base64url JSON.
    pub fn parse(token: &str) -> StageResult<Self> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(StageError::new(
                Stage::TokenParse,
                format!("expected 3 segments, got {}", parts.len()),
            ));
        }

        let header_json = decode_json_segment(parts[0], "header")?;
        if !header_json.is_object() {
            return Err(StageError::new(
                Stage::TokenParse,
                "header is not a JSON object",
            ));
        }
        let header: TokenHeader = serde_json::from_value(header_json.clone())
            .map_err(|e| StageError::new(Stage::TokenParse, format!("invalid header: {}", e)))?;
        let payload = decode_json_segment(parts[1], "payload")?;

        let payload_end = parts[0].len() + 1 + parts[1].len();

        Ok(Self {
            raw: token.to_string(),
            payload_end,
            header,
            header_json,
            payload,
        })
    }

    /// The original token text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Exact bytes the signature covers: `header.payload`, still encoded.
    pub fn signing_input(&self) -> &str {
        &self.raw[..self.payload_end]
    }

    pub fn signature_segment(&self) -> &str {
        &self.raw[self.payload_end + 1..]
    }
}

fn decode_json_segment(segment: &str, what: &str) -> StageResult<serde_json::Value> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| {
            StageError::new(
                Stage::TokenParse,
                format!("{} is not valid base64url: {}", what, e),
            )
        })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| StageError::new(Stage::TokenParse, format!("{} is not JSON: {}", what, e)))
}
