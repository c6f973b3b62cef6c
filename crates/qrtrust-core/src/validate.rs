//! RS256 signature validation over the token's signing input.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rsa::pkcs1v15;
use rsa::sha2::Sha256;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use serde::Serialize;
use tracing::debug;

use crate::decode::{ParsedToken, TokenHeader};
use crate::error::{Stage, StageError, StageResult};
use crate::resolver::{KeySource, ResolvedKey};
use crate::types::IssuerInfo;

/// The only accepted signature algorithm.
pub const RS256: &str = "RS256";

/// Verdict of a signature check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureReport {
    pub valid: bool,
    pub issuer: IssuerInfo,
    /// Thumbprint of the key that was used.
    pub key_thumbprint: String,
    pub key_source: KeySource,
    /// Why verification failed, if it did.
    pub error: Option<String>,
}

/// Reject any declared algorithm other than RS256.
pub fn check_algorithm(header: &TokenHeader) -> StageResult<()> {
    match header.alg.as_deref() {
        Some(RS256) => Ok(()),
        Some(other) => Err(StageError::new(
            Stage::UnsupportedAlgorithm,
            format!("unsupported signature algorithm {:?}", other),
        )),
        None => Err(StageError::new(
            Stage::UnsupportedAlgorithm,
            "token header declares no algorithm",
        )),
    }
}

/// Verify RSASSA-PKCS1-v1_5 + SHA-256 over `message`.
pub fn verify_rs256(key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> Result<(), String> {
    let vk = pkcs1v15::VerifyingKey::<Sha256>::new(key.clone());
    let signature = pkcs1v15::Signature::try_from(signature)
        .map_err(|e| format!("bad RS256 signature bytes: {e}"))?;
    vk.verify(message, &signature)
        .map_err(|_| "signature verification failed".to_string())
}

/// Check `token` against a resolved issuer key.
///
/// Only a disallowed algorithm is an `Err`. Malformed signature bytes and
/// mismatches come back as `valid: false` with the reason attached.
/// `registry_thumbprint` is reported as the key thumbprint for JWK keys.
pub fn validate_signature(
    token: &ParsedToken,
    key: &ResolvedKey,
    registry_thumbprint: &str,
) -> StageResult<SignatureReport> {
    check_algorithm(&token.header)?;

    let key_thumbprint = key
        .certificate_thumbprint
        .clone()
        .unwrap_or_else(|| registry_thumbprint.to_string());

    let result = URL_SAFE_NO_PAD
        .decode(token.signature_segment().trim_end_matches('='))
        .map_err(|e| format!("signature is not valid base64url: {e}"))
        .and_then(|sig| verify_rs256(&key.key, token.signing_input().as_bytes(), &sig));

    let (valid, error) = match result {
        Ok(()) => (true, None),
        Err(reason) => (false, Some(reason)),
    };
    debug!(
        valid,
        key_thumbprint = %key_thumbprint,
        source = ?key.source,
        "signature checked"
    );

    Ok(SignatureReport {
        valid,
        issuer: key.issuer.clone(),
        key_thumbprint,
        key_source: key.source,
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::DecodePrivateKey;
    use rsa::signature::{SignatureEncoding, Signer};
    use rsa::RsaPrivateKey;

    const KEY_PEM: &str = include_str!("../tests/fixtures/issuer.key.pem");
    const CERT_PEM: &str = include_str!("../tests/fixtures/issuer.cert.pem");

    fn signed_token(alg: &str, payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(format!(r#"{{"alg":"{alg}","kid":"k"}}"#));
        let payload = URL_SAFE_NO_PAD.encode(payload);
        let signing_input = format!("{header}.{payload}");

        let private = RsaPrivateKey::from_pkcs8_pem(KEY_PEM).unwrap();
        let signer = pkcs1v15::SigningKey::<Sha256>::new(private);
        let sig = signer.sign(signing_input.as_bytes()).to_bytes();
        format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(sig))
    }

    fn certificate_key() -> ResolvedKey {
        let (key, thumbprint) = crate::resolver::key_from_certificate(CERT_PEM).unwrap();
        ResolvedKey {
            key,
            source: KeySource::Certificate,
            certificate_thumbprint: Some(thumbprint),
            issuer: IssuerInfo {
                official_id: Some("NL-MOH".into()),
                country_code: Some("NL".into()),
                name: None,
            },
        }
    }

    #[test]
    fn test_valid_signature() {
        let token = ParsedToken::parse(&signed_token("RS256", r#"{"sub":"x"}"#)).unwrap();
        let key = certificate_key();
        let report = validate_signature(&token, &key, "registry-tp").unwrap();
        assert!(report.valid, "{:?}", report.error);
        assert_eq!(report.issuer.country_code.as_deref(), Some("NL"));
        assert_eq!(Some(report.key_thumbprint), key.certificate_thumbprint);
    }

    #[test]
    fn test_tampered_payload_invalid() {
        let token = signed_token("RS256", r#"{"sub":"x"}"#);
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(r#"{"sub":"y"}"#);
        parts[1] = &forged;
        let token = ParsedToken::parse(&parts.join(".")).unwrap();

        let report = validate_signature(&token, &certificate_key(), "tp").unwrap();
        assert!(!report.valid);
        assert!(report.error.is_some());
    }

    #[test]
    fn test_garbage_signature_bytes_not_fatal() {
        let token = signed_token("RS256", "{}");
        let (input, _) = token.rsplit_once('.').unwrap();
        let token = ParsedToken::parse(&format!("{input}.%%%")).unwrap();
        let report = validate_signature(&token, &certificate_key(), "tp").unwrap();
        assert!(!report.valid);
        assert!(report.error.unwrap().contains("base64url"));
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let token = ParsedToken::parse(&signed_token("HS256", "{}")).unwrap();
        let err = validate_signature(&token, &certificate_key(), "tp").unwrap_err();
        assert_eq!(err.stage, Stage::UnsupportedAlgorithm);
    }

    #[test]
    fn test_missing_algorithm_rejected() {
        let header = TokenHeader::default();
        assert_eq!(
            check_algorithm(&header).unwrap_err().stage,
            Stage::UnsupportedAlgorithm
        );
    }

    #[test]
    fn test_jwk_key_reports_registry_thumbprint() {
        let token = ParsedToken::parse(&signed_token("RS256", "{}")).unwrap();
        let mut key = certificate_key();
        key.source = KeySource::Jwk;
        key.certificate_thumbprint = None;
        let report = validate_signature(&token, &key, "registry-tp").unwrap();
        assert!(report.valid);
        assert_eq!(report.key_thumbprint, "registry-tp");
    }
}
