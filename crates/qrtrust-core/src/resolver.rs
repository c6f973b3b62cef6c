//! Issuer key material resolution.
//!
//! Priority: first JWK (RSA only), else first X.509 certificate, else
//! `no-key-material`. A JWK without `kty` is skipped. The response shape is
//! checked before either branch.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::{BigUint, RsaPublicKey};
use serde::Serialize;
use tracing::debug;

use crate::error::{Stage, StageError, StageResult};
use crate::thumbprint::thumbprint_of_der;
use crate::types::{IssuerInfo, IssuerRecord, Jwk};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Where a resolved key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    Jwk,
    Certificate,
}

/// A usable issuer public key plus the metadata verification echoes back.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedKey {
    pub key: RsaPublicKey,
    pub source: KeySource,
    /// URL-safe SHA-256 thumbprint of the certificate, when the key came from one.
    pub certificate_thumbprint: Option<String>,
    pub issuer: IssuerInfo,
}

impl ResolvedKey {
    /// SPKI PEM encoding, as stored in the trust cache.
    pub fn to_pem(&self) -> StageResult<String> {
        self.key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| StageError::new(Stage::NoKeyMaterial, format!("failed to encode key: {}", e)))
    }
}

/// Unwrap a registry response into its issuer list.
///
/// Accepts the bare array the registry returns, or the same array nested
/// under `results`. Anything else is `invalid-registry-response`. Records
/// are not inspected here; a non-empty list means the issuer is known.
pub fn issuer_list(response: &serde_json::Value) -> StageResult<&[serde_json::Value]> {
    match response {
        serde_json::Value::Array(items) => Ok(items),
        serde_json::Value::Object(map) => match map.get("results") {
            Some(serde_json::Value::Array(items)) => Ok(items),
            _ => Err(StageError::new(
                Stage::InvalidRegistryResponse,
                "response object has no results array",
            )),
        },
        other => Err(StageError::new(
            Stage::InvalidRegistryResponse,
            format!("expected an array of issuer records, got {}", json_kind(other)),
        )),
    }
}

/// Deserialize the first issuer record of a registry response.
pub fn first_issuer(response: &serde_json::Value) -> StageResult<IssuerRecord> {
    let item = issuer_list(response)?.first().ok_or_else(|| {
        StageError::new(Stage::NoKeyMaterial, "registry returned no issuer records")
    })?;
    if !item.is_object() {
        return Err(StageError::new(
            Stage::InvalidRegistryResponse,
            format!("issuer record is {}, not an object", json_kind(item)),
        ));
    }
    serde_json::from_value(item.clone()).map_err(|e| {
        StageError::new(
            Stage::InvalidRegistryResponse,
            format!("malformed issuer record: {}", e),
        )
    })
}

/// Resolve the first issuer's key from a raw registry response.
pub fn resolve_key(response: &serde_json::Value) -> StageResult<ResolvedKey> {
    resolve_record(&first_issuer(response)?)
}

/// Resolve one issuer record's key.
pub fn resolve_record(record: &IssuerRecord) -> StageResult<ResolvedKey> {
    if let Some(jwk) = record.public_keys.first() {
        match jwk.kty.as_deref() {
            Some(kty) if !kty.eq_ignore_ascii_case("RSA") => {
                return Err(StageError::new(
                    Stage::UnsupportedKeyType,
                    format!("unsupported JWK key type {:?}", kty),
                ));
            }
            None => debug!(kid = ?jwk.kid, "JWK has no key type, trying certificates"),
            Some(_) => {}
        }
        if jwk.kty.is_some() && jwk.n.is_some() && jwk.e.is_some() {
            let key = key_from_jwk(jwk)?;
            debug!(kid = ?jwk.kid, "resolved issuer key from JWK");
            return Ok(ResolvedKey {
                key,
                source: KeySource::Jwk,
                certificate_thumbprint: None,
                issuer: record.issuer_info(),
            });
        }
        debug!(kid = ?jwk.kid, "RSA JWK lacks modulus or exponent, trying certificates");
    }

    if let Some(cert) = record.certificates.first() {
        let (key, thumbprint) = key_from_certificate(cert)?;
        debug!(thumbprint = %thumbprint, "resolved issuer key from certificate");
        return Ok(ResolvedKey {
            key,
            source: KeySource::Certificate,
            certificate_thumbprint: Some(thumbprint),
            issuer: record.issuer_info(),
        });
    }

    Err(StageError::new(
        Stage::NoKeyMaterial,
        "issuer record carries neither a usable JWK nor a certificate",
    ))
}

/// Build an RSA public key from a JWK's base64url `n` and `e`.
pub fn key_from_jwk(jwk: &Jwk) -> StageResult<RsaPublicKey> {
    let (Some(n), Some(e)) = (&jwk.n, &jwk.e) else {
        return Err(StageError::new(
            Stage::NoKeyMaterial,
            "RSA JWK is missing modulus or exponent",
        ));
    };

    let n = decode_component(n, "modulus")?;
    let e = decode_component(e, "exponent")?;

    RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e)).map_err(|err| {
        StageError::new(
            Stage::InvalidRegistryResponse,
            format!("invalid RSA key components: {}", err),
        )
    })
}

fn decode_component(value: &str, what: &str) -> StageResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| {
            StageError::new(
                Stage::InvalidRegistryResponse,
                format!("JWK {} is not valid base64url: {}", what, e),
            )
        })
}

/// Extract the RSA public key from a PEM or bare base64 certificate.
///
/// Returns the key and the certificate's URL-safe SHA-256 thumbprint.
pub fn key_from_certificate(cert: &str) -> StageResult<(RsaPublicKey, String)> {
    let pem_text = ensure_pem(cert);

    let (_, pem) = x509_parser::pem::parse_x509_pem(pem_text.as_bytes()).map_err(|e| {
        StageError::new(
            Stage::InvalidRegistryResponse,
            format!("invalid certificate PEM: {}", e),
        )
    })?;

    let (_, parsed) = x509_parser::parse_x509_certificate(&pem.contents).map_err(|e| {
        StageError::new(
            Stage::InvalidRegistryResponse,
            format!("invalid certificate DER: {}", e),
        )
    })?;

    // `raw` is the DER encoding of the SPKI structure inside the certificate.
    let spki = parsed.tbs_certificate.subject_pki.raw;
    let key = RsaPublicKey::from_public_key_der(spki).map_err(|e| {
        StageError::new(
            Stage::UnsupportedKeyType,
            format!("certificate does not carry an RSA key: {}", e),
        )
    })?;

    Ok((key, thumbprint_of_der(&pem.contents)))
}

fn ensure_pem(cert: &str) -> String {
    let trimmed = cert.trim();
    if trimmed.contains(PEM_BEGIN) {
        return trimmed.to_string();
    }

    let body: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pem = String::with_capacity(body.len() + body.len() / 64 + 64);
    pem.push_str(PEM_BEGIN);
    pem.push('\n');
    for line in body.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(PEM_END);
    pem.push('\n');
    pem
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::traits::PublicKeyParts;
    use serde_json::json;

    const CERT_PEM: &str = include_str!("../tests/fixtures/issuer.cert.pem");
    const CERT_THUMBPRINT: &str = include_str!("../tests/fixtures/issuer.thumbprint");

    fn bare_certificate() -> String {
        CERT_PEM
            .lines()
            .filter(|l| !l.starts_with("-----"))
            .collect::<Vec<_>>()
            .join("")
    }

    fn cert_key() -> RsaPublicKey {
        key_from_certificate(CERT_PEM).unwrap().0
    }

    fn jwk_for(key: &RsaPublicKey) -> serde_json::Value {
        json!({
            "kty": "RSA",
            "kid": "k1",
            "n": URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
        })
    }

    #[test]
    fn test_rsa_jwk_resolves() {
        let expected = cert_key();
        let response = json!([{
            "officialId": "NL-MOH",
            "countryCode": "NL",
            "name": "Ministry",
            "publicKeys": [jwk_for(&expected)],
        }]);

        let resolved = resolve_key(&response).unwrap();
        assert_eq!(resolved.source, KeySource::Jwk);
        assert_eq!(resolved.key, expected);
        assert_eq!(resolved.issuer.official_id.as_deref(), Some("NL-MOH"));
        assert!(resolved.certificate_thumbprint.is_none());
    }

    #[test]
    fn test_ec_jwk_unsupported() {
        let response = json!([{
            "publicKeys": [{"kty": "EC", "crv": "P-256", "x": "AA", "y": "AA"}],
            "certificates": [CERT_PEM],
        }]);
        let err = resolve_key(&response).unwrap_err();
        assert_eq!(err.stage, Stage::UnsupportedKeyType);
    }

    #[test]
    fn test_jwk_without_kty_falls_back_to_certificate() {
        let response = json!([{
            "name": "Issuer",
            "publicKeys": [{ "n": "AQAB", "e": "AQAB" }],
            "certificates": [CERT_PEM],
        }]);
        let resolved = resolve_key(&response).unwrap();
        assert_eq!(resolved.source, KeySource::Certificate);
        assert_eq!(resolved.key, cert_key());

        let err = resolve_key(&json!([{ "publicKeys": [{ "n": "AQAB", "e": "AQAB" }] }]))
            .unwrap_err();
        assert_eq!(err.stage, Stage::NoKeyMaterial);
    }

    #[test]
    fn test_issuer_list_ignores_record_contents() {
        let response = json!([{ "publicKeys": "not-a-list" }, 7]);
        assert_eq!(issuer_list(&response).unwrap().len(), 2);
        assert_eq!(
            issuer_list(&json!({ "results": [] })).unwrap().len(),
            0
        );
        let err = resolve_key(&response).unwrap_err();
        assert_eq!(err.stage, Stage::InvalidRegistryResponse);
    }

    #[test]
    fn test_certificate_pem_resolves() {
        let response = json!([{ "certificates": [CERT_PEM] }]);
        let resolved = resolve_key(&response).unwrap();
        assert_eq!(resolved.source, KeySource::Certificate);
        assert_eq!(
            resolved.certificate_thumbprint.as_deref(),
            Some(crate::thumbprint::normalize(CERT_THUMBPRINT).value.as_str())
        );
    }

    #[test]
    fn test_bare_certificate_gets_wrapped() {
        let (key, _) = key_from_certificate(&bare_certificate()).unwrap();
        assert_eq!(key, cert_key());
    }

    #[test]
    fn test_empty_jwk_list_falls_back_to_certificate() {
        let response = json!({ "results": [{ "publicKeys": [], "x5c": [bare_certificate()] }] });
        assert_eq!(resolve_key(&response).unwrap().source, KeySource::Certificate);
    }

    #[test]
    fn test_no_key_material() {
        let err = resolve_key(&json!([{ "name": "Keyless" }])).unwrap_err();
        assert_eq!(err.stage, Stage::NoKeyMaterial);

        let err = resolve_key(&json!([])).unwrap_err();
        assert_eq!(err.stage, Stage::NoKeyMaterial);
    }

    #[test]
    fn test_invalid_shape_checked_first() {
        for response in [json!({"issuers": []}), json!("nope"), json!([42]), json!(null)] {
            let err = resolve_key(&response).unwrap_err();
            assert_eq!(err.stage, Stage::InvalidRegistryResponse, "{}", response);
        }
    }

    #[test]
    fn test_garbage_certificate_is_invalid_response() {
        let err = resolve_key(&json!([{ "certificates": ["bm90IGEgY2VydA=="] }])).unwrap_err();
        assert_eq!(err.stage, Stage::InvalidRegistryResponse);
    }

    #[test]
    fn test_pem_round_trip() {
        let resolved = resolve_key(&json!([{ "certificates": [CERT_PEM] }])).unwrap();
        let pem = resolved.to_pem().unwrap();
        assert_eq!(RsaPublicKey::from_public_key_pem(&pem).unwrap(), resolved.key);
    }
}
