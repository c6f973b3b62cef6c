//! Shared fixtures: issuer keys, signed tokens and encoded credentials.

#![allow(dead_code)]

use std::io::Write;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use qrtrust_core::decode::base45;
use qrtrust_core::{TrustCache, TrustConfig, TrustRegistryClient};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{json, Value};
use wiremock::MockServer;

pub const CERT_PEM: &str = include_str!("../fixtures/issuer.cert.pem");
pub const KEY_PEM: &str = include_str!("../fixtures/issuer.key.pem");
const CERT_THUMBPRINT_STD: &str = include_str!("../fixtures/issuer.thumbprint");

/// Standard-base64 thumbprint of the fixture certificate.
pub fn cert_thumbprint_std() -> String {
    CERT_THUMBPRINT_STD.trim().to_string()
}

/// URL-safe thumbprint of the fixture certificate.
pub fn cert_thumbprint() -> String {
    qrtrust_core::normalize(CERT_THUMBPRINT_STD).value
}

/// Certificate body without PEM markers.
pub fn bare_certificate() -> String {
    CERT_PEM
        .lines()
        .filter(|l| !l.starts_with("-----"))
        .collect()
}

pub fn fixture_key() -> RsaPrivateKey {
    RsaPrivateKey::from_pkcs8_pem(KEY_PEM).expect("fixture key")
}

pub fn random_key() -> RsaPrivateKey {
    RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("keygen")
}

pub fn rsa_jwk(key: &RsaPublicKey) -> Value {
    json!({
        "kty": "RSA",
        "kid": "test-key",
        "alg": "RS256",
        "n": URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
        "e": URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
    })
}

/// `header.payload.signature`, RS256-signed with `key`.
pub fn signed_token(header: &Value, payload: &Value, key: &RsaPrivateKey) -> String {
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    );
    let signer = SigningKey::<Sha256>::new(key.clone());
    let signature = signer.sign(signing_input.as_bytes()).to_bytes();
    format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature))
}

/// zlib + BASE45, as printed in the QR code.
pub fn encode_credential(token: &str) -> String {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(token.as_bytes()).unwrap();
    base45::encode(&enc.finish().unwrap())
}

pub fn sample_payload() -> Value {
    json!({
        "iss": "NL",
        "sub": { "name": "Jane Doe", "dob": "1990-01-01" },
        "v": [{ "dn": 2, "sd": 2, "dt": "2021-06-01" }],
    })
}

/// A credential signed by the fixture issuer, naming its certificate.
pub fn fixture_credential() -> String {
    let header = json!({ "alg": "RS256", "x5t#S256": cert_thumbprint() });
    encode_credential(&signed_token(&header, &sample_payload(), &fixture_key()))
}

pub fn test_config(mock_server: &MockServer) -> TrustConfig {
    TrustConfig::default()
        .with_registry_url(mock_server.uri())
        .with_timeout(Duration::from_millis(500))
        .with_min_call_interval(Duration::ZERO)
}

pub fn create_test_client(mock_server: &MockServer) -> TrustRegistryClient {
    TrustRegistryClient::new(&test_config(mock_server), TrustCache::memory().unwrap())
        .expect("failed to create client")
}
