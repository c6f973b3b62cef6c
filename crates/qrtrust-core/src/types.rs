//! Registry response types.
//!
//! The registry and older exports spell key and certificate fields several
//! ways. Every accepted spelling is mapped here, at deserialization, so the
//! rest of the crate works against one fixed schema.

use serde::{Deserialize, Serialize};

/// One issuer record returned by `GET /issuers`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerRecord {
    /// Official issuer identifier.
    #[serde(default, alias = "issuerId", alias = "id")]
    pub official_id: Option<String>,

    /// ISO 3166 country code.
    #[serde(default, alias = "country", alias = "country_code")]
    pub country_code: Option<String>,

    /// Display name.
    #[serde(default, alias = "displayName", alias = "display_name")]
    pub name: Option<String>,

    /// JSON Web Keys.
    #[serde(default, alias = "public_keys", alias = "jwks", alias = "keys")]
    pub public_keys: Vec<Jwk>,

    /// X.509 certificates, PEM or bare base64 DER.
    #[serde(
        default,
        alias = "x509Certificates",
        alias = "x5c",
        alias = "certs"
    )]
    pub certificates: Vec<String>,

    /// Thumbprint the registry indexed this record under.
    #[serde(default, alias = "x509Thumbprint", alias = "x5t#S256")]
    pub thumbprint: Option<String>,
}

impl IssuerRecord {
    pub fn issuer_info(&self) -> IssuerInfo {
        IssuerInfo {
            official_id: self.official_id.clone(),
            country_code: self.country_code.clone(),
            name: self.name.clone(),
        }
    }
}

/// JSON Web Key as published by the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kty: Option<String>,

    #[serde(default)]
    pub kid: Option<String>,

    #[serde(default)]
    pub alg: Option<String>,

    /// RSA modulus, base64url big-endian.
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent, base64url big-endian.
    #[serde(default)]
    pub e: Option<String>,
}

/// Issuer metadata echoed with a verification verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerInfo {
    pub official_id: Option<String>,
    pub country_code: Option<String>,
    pub name: Option<String>,
}

/// What caused a cache entry to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSource {
    Upload,
    Verification,
    Refresh,
    Startup,
}

impl CacheSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Verification => "verification",
            Self::Refresh => "refresh",
            Self::Startup => "startup",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "upload" => Some(Self::Upload),
            "verification" => Some(Self::Verification),
            "refresh" => Some(Self::Refresh),
            "startup" => Some(Self::Startup),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issuer_record_aliases() {
        let canonical: IssuerRecord = serde_json::from_str(
            r#"{"officialId":"NL-1","countryCode":"NL","name":"Issuer",
                "publicKeys":[{"kty":"RSA","n":"AQAB","e":"AQAB"}],
                "certificates":["MIIB"]}"#,
        )
        .unwrap();
        let legacy: IssuerRecord = serde_json::from_str(
            r#"{"issuerId":"NL-1","country":"NL","displayName":"Issuer",
                "jwks":[{"kty":"RSA","n":"AQAB","e":"AQAB"}],
                "x5c":["MIIB"]}"#,
        )
        .unwrap();
        assert_eq!(canonical, legacy);
        assert_eq!(canonical.issuer_info().country_code.as_deref(), Some("NL"));
    }

    #[test]
    fn test_issuer_record_tolerates_missing_fields() {
        let record: IssuerRecord = serde_json::from_str("{}").unwrap();
        assert!(record.public_keys.is_empty());
        assert!(record.certificates.is_empty());
    }

    #[test]
    fn test_cache_source_round_trip() {
        for source in [
            CacheSource::Upload,
            CacheSource::Verification,
            CacheSource::Refresh,
            CacheSource::Startup,
        ] {
            assert_eq!(CacheSource::parse(source.as_str()), Some(source));
        }
        assert_eq!(CacheSource::parse("other"), None);
    }
}
