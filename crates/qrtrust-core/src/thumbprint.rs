//! Certificate thumbprint normalization.
//!
//! The registry indexes issuers by the URL-safe, unpadded base64 form of the
//! SHA-256 digest of their DER certificate. Scanned tokens and operators may
//! hand us the standard base64 form instead; both carry the same bits, so
//! normalization only touches punctuation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Which normalization branch fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Conversion {
    /// Standard markers only: padding stripped, `+`/`/` mapped to `-`/`_`.
    StandardToUrlSafe,
    /// URL-safe markers only: passed through.
    AlreadyUrlSafe,
    /// No markers at all: assumed URL-safe, passed through.
    NoMarkers,
    /// Both marker sets present: passed through unchanged, degraded.
    Mixed,
}

impl Conversion {
    /// Whether the input was malformed and passed through as-is.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Mixed)
    }
}

/// Character-class flags of a thumbprint string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharClasses {
    pub has_plus: bool,
    pub has_slash: bool,
    pub has_padding: bool,
    pub has_dash: bool,
    pub has_underscore: bool,
}

impl CharClasses {
    pub fn of(value: &str) -> Self {
        let mut classes = Self::default();
        for c in value.chars() {
            match c {
                '+' => classes.has_plus = true,
                '/' => classes.has_slash = true,
                '=' => classes.has_padding = true,
                '-' => classes.has_dash = true,
                '_' => classes.has_underscore = true,
                _ => {}
            }
        }
        classes
    }

    pub fn has_standard_markers(&self) -> bool {
        self.has_plus || self.has_slash || self.has_padding
    }

    pub fn has_url_safe_markers(&self) -> bool {
        self.has_dash || self.has_underscore
    }
}

/// Result of normalizing a thumbprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub value: String,
    pub conversion: Conversion,
}

/// Normalize a thumbprint of unknown encoding to the URL-safe form.
pub fn normalize(raw: &str) -> Normalized {
    let raw = raw.trim();
    let classes = CharClasses::of(raw);

    let (value, conversion) = match (
        classes.has_standard_markers(),
        classes.has_url_safe_markers(),
    ) {
        (true, false) => (to_url_safe(raw), Conversion::StandardToUrlSafe),
        (false, true) => (raw.to_string(), Conversion::AlreadyUrlSafe),
        (false, false) => (raw.to_string(), Conversion::NoMarkers),
        (true, true) => {
            warn!(thumbprint = %raw, "thumbprint mixes standard and url-safe base64 markers");
            (raw.to_string(), Conversion::Mixed)
        }
    };

    Normalized { value, conversion }
}

fn to_url_safe(standard: &str) -> String {
    standard
        .chars()
        .filter(|c| *c != '=')
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect()
}

/// Reverse the URL-safe mapping and re-pad to a multiple of four characters.
pub fn to_standard(url_safe: &str) -> String {
    let mut out: String = url_safe
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    while out.len() % 4 != 0 {
        out.push('=');
    }
    out
}

/// URL-safe SHA-256 thumbprint of a DER certificate.
pub fn thumbprint_of_der(der: &[u8]) -> String {
    let digest = Sha256::digest(der);
    URL_SAFE_NO_PAD.encode(&digest[..])
}

/// Support/debugging view of a normalization.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbprintDiagnostics {
    pub original: String,
    pub normalized: String,
    pub conversion: Conversion,
    pub degraded: bool,
    pub original_classes: CharClasses,
    pub normalized_classes: CharClasses,
}

/// Diagnose a raw thumbprint without touching the registry.
pub fn diagnose(raw: &str) -> ThumbprintDiagnostics {
    let normalized = normalize(raw);
    ThumbprintDiagnostics {
        original: raw.to_string(),
        original_classes: CharClasses::of(raw),
        normalized_classes: CharClasses::of(&normalized.value),
        degraded: normalized.conversion.is_degraded(),
        conversion: normalized.conversion,
        normalized: normalized.value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    #[test]
    fn test_standard_converted() {
        let n = normalize("ab+c/d==");
        assert_eq!(n.value, "ab-c_d");
        assert_eq!(n.conversion, Conversion::StandardToUrlSafe);
    }

    #[test]
    fn test_url_safe_passthrough() {
        let n = normalize("ab-c_d");
        assert_eq!(n.value, "ab-c_d");
        assert_eq!(n.conversion, Conversion::AlreadyUrlSafe);
    }

    #[test]
    fn test_no_markers_assumed_url_safe() {
        let n = normalize("abcd1234");
        assert_eq!(n.value, "abcd1234");
        assert_eq!(n.conversion, Conversion::NoMarkers);
        assert!(!n.conversion.is_degraded());
    }

    #[test]
    fn test_mixed_passthrough_degraded() {
        let n = normalize("ab+c_d");
        assert_eq!(n.value, "ab+c_d");
        assert_eq!(n.conversion, Conversion::Mixed);
        assert!(n.conversion.is_degraded());
    }

    #[test]
    fn test_round_trip_restores_standard_form() {
        // SHA-256 digests are 32 bytes: 43 chars + one '=' in standard base64.
        for seed in 0u8..64 {
            let bytes: Vec<u8> = (0..32)
                .map(|i| seed.wrapping_mul(31).wrapping_add(i * 7))
                .collect();
            let standard = STANDARD.encode(&bytes);
            assert!(CharClasses::of(&standard).has_standard_markers());

            let n = normalize(&standard);
            assert_eq!(n.conversion, Conversion::StandardToUrlSafe);
            assert_eq!(to_standard(&n.value), standard);
        }
    }

    #[test]
    fn test_round_trip_preserves_bits() {
        let bytes = [0xfbu8, 0xff, 0xbf, 0x00, 0x3e, 0x3f];
        let standard = STANDARD.encode(bytes);
        let url_safe = normalize(&standard).value;
        assert_eq!(URL_SAFE_NO_PAD.decode(&url_safe).unwrap(), bytes);
    }

    #[test]
    fn test_thumbprint_of_der_is_url_safe() {
        let tp = thumbprint_of_der(b"not really a certificate");
        assert_eq!(tp.len(), 43);
        let classes = CharClasses::of(&tp);
        assert!(!classes.has_standard_markers());
    }

    #[test]
    fn test_diagnose_reports_both_sides() {
        let d = diagnose("ab+c/d==");
        assert_eq!(d.normalized, "ab-c_d");
        assert!(d.original_classes.has_plus);
        assert!(d.original_classes.has_padding);
        assert!(d.normalized_classes.has_dash);
        assert!(!d.normalized_classes.has_standard_markers());
        assert!(!d.degraded);
    }
}
