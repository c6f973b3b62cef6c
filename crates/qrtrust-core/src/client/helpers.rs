//! Pure helpers: URL building, body excerpts (no HTTP, no status logic).

use crate::error::{Stage, StageError, StageResult};

/// Query parameter the registry indexes issuers by.
pub(crate) const THUMBPRINT_PARAM: &str = "x509Thumbprint";

/// `<base>/issuers?x509Thumbprint=<thumbprint>`, percent-encoded.
pub(crate) fn issuers_url(base_url: &str, thumbprint: &str) -> StageResult<url::Url> {
    url::Url::parse_with_params(
        &format!("{}/issuers", base_url),
        &[(THUMBPRINT_PARAM, thumbprint)],
    )
    .map_err(|e| {
        StageError::new(
            Stage::RegistryUnreachable,
            format!("invalid registry url {}: {}", base_url, e),
        )
    })
}

/// First 200 characters of an error body, for cache `last_error`.
pub(crate) fn body_excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= 200 {
        trimmed.to_string()
    } else {
        let mut excerpt: String = trimmed.chars().take(200).collect();
        excerpt.push('…');
        excerpt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issuers_url() {
        let url = issuers_url("https://registry.example/api", "ab-c_d").unwrap();
        assert_eq!(
            url.as_str(),
            "https://registry.example/api/issuers?x509Thumbprint=ab-c_d"
        );
    }

    #[test]
    fn test_issuers_url_encodes_reserved() {
        let url = issuers_url("http://localhost:1", "a+b/c=").unwrap();
        assert_eq!(url.query(), Some("x509Thumbprint=a%2Bb%2Fc%3D"));
    }

    #[test]
    fn test_invalid_base() {
        let err = issuers_url("not a url", "tp").unwrap_err();
        assert_eq!(err.stage, Stage::RegistryUnreachable);
    }

    #[test]
    fn test_body_excerpt_truncates() {
        assert_eq!(body_excerpt("  busy \n"), "busy");
        let long = "x".repeat(500);
        assert_eq!(body_excerpt(&long).chars().count(), 201);
    }
}
