//! Hostname sanitization.
//!
//! Turns an untrusted string into a [`Hostname`] that is safe to pass to the
//! controller as an inventory limit.
//!
//! # Rules
//! - trim surrounding whitespace, lowercase
//! - length (in characters) within the configured bounds
//! - RFC 1123 grammar: dot-separated labels of 1-63 alphanumerics and
//!   hyphens, each starting and ending with an alphanumeric
//! - explicit rejection of `..`, a leading or trailing `-`, and anything
//!   outside `[a-z0-9.-]`, independent of the grammar check

use std::fmt;

use serde::Serialize;

use crate::config::HostnameConfig;

const MAX_LABEL_LEN: usize = 63;

/// A validated, normalized hostname.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Hostname(String);

impl Hostname {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for Hostname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validates raw hostnames against the configured length bounds.
#[derive(Debug, Clone, Copy)]
pub struct HostnameSanitizer {
    min_length: usize,
    max_length: usize,
}

impl Default for HostnameSanitizer {
    fn default() -> Self {
        Self::new(HostnameConfig::default())
    }
}

impl HostnameSanitizer {
    pub fn new(bounds: HostnameConfig) -> Self {
        Self {
            min_length: bounds.min_length,
            max_length: bounds.max_length,
        }
    }

    /// Normalize and validate `raw`. Returns `None` if it is not acceptable.
    pub fn sanitize(&self, raw: &str) -> Option<Hostname> {
        if raw.is_empty() {
            return None;
        }

        let candidate = raw.trim().to_lowercase();

        let len = candidate.chars().count();
        if len < self.min_length || len > self.max_length {
            tracing::warn!(length = len, "Hostname length invalid");
            return None;
        }

        if !matches_rfc1123(&candidate) {
            tracing::warn!(hostname = ?candidate, "Hostname does not match RFC 1123 grammar");
            return None;
        }

        if has_suspicious_pattern(&candidate) {
            tracing::warn!(hostname = ?candidate, "Hostname contains suspicious pattern");
            return None;
        }

        Some(Hostname(candidate))
    }
}

fn matches_rfc1123(candidate: &str) -> bool {
    candidate.split('.').all(is_valid_label)
}

fn is_valid_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= MAX_LABEL_LEN
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
        }
        _ => false,
    }
}

fn has_suspicious_pattern(candidate: &str) -> bool {
    candidate.contains("..")
        || candidate.starts_with('-')
        || candidate.ends_with('-')
        || candidate
            .chars()
            .any(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize(raw: &str) -> Option<String> {
        HostnameSanitizer::default()
            .sanitize(raw)
            .map(Hostname::into_inner)
    }

    #[test]
    fn test_accepts_valid_hostnames() {
        assert_eq!(sanitize("test.example.com").as_deref(), Some("test.example.com"));
        assert_eq!(sanitize("host-name").as_deref(), Some("host-name"));
        assert_eq!(sanitize("123test").as_deref(), Some("123test"));
        assert_eq!(sanitize("a").as_deref(), Some("a"));
        assert_eq!(sanitize("web-01.dc2.internal").as_deref(), Some("web-01.dc2.internal"));
    }

    #[test]
    fn test_normalizes_case_and_whitespace() {
        assert_eq!(sanitize("TEST.EXAMPLE.COM").as_deref(), Some("test.example.com"));
        assert_eq!(sanitize("  test.example.com  ").as_deref(), Some("test.example.com"));
        assert_eq!(sanitize("\tMixed.Case\n").as_deref(), Some("mixed.case"));
    }

    #[test]
    fn test_rejects_known_bad_inputs() {
        for raw in [
            "",
            "host..name",
            "-hostname",
            "hostname-",
            "host name",
            "host@name",
            ".leading.dot",
            "trailing.dot.",
            "under_score",
            "host;rm -rf",
            "host\nname",
            "   ",
        ] {
            assert_eq!(sanitize(raw), None, "expected {:?} to be rejected", raw);
        }
    }

    #[test]
    fn test_rejects_overlong_input() {
        assert_eq!(sanitize(&"a".repeat(300)), None);
    }

    #[test]
    fn test_label_length_limit() {
        let ok = format!("{}.example.com", "a".repeat(63));
        let too_long = format!("{}.example.com", "a".repeat(64));
        assert!(sanitize(&ok).is_some());
        assert_eq!(sanitize(&too_long), None);
    }

    #[test]
    fn test_hyphen_at_label_edges() {
        assert_eq!(sanitize("host.-name"), None);
        assert_eq!(sanitize("host-.name"), None);
        assert!(sanitize("ho-st.na-me").is_some());
    }

    #[test]
    fn test_non_ascii_rejected() {
        assert_eq!(sanitize("hôst.example.com"), None);
        assert_eq!(sanitize("xn--hst-ioa.example.com").as_deref(), Some("xn--hst-ioa.example.com"));
    }

    #[test]
    fn test_rejects_characters_outside_allowed_set() {
        for c in ['_', '/', ':', '*', '!', '$', '`', '\'', '"', '\\', '%', '+', '=', ',', '\0'] {
            let raw = format!("host{}name", c);
            assert_eq!(sanitize(&raw), None, "expected {:?} to be rejected", raw);
        }
    }

    #[test]
    fn test_idempotent_on_valid_input() {
        for raw in ["Example.COM", "  db-1.prod ", "x", "A1-B2.c3"] {
            let once = sanitize(raw).unwrap();
            let twice = sanitize(&once).unwrap();
            assert_eq!(once, twice);
            assert_eq!(once, once.trim().to_lowercase());
        }
    }

    #[test]
    fn test_custom_bounds() {
        let sanitizer = HostnameSanitizer::new(HostnameConfig {
            min_length: 3,
            max_length: 10,
        });
        assert!(sanitizer.sanitize("ab").is_none());
        assert!(sanitizer.sanitize("abc").is_some());
        assert!(sanitizer.sanitize("abcdefghij").is_some());
        assert!(sanitizer.sanitize("abcdefghijk").is_none());
        // Bounds apply after trimming.
        assert!(sanitizer.sanitize("   abc    ").is_some());
    }

    #[test]
    fn test_display_and_serialize() {
        let host = HostnameSanitizer::default().sanitize("Node1").unwrap();
        assert_eq!(host.to_string(), "node1");
        assert_eq!(serde_json::to_string(&host).unwrap(), "\"node1\"");
    }
}
