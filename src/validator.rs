// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Threat-pattern request inspection.
//!
//! Inspects query and path parameters against a static signature set and
//! rejects on the first match. Request bodies and headers are deliberately
//! not inspected; widening that scope is a contract change, not a fix.
//!
//! Pattern-based detection is inherently incomplete: encoded or obfuscated
//! payloads can slip past it, and [`ThreatValidator::sanitize`] is
//! best-effort normalization, not a security guarantee. This is a permanent
//! limitation of the approach, documented rather than papered over.

use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Category a signature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatCategory {
    SqlInjection,
    CrossSiteScripting,
}

impl std::fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SqlInjection => write!(f, "SQL injection"),
            Self::CrossSiteScripting => write!(f, "XSS"),
        }
    }
}

/// A named, immutable attack pattern. Compiled once at startup and shared
/// read-only across requests.
#[derive(Debug, Clone)]
pub struct ThreatSignature {
    pub name: &'static str,
    pub category: ThreatCategory,
    pattern: Regex,
}

impl ThreatSignature {
    fn new(name: &'static str, category: ThreatCategory, pattern: &str) -> Self {
        // Signatures are compile-time constants; a malformed one is a
        // programming error caught by the unit tests.
        Self {
            name,
            category,
            pattern: Regex::new(pattern).expect("invalid threat signature"),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        self.pattern.is_match(value)
    }
}

/// Violation reported by [`ThreatValidator::scan_params`].
#[derive(Debug, Error, Clone)]
#[error("{category} detected in parameter: {param}")]
pub struct ThreatDetected {
    pub param: String,
    pub category: ThreatCategory,
    pub signature: &'static str,
}

/// Result of scanning a request's parameters.
#[derive(Debug, Clone)]
pub enum ScanResult {
    Pass,
    Reject(ThreatDetected),
}

impl ScanResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, ScanResult::Pass)
    }

    pub fn violation(&self) -> Option<&ThreatDetected> {
        match self {
            ScanResult::Pass => None,
            ScanResult::Reject(v) => Some(v),
        }
    }
}

/// The built-in signature set, version 1. All patterns are case-insensitive.
pub fn default_signatures() -> Vec<ThreatSignature> {
    use ThreatCategory::{CrossSiteScripting, SqlInjection};
    vec![
        ThreatSignature::new("union-select", SqlInjection, r"(?i)\bunion\b.*\bselect\b"),
        ThreatSignature::new("or-equality", SqlInjection, r"(?i)\bor\b.*="),
        ThreatSignature::new("and-equality", SqlInjection, r"(?i)\band\b.*="),
        ThreatSignature::new("quoted-or", SqlInjection, r"(?i)'.*or.*'.*=.*'"),
        ThreatSignature::new("comment-marker", SqlInjection, r"--"),
        ThreatSignature::new("stacked-drop", SqlInjection, r"(?i);.*\bdrop\b"),
        ThreatSignature::new("stacked-delete", SqlInjection, r"(?i);.*\bdelete\b"),
        ThreatSignature::new("stacked-insert", SqlInjection, r"(?i);.*\binsert\b"),
        ThreatSignature::new("stacked-update", SqlInjection, r"(?i);.*\bupdate\b"),
        ThreatSignature::new(
            "script-tag",
            CrossSiteScripting,
            r"(?i)<script[^>]*>.*?</script>",
        ),
        ThreatSignature::new("javascript-uri", CrossSiteScripting, r"(?i)javascript:"),
        ThreatSignature::new("onerror-handler", CrossSiteScripting, r"(?i)onerror\s*="),
        ThreatSignature::new("onload-handler", CrossSiteScripting, r"(?i)onload\s*="),
        ThreatSignature::new("iframe-tag", CrossSiteScripting, r"(?i)<iframe[^>]*>"),
    ]
}

/// Request inspector over a pluggable signature set.
pub struct ThreatValidator {
    signatures: Vec<ThreatSignature>,
    tag_shape: Regex,
    risky_punctuation: Regex,
}

impl Default for ThreatValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreatValidator {
    /// Create a validator with the built-in signature set.
    pub fn new() -> Self {
        Self::with_signatures(default_signatures())
    }

    /// Create a validator with a custom signature set. New signatures slot
    /// in here without touching call sites.
    pub fn with_signatures(signatures: Vec<ThreatSignature>) -> Self {
        Self {
            signatures,
            tag_shape: Regex::new(r"<[^>]*>").expect("invalid tag pattern"),
            risky_punctuation: Regex::new(r#"(--|;|'|")"#).expect("invalid punctuation pattern"),
        }
    }

    fn matches_category(&self, value: &str, category: ThreatCategory) -> bool {
        self.signatures
            .iter()
            .filter(|sig| sig.category == category)
            .any(|sig| sig.matches(value))
    }

    /// Whether a value matches any SQL-injection signature.
    pub fn contains_injection_signature(&self, value: &str) -> bool {
        self.matches_category(value, ThreatCategory::SqlInjection)
    }

    /// Whether a value matches any script-injection signature.
    pub fn contains_script_signature(&self, value: &str) -> bool {
        self.matches_category(value, ThreatCategory::CrossSiteScripting)
    }

    /// Strip HTML-tag shapes and high-risk punctuation, then trim.
    ///
    /// Best-effort normalization only; not invoked by [`scan_params`] and
    /// not a substitute for output encoding.
    ///
    /// [`scan_params`]: ThreatValidator::scan_params
    pub fn sanitize(&self, value: &str) -> String {
        let value = self.tag_shape.replace_all(value, "");
        let value = self.risky_punctuation.replace_all(&value, "");
        value.trim().to_string()
    }

    /// Scan (name, value) parameter pairs, rejecting on the first signature
    /// match. Violations are not aggregated.
    pub fn scan_params<'a, I>(&self, params: I) -> ScanResult
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in params {
            for sig in &self.signatures {
                if sig.matches(value) {
                    debug!(
                        param = name,
                        signature = sig.name,
                        category = %sig.category,
                        "Threat signature matched"
                    );
                    return ScanResult::Reject(ThreatDetected {
                        param: name.to_string(),
                        category: sig.category,
                        signature: sig.name,
                    });
                }
            }
        }
        ScanResult::Pass
    }
}
