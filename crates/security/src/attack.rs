// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic request scorer (§4.O). Each detector inspects the request
//! surface and returns a confidence in `[0, 1]` plus matched evidence; the
//! request is flagged an attack once any detector reaches 0.6.

use std::sync::LazyLock;

use regex::Regex;

/// The request surface a detector inspects.
pub struct RequestSurface<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    pub headers: &'a [(String, String)],
    pub user_agent: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Clone)]
pub struct DetectorFinding {
    pub detector: &'static str,
    pub confidence: f64,
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AttackVerdict {
    pub is_attack: bool,
    pub findings: Vec<DetectorFinding>,
}

const ATTACK_THRESHOLD: f64 = 0.6;

#[allow(clippy::expect_used)]
static SQL_INJECTION: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\bUNION\s+SELECT\b").expect("constant regex pattern is valid"),
        Regex::new(r"(?i)'\s*OR\s*'1'\s*=\s*'1").expect("constant regex pattern is valid"),
        Regex::new(r"(?i)\bDROP\s+TABLE\b").expect("constant regex pattern is valid"),
    ]
});

#[allow(clippy::expect_used)]
static XSS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)<script").expect("constant regex pattern is valid"),
        Regex::new(r"(?i)javascript:").expect("constant regex pattern is valid"),
        Regex::new(r"(?i)\bon[a-z]+\s*=").expect("constant regex pattern is valid"),
    ]
});

#[allow(clippy::expect_used)]
static COMMAND_INJECTION: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r";\s*(rm|wget|curl)\b").expect("constant regex pattern is valid"),
        Regex::new(r"`[^`]+`").expect("constant regex pattern is valid"),
    ]
});

#[allow(clippy::expect_used)]
static PATH_TRAVERSAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\./").expect("constant regex pattern is valid"));

const SUSPICIOUS_USER_AGENTS: &[&str] = &["sqlmap", "nikto", "masscan"];

fn haystacks<'a>(req: &'a RequestSurface<'a>) -> Vec<&'a str> {
    let mut hs = vec![req.url, req.path, req.query, req.body];
    hs.extend(req.headers.iter().map(|(_, value)| value.as_str()));
    hs
}

fn run_patterns(patterns: &[Regex], req: &RequestSurface<'_>, confidence: f64, name: &'static str) -> DetectorFinding {
    let mut evidence = Vec::new();
    for haystack in haystacks(req) {
        for pattern in patterns {
            if let Some(m) = pattern.find(haystack) {
                evidence.push(m.as_str().to_string());
            }
        }
    }
    DetectorFinding { detector: name, confidence: if evidence.is_empty() { 0.0 } else { confidence }, evidence }
}

fn detect_sql_injection(req: &RequestSurface<'_>) -> DetectorFinding {
    run_patterns(&SQL_INJECTION, req, 0.9, "sql_injection")
}

fn detect_xss(req: &RequestSurface<'_>) -> DetectorFinding {
    run_patterns(&XSS, req, 0.8, "xss")
}

fn detect_command_injection(req: &RequestSurface<'_>) -> DetectorFinding {
    run_patterns(&COMMAND_INJECTION, req, 0.9, "command_injection")
}

fn detect_path_traversal(req: &RequestSurface<'_>) -> DetectorFinding {
    let mut evidence = Vec::new();
    for haystack in haystacks(req) {
        if let Some(m) = PATH_TRAVERSAL.find(haystack) {
            evidence.push(m.as_str().to_string());
        }
    }
    DetectorFinding { detector: "path_traversal", confidence: if evidence.is_empty() { 0.0 } else { 0.7 }, evidence }
}

fn detect_suspicious_user_agent(req: &RequestSurface<'_>) -> DetectorFinding {
    let ua = req.user_agent.to_ascii_lowercase();
    let mut evidence = Vec::new();
    let mut confidence = 0.0;

    for needle in SUSPICIOUS_USER_AGENTS {
        if ua.contains(needle) {
            evidence.push(needle.to_string());
            confidence = 0.9;
        }
    }
    if ua.contains("python-requests") && req.path.contains("/admin") {
        evidence.push("python-requests against admin path".to_string());
        confidence = confidence.max(0.65);
    }

    DetectorFinding { detector: "suspicious_user_agent", confidence, evidence }
}

/// Run every detector and aggregate into a verdict.
pub fn evaluate(req: &RequestSurface<'_>) -> AttackVerdict {
    let findings = vec![
        detect_sql_injection(req),
        detect_xss(req),
        detect_command_injection(req),
        detect_path_traversal(req),
        detect_suspicious_user_agent(req),
    ];
    let is_attack = findings.iter().any(|f| f.confidence >= ATTACK_THRESHOLD);
    AttackVerdict { is_attack, findings }
}

#[cfg(test)]
#[path = "attack_tests.rs"]
mod tests;
