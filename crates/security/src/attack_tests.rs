// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn benign() -> RequestSurface<'static> {
    RequestSurface {
        method: "GET",
        url: "https://app.example/api/v1/workers",
        path: "/api/v1/workers",
        query: "",
        headers: &[],
        user_agent: "Mozilla/5.0",
        body: "",
    }
}

#[test]
fn a_benign_request_is_not_an_attack() {
    let verdict = evaluate(&benign());
    assert!(!verdict.is_attack);
}

#[test]
fn union_select_in_the_query_is_flagged_as_sql_injection() {
    let mut req = benign();
    req.query = "id=1 UNION SELECT password FROM users";
    let verdict = evaluate(&req);
    assert!(verdict.is_attack);
    assert!(verdict.findings.iter().any(|f| f.detector == "sql_injection" && f.confidence >= 0.6));
}

#[test]
fn a_script_tag_in_the_body_is_flagged_as_xss() {
    let mut req = benign();
    req.body = "<script>alert(1)</script>";
    let verdict = evaluate(&req);
    assert!(verdict.is_attack);
    assert!(verdict.findings.iter().any(|f| f.detector == "xss"));
}

#[test]
fn a_shell_chain_in_the_query_is_flagged_as_command_injection() {
    let mut req = benign();
    req.query = "cmd=foo; rm -rf /";
    let verdict = evaluate(&req);
    assert!(verdict.is_attack);
    assert!(verdict.findings.iter().any(|f| f.detector == "command_injection"));
}

#[test]
fn dot_dot_slash_in_the_path_is_flagged_as_path_traversal() {
    let mut req = benign();
    req.path = "/static/../../etc/passwd";
    let verdict = evaluate(&req);
    assert!(verdict.findings.iter().any(|f| f.detector == "path_traversal" && f.confidence > 0.0));
}

#[test]
fn a_known_scanner_user_agent_is_flagged() {
    let mut req = benign();
    req.user_agent = "sqlmap/1.7";
    let verdict = evaluate(&req);
    assert!(verdict.is_attack);
}

#[test]
fn python_requests_against_an_admin_path_is_flagged() {
    let mut req = benign();
    req.user_agent = "python-requests/2.31";
    req.path = "/admin/users";
    let verdict = evaluate(&req);
    assert!(verdict.findings.iter().any(|f| f.detector == "suspicious_user_agent" && f.confidence >= 0.6));
}
