//! Turns raw model output into test cases.
//!
//! Stages run in order and stop at the first one that yields records:
//! balanced-brace extraction plus lenient JSON parsing, header-based section
//! splitting, then paragraph placeholders. Nothing here returns an error;
//! a failed stage only hands over to the next one.

mod json_extract;
mod paragraphs;
mod sections;

pub(crate) use json_extract::extract_json_candidate;

use crate::domain::id_sequence::IdSequence;
use crate::domain::test_case::TestCase;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStage {
    Structured,
    Sections,
    Paragraphs,
    Empty,
}

/// Why the structured stage gave up.
#[derive(Debug)]
enum ParseDegraded {
    InvalidSyntax(String),
    MissingTestCases,
    EmptyTestCases,
}

impl fmt::Display for ParseDegraded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseDegraded::InvalidSyntax(msg) => write!(f, "invalid JSON: {}", msg),
            ParseDegraded::MissingTestCases => write!(f, "no test_cases key"),
            ParseDegraded::EmptyTestCases => write!(f, "test_cases is empty"),
        }
    }
}

pub fn recover_test_cases(raw: &str, ids: &mut IdSequence) -> Vec<TestCase> {
    recover_with_stage(raw, ids).0
}

pub fn recover_with_stage(raw: &str, ids: &mut IdSequence) -> (Vec<TestCase>, RecoveryStage) {
    if raw.trim().is_empty() {
        return (Vec::new(), RecoveryStage::Empty);
    }

    let candidate = json_extract::extract_json_candidate(raw);
    match json_extract::parse_test_cases(candidate) {
        Ok(cases) => return (cases, RecoveryStage::Structured),
        Err(reason) => {
            tracing::warn!(%reason, "Structured parse failed, falling back to section parsing");
        }
    }

    let cases = sections::parse_sections(raw, ids);
    if !cases.is_empty() {
        return (cases, RecoveryStage::Sections);
    }

    tracing::warn!("No test case sections found, falling back to paragraph chunks");
    let cases = paragraphs::parse_paragraphs(raw, ids);
    (cases, RecoveryStage::Paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_fenced_json_reply() {
        let raw = "Sure, here you go:\n```json\n{\"test_cases\":[{\"id\":\"TC-001\",\"title\":\"Login test\",\"steps\":[\"Open app\",\"Enter credentials\",\"Submit\"]}]}\n```";
        let mut ids = IdSequence::new("TC");
        let (cases, stage) = recover_with_stage(raw, &mut ids);

        assert_eq!(stage, RecoveryStage::Structured);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].id, "TC-001");
        assert_eq!(cases[0].steps.len(), 3);
        assert_eq!(ids.peek(), 1);
    }

    #[test]
    fn test_null_or_numeric_metadata_keeps_structured_records() {
        let raw = r#"{"test_cases":[
            {"id":"TC-1","title":"Dose limit alarm","status":null,"steps":["a","b"]},
            {"id":"TC-2","title":"Audit trail","created_date":20240101,"project_name":7}
        ]}"#;
        let mut ids = IdSequence::new("TC");
        let (cases, stage) = recover_with_stage(raw, &mut ids);

        assert_eq!(stage, RecoveryStage::Structured);
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].title, "Dose limit alarm");
        assert_eq!(cases[0].status, "draft");
        assert_eq!(cases[1].title, "Audit trail");
        assert_eq!(cases[1].created_date.as_deref(), Some("20240101"));
    }

    #[test]
    fn test_well_formed_records_come_back_unchanged() {
        let records = json!([
            {"id": "TC-010", "title": "Dose alert", "description": "Alert on overdose",
             "priority": "High", "steps": ["Enter dose", "Confirm"],
             "expected_results": "Alert shown", "test_data": {"dose": "50mg"},
             "compliance_checks": [], "status": "draft"},
            {"id": "TC-011", "title": "Audit log", "description": "Edits are logged",
             "priority": "Low", "steps": [], "expected_results": "",
             "test_data": {}, "compliance_checks": [], "status": "draft",
             "traceability": "REQ-7"}
        ]);
        let raw = json!({"test_cases": records.clone()}).to_string();
        let mut ids = IdSequence::new("TC");
        let cases = recover_test_cases(&raw, &mut ids);

        let encoded: Value = serde_json::to_value(&cases).unwrap();
        assert_eq!(encoded, records);
    }

    #[test]
    fn test_prose_with_headers_uses_sections() {
        let raw = "Test Case 1: Verify blood pressure entry\nSteps:\n1. Open vitals\n2. Enter 120/80\n\nTest Case 2: Reject impossible readings\nDescription: Values above 300 are refused with an error.";
        let mut ids = IdSequence::new("TC");
        let (cases, stage) = recover_with_stage(raw, &mut ids);

        assert_eq!(stage, RecoveryStage::Sections);
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].id, "TC-002");
    }

    #[test]
    fn test_plain_prose_gets_placeholders() {
        let raw = "The system must keep an audit trail of every change to patient records, including who made it and when. Access must be limited to authorised clinical staff at all times.";
        let mut ids = IdSequence::new("TC");
        let (cases, stage) = recover_with_stage(raw, &mut ids);

        assert_eq!(stage, RecoveryStage::Paragraphs);
        assert!(!cases.is_empty() && cases.len() <= 10);
        assert!(cases.iter().all(|c| c.description.chars().count() <= 153));
    }

    #[test]
    fn test_empty_input() {
        let mut ids = IdSequence::new("TC");
        let (cases, stage) = recover_with_stage("", &mut ids);
        assert!(cases.is_empty());
        assert_eq!(stage, RecoveryStage::Empty);
    }

    #[test]
    fn test_ids_continue_across_calls() {
        let mut ids = IdSequence::new("TC");
        let raw = "A reply with no structure that is still long enough to be kept.";
        let first = recover_test_cases(raw, &mut ids);
        let second = recover_test_cases(raw, &mut ids);
        assert_eq!(first[0].id, "TC-001");
        assert_eq!(second[0].id, "TC-002");
    }
}
