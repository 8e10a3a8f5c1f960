use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of the built-in regulatory checklist.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ComplianceRequirement {
    pub id: String,
    pub requirement: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Evidence {
    pub test_case_id: String,
    pub title: String,
    pub matched_keyword: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ComplianceCheckResult {
    pub requirement_id: String,
    pub requirement: String,
    pub description: String,
    pub passed: bool,
    pub evidence: Vec<Evidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ComplianceRunResult {
    pub overall_score: f64,
    pub standards: BTreeMap<String, Vec<ComplianceCheckResult>>,
    pub total_checks: usize,
    pub passed_checks: usize,
    pub test_cases_count: usize,
    pub timestamp: String,
}

/// A scoring run as kept in storage.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoredComplianceRun {
    pub id: String,
    pub project_name: Option<String>,
    pub result: ComplianceRunResult,
}
