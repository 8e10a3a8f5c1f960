use super::catalog;
use crate::domain::compliance::{
    ComplianceCheckResult, ComplianceRequirement, ComplianceRunResult, Evidence,
};
use crate::domain::error::{AppError, Result};
use crate::domain::test_case::TestCase;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

const MISSING_COVERAGE_ISSUE: &str = "No test case addresses this requirement";
const MISSING_COVERAGE_RECOMMENDATION: &str =
    "Add test cases that cover this compliance requirement";

/// Scores test cases against the selected standards of the built-in catalog.
pub fn check_compliance(test_cases: &[TestCase], standards: &[String]) -> Result<ComplianceRunResult> {
    if test_cases.is_empty() {
        return Err(AppError::InvalidInput(
            "No test cases provided for compliance check".to_string(),
        ));
    }
    if standards.is_empty() {
        return Err(AppError::InvalidInput(
            "No standards specified for compliance check".to_string(),
        ));
    }

    let flattened: Vec<String> = test_cases.iter().map(flatten_test_case).collect();

    let mut results: BTreeMap<String, Vec<ComplianceCheckResult>> = BTreeMap::new();
    let mut total_checks = 0usize;
    let mut passed_checks = 0usize;

    for name in standards {
        let Some(standard) = catalog::find_standard(name) else {
            tracing::warn!(standard = %name, "Unknown compliance standard, skipping");
            continue;
        };
        if results.contains_key(standard.name) {
            continue;
        }

        let checks: Vec<ComplianceCheckResult> = standard
            .requirements
            .iter()
            .map(|requirement| check_against(test_cases, &flattened, requirement))
            .collect();

        total_checks += checks.len();
        passed_checks += checks.iter().filter(|check| check.passed).count();
        results.insert(standard.name.to_string(), checks);
    }

    Ok(ComplianceRunResult {
        overall_score: score(passed_checks, total_checks),
        standards: results,
        total_checks,
        passed_checks,
        test_cases_count: test_cases.len(),
        timestamp: chrono::Local::now().to_rfc3339(),
    })
}

pub fn check_single_requirement(
    test_cases: &[TestCase],
    requirement: &ComplianceRequirement,
) -> ComplianceCheckResult {
    let flattened: Vec<String> = test_cases.iter().map(flatten_test_case).collect();
    check_against(test_cases, &flattened, requirement)
}

fn check_against(
    test_cases: &[TestCase],
    flattened: &[String],
    requirement: &ComplianceRequirement,
) -> ComplianceCheckResult {
    let keywords = requirement_keywords(requirement);

    // One evidence entry per test case: the first keyword that hits.
    let evidence: Vec<Evidence> = test_cases
        .iter()
        .zip(flattened)
        .filter_map(|(case, text)| {
            keywords
                .iter()
                .find(|keyword| text.contains(keyword.as_str()))
                .map(|keyword| Evidence {
                    test_case_id: case.id.clone(),
                    title: case.title.clone(),
                    matched_keyword: keyword.clone(),
                })
        })
        .collect();

    let passed = !evidence.is_empty();
    ComplianceCheckResult {
        requirement_id: requirement.id.clone(),
        requirement: requirement.requirement.clone(),
        description: requirement.description.clone(),
        passed,
        evidence,
        issue: (!passed).then(|| MISSING_COVERAGE_ISSUE.to_string()),
        recommendation: (!passed).then(|| MISSING_COVERAGE_RECOMMENDATION.to_string()),
    }
}

/// Lower-cased whitespace tokens longer than three characters, first occurrence order.
pub(crate) fn requirement_keywords(requirement: &ComplianceRequirement) -> Vec<String> {
    let combined = format!("{} {}", requirement.requirement, requirement.description).to_lowercase();
    let mut seen = HashSet::new();
    combined
        .split_whitespace()
        .filter(|token| token.chars().count() > 3)
        .filter(|token| seen.insert(token.to_string()))
        .map(str::to_string)
        .collect()
}

/// Lower-cased text of every value in the record, nested ones included. Keys are
/// left out so field names like `test_data` never count as coverage.
pub(crate) fn flatten_test_case(test_case: &TestCase) -> String {
    let value = serde_json::to_value(test_case).unwrap_or(Value::Null);
    let mut parts = Vec::new();
    collect_values(&value, &mut parts);
    parts.join(" ").to_lowercase()
}

fn collect_values(value: &Value, parts: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::String(text) => parts.push(text.clone()),
        Value::Bool(flag) => parts.push(flag.to_string()),
        Value::Number(number) => parts.push(number.to_string()),
        Value::Array(items) => items.iter().for_each(|item| collect_values(item, parts)),
        Value::Object(map) => map.values().for_each(|item| collect_values(item, parts)),
    }
}

fn score(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = 100.0 * passed as f64 / total as f64;
    (raw * 100.0).round() / 100.0
}
