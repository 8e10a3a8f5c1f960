use crate::domain::test_case::TestCase;
use serde::Deserialize;

const EDGE_CASES: [&str; 2] = [
    "Test with maximum input values",
    "Test with minimum input values",
];

const NEGATIVE_TESTS: [&str; 2] = [
    "Test with invalid user credentials",
    "Test with missing required fields",
];

const PERFORMANCE_CONSIDERATIONS: [&str; 2] = [
    "Measure response time under normal load",
    "Test scalability with increasing user count",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementKind {
    EdgeCases,
    NegativeTesting,
    Performance,
    General,
}

impl EnhancementKind {
    /// Unknown kinds fall back to `General`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "edge_cases" => EnhancementKind::EdgeCases,
            "negative_testing" => EnhancementKind::NegativeTesting,
            "performance" => EnhancementKind::Performance,
            _ => EnhancementKind::General,
        }
    }
}

pub fn enhance_with_context(
    test_cases: &[TestCase],
    context: &str,
    kind: EnhancementKind,
) -> Vec<TestCase> {
    let now = chrono::Local::now().to_rfc3339();
    test_cases
        .iter()
        .cloned()
        .map(|mut case| {
            match kind {
                EnhancementKind::EdgeCases => case
                    .edge_cases
                    .extend(EDGE_CASES.iter().map(|s| s.to_string())),
                EnhancementKind::NegativeTesting => case
                    .negative_tests
                    .extend(NEGATIVE_TESTS.iter().map(|s| s.to_string())),
                EnhancementKind::Performance => case
                    .performance_considerations
                    .extend(PERFORMANCE_CONSIDERATIONS.iter().map(|s| s.to_string())),
                EnhancementKind::General => {
                    if !context.trim().is_empty() {
                        case.description
                            .push_str(&format!("\n\nAdditional context: {}", context));
                    }
                }
            }
            case.last_modified = Some(now.clone());
            case
        })
        .collect()
}
