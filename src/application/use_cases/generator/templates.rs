use super::TestType;
use crate::domain::id_sequence::IdSequence;
use crate::domain::test_case::{ComplianceCheck, Priority, TestCase};
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_KEY_PHRASES: usize = 10;
const MAX_TEMPLATE_CASES: usize = 5;

static KEY_PHRASE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(?:shall|should|must|will)\s+(\w+\s+\w+(?:\s+\w+)?)",
        r"(?i)(\w+ing\s+\w+(?:\s+\w+)?)",
        r"(?i)(\w+\s+function(?:ality)?)",
        r"(?i)(\w+\s+feature)",
        r"(?i)(\w+\s+module)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

struct Template {
    placeholder: &'static str,
    title: &'static str,
    description: &'static str,
    priority: Priority,
    steps: &'static [&'static str],
    expected_results: &'static str,
    test_data: &'static [(&'static str, &'static str)],
    compliance: Option<(&'static str, &'static str)>,
}

const FUNCTIONAL: Template = Template {
    placeholder: "[functionality]",
    title: "Test [functionality]",
    description: "Verify that [functionality] works as expected",
    priority: Priority::Medium,
    steps: &[
        "Navigate to the relevant screen or page",
        "Perform [functionality]",
        "Verify the expected system response",
    ],
    expected_results: "[functionality] should work correctly without errors",
    test_data: &[
        ("input_data", "Sample input data"),
        ("expected_output", "Expected output data"),
    ],
    compliance: None,
};

const SECURITY: Template = Template {
    placeholder: "[vulnerability]",
    title: "Security Test: [vulnerability]",
    description: "Test for [vulnerability] vulnerability",
    priority: Priority::High,
    steps: &["Attempt to exploit [vulnerability]", "Observe system response"],
    expected_results: "System should prevent [vulnerability] and respond appropriately",
    test_data: &[],
    compliance: Some(("ISO 27001", "Security controls implementation")),
};

const PERFORMANCE: Template = Template {
    placeholder: "[metric]",
    title: "Performance Test: [metric]",
    description: "Test system performance for [metric]",
    priority: Priority::Medium,
    steps: &[
        "Set up performance monitoring",
        "Execute [metric] under the specified load",
        "Measure response times",
    ],
    expected_results: "System should meet performance requirements for [metric]",
    test_data: &[
        ("load_level", "Specified load level"),
        ("response_time_threshold", "Maximum acceptable response time"),
    ],
    compliance: None,
};

const COMPLIANCE: Template = Template {
    placeholder: "[standard]",
    title: "Compliance Test: [standard]",
    description: "Test compliance with [standard] requirements",
    priority: Priority::High,
    steps: &[
        "Review [standard] requirements",
        "Execute compliance verification steps",
        "Document results",
    ],
    expected_results: "System should comply with all [standard] requirements",
    test_data: &[],
    compliance: Some(("[standard]", "Specific requirement")),
};

fn template_for(test_type: TestType) -> &'static Template {
    match test_type {
        TestType::Functional => &FUNCTIONAL,
        TestType::Security => &SECURITY,
        TestType::Performance => &PERFORMANCE,
        TestType::Compliance => &COMPLIANCE,
    }
}

/// Candidate testable behaviours: modal-verb objects, gerund phrases and
/// `function`/`feature`/`module` nouns. At least two words, first-seen order.
pub fn extract_key_phrases(text: &str) -> Vec<String> {
    let mut phrases: Vec<String> = Vec::new();
    for pattern in KEY_PHRASE_PATTERNS.iter() {
        for captures in pattern.captures_iter(text) {
            let Some(phrase) = captures.get(1) else {
                continue;
            };
            let phrase = phrase.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
            if phrase.split(' ').count() >= 2 && !phrases.contains(&phrase) {
                phrases.push(phrase);
            }
        }
    }
    phrases.truncate(MAX_KEY_PHRASES);
    phrases
}

/// Offline generation used when the model output yields no records.
pub fn generate_from_template(
    requirements: &str,
    test_type: TestType,
    include_compliance: bool,
    ids: &mut IdSequence,
) -> Vec<TestCase> {
    let template = template_for(test_type);
    extract_key_phrases(requirements)
        .into_iter()
        .take(MAX_TEMPLATE_CASES)
        .map(|phrase| {
            let fill = |text: &str| text.replace(template.placeholder, &phrase);
            let compliance_checks = match (include_compliance, template.compliance) {
                (true, Some((standard, requirement))) => vec![ComplianceCheck {
                    standard: fill(standard),
                    requirement: requirement.to_string(),
                    passed: true,
                    issue: None,
                    recommendation: None,
                }],
                _ => Vec::new(),
            };

            TestCase {
                description: fill(template.description),
                priority: template.priority,
                steps: template.steps.iter().map(|step| fill(step)).collect(),
                expected_results: fill(template.expected_results),
                test_data: template
                    .test_data
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect(),
                compliance_checks,
                ..TestCase::new(ids.next_id(), fill(template.title))
            }
        })
        .collect()
}
