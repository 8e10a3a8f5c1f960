use crate::domain::error::{AppError, Result};
use crate::domain::test_case::TestCase;

pub(super) const GENERATION_SYSTEM_PROMPT: &str =
    "You are an expert QA engineer specializing in healthcare software testing.";

const RESPONSE_SCHEMA: &str = r#"{
  "test_cases": [
    {
      "id": "TC-001",
      "title": "Descriptive test case title",
      "description": "Detailed description of what is being tested",
      "priority": "High/Medium/Low/Critical",
      "steps": ["Step 1 description", "Step 2 description"],
      "expected_results": "What should happen when the test passes",
      "compliance_checks": [
        {
          "standard": "FDA/ISO 13485/etc",
          "requirement": "Specific requirement text",
          "passed": true,
          "issue": "If not passed, what's wrong",
          "recommendation": "How to fix compliance issue"
        }
      ],
      "test_data": {
        "input_data": "Sample input data",
        "expected_output": "Expected output data"
      }
    }
  ]
}"#;

const HEALTHCARE_CONSIDERATIONS: &str = "Important considerations for healthcare software:
- Ensure compliance with FDA regulations, IEC 62304, ISO 13485, ISO 27001
- Consider patient safety and data privacy (GDPR compliance)
- Include edge cases and error conditions
- Prioritize test cases based on risk assessment
- Ensure traceability from requirements to test cases";

pub(super) fn generation_prompt(requirements: &str, custom_instructions: Option<&str>) -> String {
    let mut prompt = format!(
        "Your task is to generate comprehensive test cases based on the following requirements.

REQUIREMENTS:
{requirements}

CRITICAL INSTRUCTION: You MUST return ONLY valid JSON format. Do not include any markdown formatting, code blocks, or additional text outside the JSON structure.

Please generate test cases in JSON format with the following structure:
{RESPONSE_SCHEMA}

{HEALTHCARE_CONSIDERATIONS}

REMEMBER: Return ONLY valid JSON. No additional text, explanations, or markdown formatting."
    );

    if let Some(extra) = custom_instructions.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\n\nAdditional instructions: ");
        prompt.push_str(extra);
    }
    prompt
}

pub(super) fn enhancement_prompt(test_cases: &[TestCase], instruction: &str) -> Result<String> {
    let existing = serde_json::to_string_pretty(test_cases)
        .map_err(|e| AppError::Internal(format!("Failed to serialize test cases: {}", e)))?;
    Ok(format!(
        "Enhance the following test cases based on this instruction: {instruction}

EXISTING TEST CASES:
{existing}

Return the enhanced test cases in the same JSON format, as {{\"test_cases\": [...]}}, with improvements applied."
    ))
}
