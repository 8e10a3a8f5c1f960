//! Test-case generation from requirement text.
//!
//! The model is called once per request. Its output goes through the
//! recovery pipeline; when recovery produces nothing the template generator
//! takes over so a request with testable requirements never comes back empty.

mod enhance;
mod export;
mod prompts;
mod templates;

pub use enhance::{enhance_with_context, EnhancementKind};
pub use export::{export_test_cases, ExportFormat};
pub use templates::{extract_key_phrases, generate_from_template};

use crate::application::use_cases::recovery::{
    extract_json_candidate, recover_with_stage, RecoveryStage,
};
use crate::domain::error::{AppError, Result};
use crate::domain::id_sequence::IdSequence;
use crate::domain::llm_config::LLMConfig;
use crate::domain::test_case::TestCase;
use crate::infrastructure::llm_clients::LLMClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const DEFAULT_TITLE: &str = "Untitled Test Case";
const DEFAULT_DESCRIPTION: &str = "No description provided";
const DEFAULT_EXPECTED_RESULTS: &str = "No expected results specified";
const DEFAULT_STEPS: [&str; 2] = ["Step 1: Execute test", "Step 2: Verify results"];
const ENHANCEMENT_TEMPERATURE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    #[default]
    Functional,
    Security,
    Performance,
    Compliance,
}

impl TestType {
    /// Unknown types are treated as functional.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "security" => TestType::Security,
            "performance" => TestType::Performance,
            "compliance" => TestType::Compliance,
            _ => TestType::Functional,
        }
    }

    pub fn id_prefix(&self) -> &'static str {
        match self {
            TestType::Functional => "TC",
            TestType::Security => "SEC",
            TestType::Performance => "PERF",
            TestType::Compliance => "COMP",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    pub test_type: TestType,
    pub include_compliance: bool,
    pub custom_instructions: Option<String>,
    pub source_file: Option<String>,
    pub project_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationSource {
    Model(RecoveryStage),
    Template,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub test_cases: Vec<TestCase>,
    pub source: GenerationSource,
}

pub struct TestCaseGenerator {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
}

impl TestCaseGenerator {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>) -> Self {
        Self { llm_client }
    }

    /// Model failures surface as `GenerationFailure`; they are not retried.
    pub async fn generate(
        &self,
        config: &LLMConfig,
        requirements: &str,
        options: &GenerationOptions,
        ids: &mut IdSequence,
    ) -> Result<GenerationOutcome> {
        if requirements.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Requirements text is empty".to_string(),
            ));
        }

        let prompt = prompts::generation_prompt(
            requirements,
            options.custom_instructions.as_deref(),
        );
        let raw = self
            .llm_client
            .generate(config, prompts::GENERATION_SYSTEM_PROMPT, &prompt)
            .await?;

        // Recovery numbers its own records; final ids come from `ids` below.
        let mut scratch = IdSequence::new(options.test_type.id_prefix());
        let (recovered, stage) = recover_with_stage(&raw, &mut scratch);

        if recovered.is_empty() {
            tracing::warn!("Model output produced no test cases, using templates");
            let cases = generate_from_template(
                requirements,
                options.test_type,
                options.include_compliance,
                ids,
            );
            return Ok(GenerationOutcome {
                test_cases: cases
                    .into_iter()
                    .map(|case| stamp(case, options))
                    .collect(),
                source: GenerationSource::Template,
            });
        }

        let test_cases: Vec<TestCase> = recovered
            .into_iter()
            .map(|case| normalize(case, options, ids))
            .collect();
        tracing::info!(count = test_cases.len(), stage = ?stage, "Generated test cases");

        Ok(GenerationOutcome {
            test_cases,
            source: GenerationSource::Model(stage),
        })
    }

    /// Asks the model to rewrite the cases. Any failure returns the input unchanged.
    pub async fn enhance_with_model(
        &self,
        config: &LLMConfig,
        test_cases: &[TestCase],
        instruction: &str,
    ) -> Vec<TestCase> {
        if test_cases.is_empty() {
            return Vec::new();
        }

        let prompt = match prompts::enhancement_prompt(test_cases, instruction) {
            Ok(prompt) => prompt,
            Err(err) => {
                tracing::error!(error = %err, "Failed to build enhancement prompt");
                return test_cases.to_vec();
            }
        };

        let config = LLMConfig {
            temperature: Some(ENHANCEMENT_TEMPERATURE),
            ..config.clone()
        };
        let raw = match self
            .llm_client
            .generate(&config, prompts::GENERATION_SYSTEM_PROMPT, &prompt)
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(error = %err, "Model enhancement failed, keeping originals");
                return test_cases.to_vec();
            }
        };

        let enhanced = parse_enhanced(&raw);
        if enhanced.is_empty() {
            tracing::warn!("Model enhancement returned no usable test cases, keeping originals");
            return test_cases.to_vec();
        }

        let now = chrono::Local::now().to_rfc3339();
        enhanced
            .into_iter()
            .enumerate()
            .map(|(index, mut case)| {
                if let Some(original) = test_cases.get(index) {
                    if case.id.trim().is_empty() {
                        case.id = original.id.clone();
                    }
                    case.created_date = case.created_date.or_else(|| original.created_date.clone());
                    case.source_file = case.source_file.or_else(|| original.source_file.clone());
                    case.project_name = case.project_name.or_else(|| original.project_name.clone());
                }
                case.last_modified = Some(now.clone());
                case
            })
            .collect()
    }
}

/// Accepts `{"test_cases": [...]}` or a bare array.
fn parse_enhanced(raw: &str) -> Vec<TestCase> {
    let candidate = array_span(raw).unwrap_or_else(|| extract_json_candidate(raw));
    let value: Value = match json5::from_str(candidate) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(error = %err, "Enhancement output is not JSON");
            return Vec::new();
        }
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("test_cases") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    items.into_iter().filter_map(TestCase::from_value).collect()
}

/// `[...]` from the first bracket to the last, when it opens before any object.
fn array_span(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    if raw.find('{').is_some_and(|brace| brace < start) {
        return None;
    }
    let end = raw.rfind(']')?;
    (end > start).then(|| &raw[start..=end])
}

fn normalize(mut case: TestCase, options: &GenerationOptions, ids: &mut IdSequence) -> TestCase {
    case.id = ids.next_id();
    if case.title.trim().is_empty() {
        case.title = DEFAULT_TITLE.to_string();
    }
    if case.description.trim().is_empty() {
        case.description = DEFAULT_DESCRIPTION.to_string();
    }
    if case.expected_results.trim().is_empty() {
        case.expected_results = DEFAULT_EXPECTED_RESULTS.to_string();
    }
    if case.steps.is_empty() {
        case.steps = DEFAULT_STEPS.iter().map(|s| s.to_string()).collect();
    }
    if !options.include_compliance {
        case.compliance_checks.clear();
    }
    stamp(case, options)
}

fn stamp(mut case: TestCase, options: &GenerationOptions) -> TestCase {
    let now = chrono::Local::now().to_rfc3339();
    case.created_date = Some(now.clone());
    case.last_modified = Some(now);
    if options.source_file.is_some() {
        case.source_file = options.source_file.clone();
    }
    if options.project_name.is_some() {
        case.project_name = options.project_name.clone();
    }
    case
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned replies and records every prompt it receives.
    pub struct FakeLLMClient {
        replies: Mutex<Vec<Result<String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl FakeLLMClient {
        pub fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn replying(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string())])
        }
    }

    #[async_trait]
    impl LLMClient for FakeLLMClient {
        async fn generate(&self, _config: &LLMConfig, _system: &str, user: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(user.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(AppError::GenerationFailure("no reply queued".to_string())))
        }

        async fn list_models(&self, _config: &LLMConfig) -> Result<Vec<String>> {
            Ok(vec!["fake-model".to_string()])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::FakeLLMClient;
    use super::*;
    use crate::domain::test_case::Priority;

    const REQUIREMENTS: &str = "The infusion pump shall stop the infusion when an occlusion is detected.";

    fn build_generator(client: FakeLLMClient) -> (TestCaseGenerator, Arc<FakeLLMClient>) {
        let client = Arc::new(client);
        (TestCaseGenerator::new(client.clone()), client)
    }

    fn options(include_compliance: bool) -> GenerationOptions {
        GenerationOptions {
            include_compliance,
            project_name: Some("pump".to_string()),
            source_file: Some("reqs.pdf".to_string()),
            ..GenerationOptions::default()
        }
    }

    #[tokio::test]
    async fn test_generate_normalizes_model_output() {
        let reply = r#"```json
{"test_cases": [
  {"id": "X-9", "title": "Occlusion stops pump", "priority": "critical",
   "steps": ["Start infusion", "Clamp line", "Observe alarm"],
   "compliance_checks": [{"standard": "FDA", "requirement": "Safety", "passed": true}]},
  {"title": "", "risk": "high"}
]}
```"#;
        let (generator, client) = build_generator(FakeLLMClient::replying(reply));
        let mut ids = IdSequence::new("TC");

        let outcome = generator
            .generate(&LLMConfig::default(), REQUIREMENTS, &options(false), &mut ids)
            .await
            .unwrap();

        assert_eq!(outcome.source, GenerationSource::Model(RecoveryStage::Structured));
        let cases = &outcome.test_cases;
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].id, "TC-001");
        assert_eq!(cases[0].priority, Priority::Critical);
        assert_eq!(cases[0].steps.len(), 3);
        assert!(cases[0].compliance_checks.is_empty());
        assert_eq!(cases[0].expected_results, DEFAULT_EXPECTED_RESULTS);
        assert_eq!(cases[0].project_name.as_deref(), Some("pump"));
        assert!(cases[0].created_date.is_some());

        assert_eq!(cases[1].id, "TC-002");
        assert_eq!(cases[1].title, DEFAULT_TITLE);
        assert_eq!(cases[1].description, DEFAULT_DESCRIPTION);
        assert_eq!(cases[1].steps, DEFAULT_STEPS.to_vec());
        assert_eq!(cases[1].extra["risk"], "high");

        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[0].contains(REQUIREMENTS));
    }

    #[tokio::test]
    async fn test_compliance_checks_kept_when_requested() {
        let reply = r#"{"test_cases": [{"title": "Occlusion", "compliance_checks": [{"standard": "FDA", "requirement": "Safety", "passed": true}]}]}"#;
        let (generator, _) = build_generator(FakeLLMClient::replying(reply));
        let mut ids = IdSequence::new("COMP");
        let opts = GenerationOptions {
            test_type: TestType::Compliance,
            ..options(true)
        };

        let outcome = generator
            .generate(&LLMConfig::default(), REQUIREMENTS, &opts, &mut ids)
            .await
            .unwrap();
        assert_eq!(outcome.test_cases[0].id, "COMP-001");
        assert_eq!(outcome.test_cases[0].compliance_checks.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_model_output_uses_templates() {
        let (generator, _) = build_generator(FakeLLMClient::replying("   "));
        let mut ids = IdSequence::new("TC");

        let outcome = generator
            .generate(&LLMConfig::default(), REQUIREMENTS, &options(true), &mut ids)
            .await
            .unwrap();
        assert_eq!(outcome.source, GenerationSource::Template);
        assert_eq!(outcome.test_cases[0].title, "Test stop the infusion");
        assert_eq!(outcome.test_cases[0].project_name.as_deref(), Some("pump"));
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let (generator, _) = build_generator(FakeLLMClient::new(vec![Err(AppError::GenerationFailure(
            "timeout".to_string(),
        ))]));
        let mut ids = IdSequence::new("TC");
        let err = generator
            .generate(&LLMConfig::default(), REQUIREMENTS, &options(true), &mut ids)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GenerationFailure(_)));
        assert_eq!(ids.peek(), 1);
    }

    #[tokio::test]
    async fn test_blank_requirements_rejected() {
        let (generator, client) = build_generator(FakeLLMClient::replying("{}"));
        let mut ids = IdSequence::new("TC");
        let err = generator
            .generate(&LLMConfig::default(), " \n", &options(true), &mut ids)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(client.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_enhancement_replaces_cases() {
        let reply = r#"Here you go: [{"title": "Occlusion alarm (boundary)", "steps": ["Clamp at 0 ml/h"]}]"#;
        let (generator, _) = build_generator(FakeLLMClient::replying(reply));
        let originals = vec![TestCase {
            project_name: Some("pump".to_string()),
            ..TestCase::new("TC-007", "Occlusion alarm")
        }];

        let enhanced = generator
            .enhance_with_model(&LLMConfig::default(), &originals, "add boundary values")
            .await;
        assert_eq!(enhanced[0].id, "TC-007");
        assert_eq!(enhanced[0].title, "Occlusion alarm (boundary)");
        assert_eq!(enhanced[0].project_name.as_deref(), Some("pump"));
        assert!(enhanced[0].last_modified.is_some());
    }

    #[tokio::test]
    async fn test_model_enhancement_falls_back_to_originals() {
        let originals = vec![TestCase::new("TC-001", "Occlusion alarm")];

        let (generator, _) = build_generator(FakeLLMClient::replying("I cannot help with that."));
        let kept = generator
            .enhance_with_model(&LLMConfig::default(), &originals, "improve")
            .await;
        assert_eq!(kept[0].title, "Occlusion alarm");
        assert!(kept[0].last_modified.is_none());

        let (generator, _) = build_generator(FakeLLMClient::new(vec![Err(AppError::GenerationFailure(
            "quota".to_string(),
        ))]));
        let kept = generator
            .enhance_with_model(&LLMConfig::default(), &originals, "improve")
            .await;
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "TC-001");
    }

    #[test]
    fn test_test_type_prefixes() {
        assert_eq!(TestType::parse("Security").id_prefix(), "SEC");
        assert_eq!(TestType::parse("performance").id_prefix(), "PERF");
        assert_eq!(TestType::parse("unknown").id_prefix(), "TC");
    }
}
