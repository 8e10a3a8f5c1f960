use super::{request_timeout, LLMClient};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GeminiModelsResponse {
    models: Option<Vec<GeminiModelInfo>>,
}

#[derive(Deserialize)]
struct GeminiModelInfo {
    name: String,
}

pub struct GeminiClient {
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn api_key(config: &LLMConfig) -> Result<String> {
        config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AppError::GenerationFailure(
                    "Missing API key for Google provider (set GEMINI_API_KEY)".to_string(),
                )
            })
    }
}

fn request_body(config: &LLMConfig, system: &str, user: &str) -> GeminiRequest {
    let system_instruction = (!system.trim().is_empty()).then(|| GeminiContent {
        parts: vec![GeminiPart {
            text: system.to_string(),
        }],
        role: None,
    });

    GeminiRequest {
        contents: vec![GeminiContent {
            parts: vec![GeminiPart {
                text: user.to_string(),
            }],
            role: Some("user".to_string()),
        }],
        system_instruction,
        generation_config: GenerationConfig {
            temperature: config.temperature.unwrap_or(0.7) as f64,
            max_output_tokens: config.max_tokens,
        },
    }
}

/// Text of the first candidate, all parts concatenated.
fn response_text(response: GeminiResponse) -> Result<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(AppError::GenerationFailure(format!(
            "Prompt blocked by provider: {}",
            reason
        )));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AppError::GenerationFailure("Response has no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|content| content.parts.into_iter().map(|part| part.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(AppError::GenerationFailure(format!(
            "Empty response (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text)
}

#[async_trait]
impl LLMClient for GeminiClient {
    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String> {
        let api_key = Self::api_key(config)?;
        let base_url = config.base_url.trim_end_matches('/');
        let url = format!("{}/{}:generateContent", base_url, config.model.trim());

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key.as_str())])
            .timeout(request_timeout(config))
            .json(&request_body(config, system, user))
            .send()
            .await
            .map_err(|e| AppError::GenerationFailure(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::GenerationFailure(format!(
                "API error ({}): {}",
                status, text
            )));
        }

        let json: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AppError::GenerationFailure(format!("Failed to parse JSON: {}", e)))?;

        response_text(json)
    }

    async fn list_models(&self, config: &LLMConfig) -> Result<Vec<String>> {
        let api_key = Self::api_key(config)?;
        let url = config.base_url.trim_end_matches('/');

        let response = self
            .client
            .get(url)
            .query(&[("key", api_key.as_str())])
            .timeout(request_timeout(config))
            .send()
            .await
            .map_err(|e| AppError::GenerationFailure(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::GenerationFailure(format!(
                "API error ({}): {}",
                status, text
            )));
        }

        let json: GeminiModelsResponse = response
            .json()
            .await
            .map_err(|e| AppError::GenerationFailure(format!("Failed to parse JSON: {}", e)))?;

        Ok(json
            .models
            .unwrap_or_default()
            .into_iter()
            .map(|model| {
                model
                    .name
                    .strip_prefix("models/")
                    .unwrap_or(model.name.as_str())
                    .to_string()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let config = LLMConfig {
            temperature: Some(0.2),
            max_tokens: Some(512),
            ..LLMConfig::default()
        };
        let body = serde_json::to_value(request_body(&config, "You are a QA engineer", "Write tests")).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Write tests");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You are a QA engineer");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);

        let body = serde_json::to_value(request_body(&config, "  ", "Write tests")).unwrap();
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_response_parts_are_joined() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"test_cases\""}, {"text": ": []}"}]}}]
        }))
        .unwrap();
        assert_eq!(response_text(response).unwrap(), "{\"test_cases\": []}");
    }

    #[test]
    fn test_blocked_and_empty_responses_fail() {
        let blocked: GeminiResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert!(matches!(response_text(blocked), Err(AppError::GenerationFailure(_))));

        let empty: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "MAX_TOKENS"}]
        }))
        .unwrap();
        let err = response_text(empty).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn test_missing_key() {
        let config = LLMConfig {
            api_key: Some(" ".to_string()),
            ..LLMConfig::default()
        };
        assert!(matches!(
            GeminiClient::api_key(&config),
            Err(AppError::GenerationFailure(_))
        ));
    }
}
