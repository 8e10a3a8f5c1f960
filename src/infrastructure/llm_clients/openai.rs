use super::{request_timeout, LLMClient};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{LLMConfig, LLMProvider};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Any `/chat/completions` compatible endpoint: OpenAI itself or a local server.
pub struct OpenAIClient {
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Local servers usually run without a key.
    fn api_key(config: &LLMConfig) -> Result<Option<String>> {
        let key = config.api_key.clone().filter(|key| !key.trim().is_empty());
        match (&config.provider, key) {
            (LLMProvider::Local, key) => Ok(key),
            (_, Some(key)) => Ok(Some(key)),
            (_, None) => Err(AppError::GenerationFailure(
                "Missing API key for OpenAI provider (set OPENAI_API_KEY)".to_string(),
            )),
        }
    }

    fn authorize(request: reqwest::RequestBuilder, key: Option<String>) -> reqwest::RequestBuilder {
        match key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

fn request_body(config: &LLMConfig, system: &str, user: &str) -> Value {
    let mut messages = Vec::new();
    if !system.trim().is_empty() {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": user }));

    json!({
        "model": config.model,
        "messages": messages,
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
    })
}

fn completion_text(json: &Value) -> Result<String> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::GenerationFailure("Invalid response format".to_string()))
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String> {
        let api_key = Self::api_key(config)?;
        let request = self
            .client
            .post(endpoint(&config.base_url, "chat/completions"))
            .timeout(request_timeout(config))
            .json(&request_body(config, system, user));

        let response = Self::authorize(request, api_key)
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

        let json: Value = response
            .json()
            .await
            .map_err(|e| AppError::GenerationFailure(format!("Failed to parse JSON: {}", e)))?;

        completion_text(&json)
    }

    async fn list_models(&self, config: &LLMConfig) -> Result<Vec<String>> {
        let api_key = Self::api_key(config)?;
        let request = self
            .client
            .get(endpoint(&config.base_url, "models"))
            .timeout(request_timeout(config));

        let response = Self::authorize(request, api_key)
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

        let json: Value = response
            .json()
            .await
            .map_err(|e| AppError::GenerationFailure(format!("Failed to parse JSON: {}", e)))?;

        Ok(json["data"]
            .as_array()
            .ok_or_else(|| {
                AppError::GenerationFailure("Invalid response format: missing data array".to_string())
            })?
            .iter()
            .filter_map(|m| m["id"].as_str())
            .map(|id| id.to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: LLMProvider, key: Option<&str>) -> LLMConfig {
        LLMConfig {
            provider,
            base_url: "https://api.openai.com/v1/".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: key.map(str::to_string),
            ..LLMConfig::default()
        }
    }

    #[test]
    fn test_endpoint_joins_once() {
        assert_eq!(
            endpoint("https://api.openai.com/v1/", "chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_key_rules() {
        assert!(OpenAIClient::api_key(&config(LLMProvider::OpenAI, None)).is_err());
        assert_eq!(
            OpenAIClient::api_key(&config(LLMProvider::Local, None)).unwrap(),
            None
        );
        assert_eq!(
            OpenAIClient::api_key(&config(LLMProvider::OpenAI, Some("sk-1"))).unwrap(),
            Some("sk-1".to_string())
        );
    }

    #[test]
    fn test_request_body_and_completion() {
        let body = request_body(&config(LLMProvider::OpenAI, None), "", "List tests");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], 2000);

        let reply = json!({"choices": [{"message": {"content": "ok"}}]});
        assert_eq!(completion_text(&reply).unwrap(), "ok");
        assert!(completion_text(&json!({"choices": []})).is_err());
    }
}
