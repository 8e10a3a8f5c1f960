use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum LLMProvider {
    Google,
    OpenAI,
    Local,
}

impl LLMProvider {
    pub fn key_name(&self) -> &'static str {
        match self {
            LLMProvider::Google => "google",
            LLMProvider::OpenAI => "openai",
            LLMProvider::Local => "local",
        }
    }

    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            LLMProvider::Google => Some("GEMINI_API_KEY"),
            LLMProvider::OpenAI => Some("OPENAI_API_KEY"),
            LLMProvider::Local => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::Google,
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: None,
            max_tokens: Some(2000),
            temperature: Some(0.7),
            timeout_secs: Some(120),
        }
    }
}
