use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{LLMConfig, LLMProvider};
use crate::infrastructure::security::secrets::SecretStore;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use validator::Validate;

const SECRET_SERVICE: &str = "HealthcareTestGen";
const CONFIG_PATH_VAR: &str = "TESTGEN_CONFIG";
const ENV_PREFIX: &str = "TESTGEN_";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppSection {
    #[validate(length(min = 1))]
    pub name: String,
    pub version: String,
    pub debug: bool,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseSection {
    #[validate(length(min = 1, message = "database path must not be empty"))]
    pub path: String,
    pub backup_dir: String,
    pub auto_backup: bool,
    #[validate(range(min = 1))]
    pub max_backups: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AiSection {
    pub provider: LLMProvider,
    #[validate(length(min = 1))]
    pub model: String,
    pub base_url: Option<String>,
    #[validate(range(min = 0.0, max = 1.0, message = "temperature must be between 0 and 1"))]
    pub temperature: f32,
    #[validate(range(min = 1, message = "max_tokens must be positive"))]
    pub max_tokens: u32,
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FileProcessingSection {
    #[validate(range(min = 1, message = "max_file_size_mb must be positive"))]
    pub max_file_size_mb: u64,
    pub supported_formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerSection {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraSettings {
    pub enabled: bool,
    pub base_url: String,
    pub project_key: String,
    pub username: String,
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolarionSettings {
    pub enabled: bool,
    pub base_url: String,
    pub project_id: String,
    pub username: String,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureDevopsSettings {
    pub enabled: bool,
    pub organization_url: String,
    pub project_name: String,
    pub personal_access_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrationsSection {
    pub jira: JiraSettings,
    pub polarion: PolarionSettings,
    pub azure_devops: AzureDevopsSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceSection {
    pub enabled_standards: Vec<String>,
    pub strict_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSection {
    pub default_format: String,
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub app: AppSection,
    #[validate(nested)]
    pub database: DatabaseSection,
    #[validate(nested)]
    pub ai: AiSection,
    #[validate(nested)]
    pub file_processing: FileProcessingSection,
    #[validate(nested)]
    pub server: ServerSection,
    pub integrations: IntegrationsSection,
    pub compliance: ComplianceSection,
    pub export: ExportSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection {
                name: "Healthcare TestGen AI".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                debug: false,
                log_level: "info".to_string(),
            },
            database: DatabaseSection {
                path: "data/testgen.db".to_string(),
                backup_dir: "data/backups".to_string(),
                auto_backup: true,
                max_backups: 7,
            },
            ai: AiSection {
                provider: LLMProvider::Google,
                model: "gemini-2.0-flash".to_string(),
                base_url: None,
                temperature: 0.7,
                max_tokens: 2000,
                timeout_secs: 120,
            },
            file_processing: FileProcessingSection {
                max_file_size_mb: 10,
                supported_formats: ["pdf", "docx", "xml", "txt", "md", "json"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            server: ServerSection {
                host: "127.0.0.1".to_string(),
                port: 3001,
            },
            integrations: IntegrationsSection::default(),
            compliance: ComplianceSection {
                enabled_standards: vec!["FDA".to_string(), "ISO 13485".to_string()],
                strict_mode: false,
            },
            export: ExportSection {
                default_format: "json".to_string(),
                output_dir: "exports".to_string(),
            },
        }
    }
}

impl AppConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.file_processing.max_file_size_mb * 1024 * 1024
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}

/// Overrides applied on top of the defaults for a named `APP_ENV`.
fn environment_overrides(app_env: &str) -> Option<serde_json::Value> {
    match app_env.trim().to_ascii_lowercase().as_str() {
        "development" | "dev" => Some(json!({
            "app": { "debug": true, "log_level": "debug" },
            "database": { "path": "data/testgen_dev.db" },
        })),
        "testing" | "test" => Some(json!({
            "app": { "debug": false, "log_level": "info" },
            "database": { "path": "data/testgen_test.db" },
        })),
        "production" | "prod" => Some(json!({
            "app": { "debug": false, "log_level": "warn" },
            "database": { "path": "data/testgen_prod.db" },
        })),
        _ => None,
    }
}

pub struct ConfigService {
    figment: Figment,
    config: AppConfig,
    secrets: SecretStore,
}

impl ConfigService {
    /// Defaults, then the `APP_ENV` profile, then the TOML file, then `TESTGEN_*` variables.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let path = std::env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));
        let app_env = std::env::var("APP_ENV").ok();
        Self::load_from(Some(&path), app_env.as_deref())
    }

    pub fn load_from(path: Option<&Path>, app_env: Option<&str>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        if let Some(env_name) = app_env {
            match environment_overrides(env_name) {
                Some(overrides) => figment = figment.merge(Serialized::defaults(overrides)),
                None => tracing::warn!(app_env = env_name, "Unknown APP_ENV, using defaults"),
            }
        }

        if let Some(path) = path {
            if path.exists() {
                tracing::info!("Loading configuration from {}", path.display());
                figment = figment.merge(Toml::file(path));
            } else {
                tracing::debug!("No configuration file at {}", path.display());
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config = extract_config(&figment)?;
        Ok(Self {
            figment,
            config,
            secrets: SecretStore::new(SECRET_SERVICE),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Reads a value by dot path, e.g. `ai.max_tokens`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.figment
            .extract_inner::<T>(key)
            .map_err(|e| AppError::ConfigError(format!("Failed to read {}: {}", key, e)))
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Sets a value by dot path. Intermediate tables are created as needed; the
    /// change is rejected if the resulting configuration no longer validates.
    pub fn set<V: Serialize>(&mut self, key: &str, value: V) -> Result<()> {
        if key.trim().is_empty() {
            return Err(AppError::InvalidInput("Configuration key is empty".to_string()));
        }
        let figment = self.figment.clone().merge((key, value));
        let config = extract_config(&figment)?;
        self.figment = figment;
        self.config = config;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        validate_config(&self.config)
    }

    /// Model settings for the configured provider, API key resolved from the
    /// provider's environment variable or the keyring.
    pub fn llm_config(&self) -> LLMConfig {
        let ai = &self.config.ai;
        let defaults = LLMConfig::default();
        let base_url = ai.base_url.clone().unwrap_or_else(|| match ai.provider {
            LLMProvider::Google => defaults.base_url.clone(),
            LLMProvider::OpenAI => "https://api.openai.com/v1".to_string(),
            LLMProvider::Local => "http://localhost:11434/v1".to_string(),
        });

        LLMConfig {
            provider: ai.provider.clone(),
            base_url,
            model: ai.model.clone(),
            api_key: self
                .secrets
                .resolve(ai.provider.key_name(), ai.provider.env_var()),
            max_tokens: Some(ai.max_tokens),
            temperature: Some(ai.temperature),
            timeout_secs: Some(ai.timeout_secs),
        }
    }

    /// Tracker credential from config, falling back to the keyring entry `name`.
    pub fn tracker_secret(&self, name: &str, configured: Option<&String>) -> Option<String> {
        configured
            .filter(|value| !value.trim().is_empty())
            .cloned()
            .or_else(|| self.secrets.resolve(name, None))
    }

    pub fn save_api_key(&self, provider: &str, key: &str) -> Result<()> {
        self.secrets.store(provider, key)
    }

    pub fn get_api_key(&self, provider: &LLMProvider) -> Option<String> {
        self.secrets.resolve(provider.key_name(), provider.env_var())
    }

    pub fn delete_api_key(&self, provider: &str) -> Result<()> {
        self.secrets.remove(provider)
    }
}

fn extract_config(figment: &Figment) -> Result<AppConfig> {
    let config: AppConfig = figment
        .extract()
        .map_err(|e| AppError::ConfigError(format!("Failed to load configuration: {}", e)))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| AppError::ConfigError(format!("Invalid configuration: {}", e)))?;
    if config.database.path.trim().is_empty() {
        return Err(AppError::ConfigError(
            "Invalid configuration: database path must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn service(app_env: Option<&str>) -> ConfigService {
        let figment = Figment::from(Serialized::defaults(AppConfig::default()));
        let figment = match app_env.and_then(environment_overrides) {
            Some(overrides) => figment.merge(Serialized::defaults(overrides)),
            None => figment,
        };
        ConfigService::from_figment(figment).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = service(None);
        assert_eq!(config.config().app.name, "Healthcare TestGen AI");
        assert_eq!(config.config().database.path, "data/testgen.db");
        assert_eq!(config.config().server.port, 3001);
        assert_eq!(config.get::<u32>("ai.max_tokens").unwrap(), 2000);
        assert_eq!(
            config.get::<Vec<String>>("compliance.enabled_standards").unwrap(),
            vec!["FDA", "ISO 13485"]
        );
        assert_eq!(config.config().max_file_size_bytes(), 10 * 1024 * 1024);
    }

    #[test]
    fn test_environment_profile_overrides_defaults() {
        let config = service(Some("production"));
        assert_eq!(config.config().database.path, "data/testgen_prod.db");
        assert_eq!(config.config().app.log_level, "warn");
        assert!(!config.config().app.debug);

        let config = service(Some("development"));
        assert_eq!(config.config().database.path, "data/testgen_dev.db");
        assert!(config.config().app.debug);
    }

    #[test]
    fn test_missing_key_falls_back() {
        let config = service(None);
        assert!(config.get::<String>("ai.missing").is_err());
        assert_eq!(config.get_or("ai.missing", "fallback".to_string()), "fallback");
    }

    #[test]
    fn test_set_creates_nested_keys() {
        let mut config = service(None);
        config.set("ai.max_tokens", 4096).unwrap();
        config.set("custom.nested.flag", true).unwrap();
        assert_eq!(config.config().ai.max_tokens, 4096);
        assert!(config.get::<bool>("custom.nested.flag").unwrap());
        // untouched siblings survive the merge
        assert_eq!(config.config().ai.model, "gemini-2.0-flash");
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = service(None);
        assert!(matches!(
            config.set("ai.temperature", 1.5),
            Err(AppError::ConfigError(_))
        ));
        assert!(matches!(
            config.set("ai.max_tokens", 0),
            Err(AppError::ConfigError(_))
        ));
        assert!(matches!(
            config.set("database.path", ""),
            Err(AppError::ConfigError(_))
        ));
        // rejected changes leave the previous state in place
        assert_eq!(config.config().ai.temperature, 0.7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_file_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[ai]\nmodel = \"gemini-1.5-pro\"\ntemperature = 0.2\n\n[file_processing]\nmax_file_size_mb = 25"
        )
        .unwrap();

        let config = ConfigService::load_from(Some(&path), Some("testing")).unwrap();
        assert_eq!(config.config().ai.model, "gemini-1.5-pro");
        assert_eq!(config.config().ai.temperature, 0.2);
        assert_eq!(config.config().ai.max_tokens, 2000);
        assert_eq!(config.config().file_processing.max_file_size_mb, 25);
        assert_eq!(config.config().database.path, "data/testgen_test.db");
    }

    #[test]
    fn test_llm_config_uses_provider_defaults() {
        let mut config = service(None);
        config.set("ai.provider", "OpenAI").unwrap();
        config.set("ai.model", "gpt-4o-mini").unwrap();
        let llm = config.llm_config();
        assert_eq!(llm.provider, LLMProvider::OpenAI);
        assert_eq!(llm.base_url, "https://api.openai.com/v1");
        assert_eq!(llm.max_tokens, Some(2000));
    }
}
