//! External test-management trackers.
//!
//! Every adapter maps our `TestCase` onto the tracker's own record shape and
//! back into a `RemoteTestCase`. Batch import and search write one
//! integration log row per remote operation.

mod azure_devops;
mod jira;
mod polarion;

pub use azure_devops::AzureDevOpsAdapter;
pub use jira::JiraAdapter;
pub use polarion::PolarionAdapter;

use crate::domain::error::{AppError, Result};
use crate::domain::integration::{
    ImportOutcome, ImportSummary, IntegrationLog, RemoteTestCase, TestCaseUpdate, TrackerKind,
};
use crate::domain::test_case::TestCase;
use crate::infrastructure::config::{ConfigService, IntegrationsSection};
use crate::infrastructure::db::TestGenRepository;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use std::time::Duration;

const TRACKER_TIMEOUT_SECS: u64 = 30;

#[async_trait]
pub trait TrackerAdapter: Send + Sync {
    fn kind(&self) -> TrackerKind;

    /// Project used when a request does not name one.
    fn default_project(&self) -> Option<&str> {
        None
    }

    async fn create_test_case(&self, test_case: &TestCase, project: Option<&str>) -> Result<RemoteTestCase>;
    async fn update_test_case(&self, remote_id: &str, update: &TestCaseUpdate) -> Result<RemoteTestCase>;
    async fn get_test_case(&self, remote_id: &str) -> Result<RemoteTestCase>;
    async fn search_test_cases(&self, query: Option<&str>, project: Option<&str>) -> Result<Vec<RemoteTestCase>>;
    async fn test_connection(&self) -> bool;
}

pub(crate) fn require_project<'a>(project: Option<&'a str>, label: &str) -> Result<&'a str> {
    project
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::InvalidInput(format!("{} is required", label)))
}

pub(crate) enum TrackerAuth {
    Bearer(String),
    Basic { username: String, password: String },
    /// Personal access token sent as basic auth with an empty user name.
    Pat(String),
    Anonymous,
}

impl TrackerAuth {
    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            TrackerAuth::Bearer(token) => request.bearer_auth(token),
            TrackerAuth::Basic { username, password } => request.basic_auth(username, Some(password)),
            TrackerAuth::Pat(token) => request.header(
                reqwest::header::AUTHORIZATION,
                format!("Basic {}", STANDARD.encode(format!(":{}", token))),
            ),
            TrackerAuth::Anonymous => request,
        }
    }
}

/// Shared HTTP plumbing for the REST trackers.
pub(crate) struct TrackerHttp {
    client: reqwest::Client,
    base_url: String,
    auth: TrackerAuth,
}

impl TrackerHttp {
    pub(crate) fn new(base_url: &str, auth: TrackerAuth) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(TRACKER_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.auth.apply(self.client.request(method, self.url(path)))
    }

    /// Sends the request and decodes the JSON body. Empty bodies come back as `Null`.
    pub(crate) async fn send(&self, request: reqwest::RequestBuilder, context: &str) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::IntegrationError(format!("{} request failed: {}", context, e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("{}: {}", context, text)));
        }
        if !status.is_success() {
            return Err(AppError::IntegrationError(format!(
                "{} failed ({}): {}",
                context, status, text
            )));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| AppError::IntegrationError(format!("{} returned invalid JSON: {}", context, e)))
    }

    pub(crate) async fn ping(&self) -> bool {
        match self.request(reqwest::Method::GET, "").send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::error!(base_url = %self.base_url, error = %err, "Tracker connection test failed");
                false
            }
        }
    }
}

/// Only absolute http(s) URLs are accepted as tracker endpoints.
fn checked_base_url(kind: TrackerKind, raw: &str) -> Result<String> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| AppError::ConfigError(format!("Invalid {} base URL '{}': {}", kind, raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::ConfigError(format!(
            "{} base URL must use http or https: {}",
            kind, raw
        )));
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

fn disabled(kind: TrackerKind) -> AppError {
    AppError::ConfigError(format!("{} integration is disabled", kind))
}

pub fn build_jira(settings: &IntegrationsSection, config: &ConfigService) -> Result<JiraAdapter> {
    let jira = &settings.jira;
    if !jira.enabled {
        return Err(disabled(TrackerKind::Jira));
    }
    let token = config.tracker_secret("jira", jira.api_token.as_ref());
    Ok(JiraAdapter::new(
        &checked_base_url(TrackerKind::Jira, &jira.base_url)?,
        &jira.project_key,
        &jira.username,
        token,
    ))
}

pub fn build_azure_devops(settings: &IntegrationsSection, config: &ConfigService) -> Result<AzureDevOpsAdapter> {
    let azure = &settings.azure_devops;
    if !azure.enabled {
        return Err(disabled(TrackerKind::AzureDevops));
    }
    let token = config
        .tracker_secret("azure_devops", azure.personal_access_token.as_ref())
        .ok_or_else(|| AppError::ConfigError("Azure DevOps personal access token is not set".to_string()))?;
    Ok(AzureDevOpsAdapter::new(
        &checked_base_url(TrackerKind::AzureDevops, &azure.organization_url)?,
        &azure.project_name,
        &token,
    ))
}

pub fn build_polarion(settings: &IntegrationsSection) -> Result<PolarionAdapter> {
    let polarion = &settings.polarion;
    if !polarion.enabled {
        return Err(disabled(TrackerKind::Polarion));
    }
    let base_url = if polarion.base_url.trim().is_empty() {
        String::new()
    } else {
        checked_base_url(TrackerKind::Polarion, &polarion.base_url)?
    };
    Ok(PolarionAdapter::new(&base_url, &polarion.project_id))
}

/// Builds the adapter for `kind` from configuration. Disabled trackers are a config error.
pub fn build_adapter(
    kind: TrackerKind,
    settings: &IntegrationsSection,
    config: &ConfigService,
) -> Result<Box<dyn TrackerAdapter>> {
    Ok(match kind {
        TrackerKind::Jira => Box::new(build_jira(settings, config)?),
        TrackerKind::AzureDevops => Box::new(build_azure_devops(settings, config)?),
        TrackerKind::Polarion => Box::new(build_polarion(settings)?),
    })
}

/// Creates every case in the tracker. A failed case is recorded and skipped.
pub async fn import_test_cases(
    adapter: &dyn TrackerAdapter,
    repository: &TestGenRepository,
    test_cases: &[TestCase],
    project: Option<&str>,
) -> ImportSummary {
    let project = project.or_else(|| adapter.default_project());
    let mut results = Vec::with_capacity(test_cases.len());

    for test_case in test_cases {
        let outcome = match adapter.create_test_case(test_case, project).await {
            Ok(remote) => {
                tracing::info!(tracker = %adapter.kind(), remote_id = %remote.remote_id, "Imported test case");
                record(repository, adapter.kind(), "create", Some(&test_case.id), "success", Some(remote.remote_id.clone())).await;
                ImportOutcome {
                    test_case_id: test_case.id.clone(),
                    remote_id: Some(remote.remote_id),
                    success: true,
                    error: None,
                }
            }
            Err(err) => {
                tracing::error!(tracker = %adapter.kind(), test_case = %test_case.id, error = %err, "Failed to import test case");
                record(repository, adapter.kind(), "create", Some(&test_case.id), "error", Some(err.to_string())).await;
                ImportOutcome {
                    test_case_id: test_case.id.clone(),
                    remote_id: None,
                    success: false,
                    error: Some(err.to_string()),
                }
            }
        };
        results.push(outcome);
    }

    let successful = results.iter().filter(|r| r.success).count();
    ImportSummary {
        tracker: adapter.kind(),
        total: results.len(),
        successful,
        failed: results.len() - successful,
        results,
    }
}

pub async fn search_remote(
    adapter: &dyn TrackerAdapter,
    repository: &TestGenRepository,
    query: Option<&str>,
    project: Option<&str>,
) -> Result<Vec<RemoteTestCase>> {
    let project = project.or_else(|| adapter.default_project());
    let result = adapter.search_test_cases(query, project).await;
    match &result {
        Ok(found) => {
            record(repository, adapter.kind(), "search", project, "success", Some(format!("{} results", found.len()))).await
        }
        Err(err) => record(repository, adapter.kind(), "search", project, "error", Some(err.to_string())).await,
    }
    result
}

/// Log rows are best effort; a storage failure must not fail the tracker call.
pub(crate) async fn record(
    repository: &TestGenRepository,
    kind: TrackerKind,
    operation: &str,
    target_id: Option<&str>,
    status: &str,
    details: Option<String>,
) {
    let log = IntegrationLog {
        integration_type: kind.as_str().to_string(),
        operation: operation.to_string(),
        target_id: target_id.map(str::to_string),
        status: status.to_string(),
        details,
        timestamp: chrono::Local::now().to_rfc3339(),
    };
    if let Err(err) = repository.insert_integration_log(&log).await {
        tracing::warn!(error = %err, "Failed to write integration log");
    }
}

/// Steps numbered `1. ...` one per line; an empty list gets the two generic steps.
pub(crate) fn numbered_steps(steps: &[String]) -> String {
    if steps.is_empty() {
        return "1. Execute test\n2. Verify results".to_string();
    }
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}", i + 1, step))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn compliance_lines(test_case: &TestCase) -> Vec<String> {
    test_case
        .compliance_checks
        .iter()
        .map(|check| {
            let mark = if check.passed { "PASS" } else { "FAIL" };
            let standard = if check.standard.is_empty() { "Unknown" } else { &check.standard };
            format!("[{}] {}: {}", mark, standard, check.requirement)
        })
        .collect()
}
