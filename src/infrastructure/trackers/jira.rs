use super::{compliance_lines, numbered_steps, require_project, TrackerAdapter, TrackerAuth, TrackerHttp};
use crate::domain::error::Result;
use crate::domain::integration::{RemoteTestCase, TestCaseUpdate, TestExecutionResult, TrackerKind};
use crate::domain::test_case::TestCase;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Map, Value};

const STEPS_FIELD: &str = "customfield_10000";
const EXPECTED_FIELD: &str = "customfield_10001";
const SEARCH_FIELDS: &str = "summary,description,priority,status,customfield_10000,customfield_10001";
const MAX_RESULTS: u32 = 100;

/// Jira REST v2. Test cases are issues of type `Test`.
pub struct JiraAdapter {
    http: TrackerHttp,
    project_key: String,
}

impl JiraAdapter {
    /// Basic auth when a user name is configured, bearer token otherwise.
    pub fn new(base_url: &str, project_key: &str, username: &str, token: Option<String>) -> Self {
        let auth = match token {
            Some(token) if !username.trim().is_empty() => TrackerAuth::Basic {
                username: username.to_string(),
                password: token,
            },
            Some(token) => TrackerAuth::Bearer(token),
            None => TrackerAuth::Anonymous,
        };
        Self {
            http: TrackerHttp::new(base_url, auth),
            project_key: project_key.to_string(),
        }
    }

    fn browse_url(&self, key: &str) -> String {
        self.http.url(&format!("browse/{}", key))
    }

    /// Jira has no native execution record without a test-management add-on,
    /// so results are posted as a comment on the issue.
    pub async fn add_test_results(&self, remote_id: &str, results: &TestExecutionResult) -> Result<RemoteTestCase> {
        let request = self
            .http
            .request(Method::POST, &format!("rest/api/2/issue/{}/comment", remote_id))
            .json(&results_comment(results));
        self.http.send(request, "Jira add test results").await?;
        tracing::info!(key = %remote_id, "Added test results to Jira test case");
        self.get_test_case(remote_id).await
    }
}

fn results_comment(results: &TestExecutionResult) -> Value {
    let field = |value: &Option<String>, fallback: &str| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };
    let body = format!(
        "*Test Results:*\n- Status: {}\n- Execution Date: {}\n- Tester: {}\n- Notes: {}",
        field(&results.status, "Unknown"),
        field(&results.execution_date, "N/A"),
        field(&results.tester, "Automated"),
        field(&results.notes, "No notes"),
    );
    json!({ "body": body })
}

fn issue_description(test_case: &TestCase) -> String {
    let mut description = test_case.description.clone();
    let checks = compliance_lines(test_case);
    if !checks.is_empty() {
        description.push_str("\n\n*Compliance Checks:*");
        for line in checks {
            description.push('\n');
            description.push_str(&line);
        }
    }
    if !test_case.test_data.is_empty() {
        description.push_str("\n\n*Test Data:*");
        for (key, value) in &test_case.test_data {
            description.push_str(&format!("\n{}: {}", key, value));
        }
    }
    description
}

fn issue_payload(test_case: &TestCase, project: &str) -> Value {
    let summary = if test_case.title.trim().is_empty() {
        "Untitled Test Case"
    } else {
        test_case.title.as_str()
    };
    json!({
        "fields": {
            "project": { "key": project },
            "issuetype": { "name": "Test" },
            "summary": summary,
            "description": issue_description(test_case),
            "priority": { "name": test_case.priority.as_str() },
            STEPS_FIELD: numbered_steps(&test_case.steps),
            EXPECTED_FIELD: test_case.expected_results,
            "labels": ["ai-generated", "healthcare"],
        }
    })
}

fn update_payload(update: &TestCaseUpdate) -> Value {
    let mut fields = Map::new();
    if let Some(title) = &update.title {
        fields.insert("summary".to_string(), json!(title));
    }
    if let Some(description) = &update.description {
        fields.insert("description".to_string(), json!(description));
    }
    if let Some(priority) = &update.priority {
        fields.insert("priority".to_string(), json!({ "name": priority }));
    }
    if let Some(steps) = &update.steps {
        fields.insert(STEPS_FIELD.to_string(), json!(numbered_steps(steps)));
    }
    if let Some(expected) = &update.expected_results {
        fields.insert(EXPECTED_FIELD.to_string(), json!(expected));
    }
    json!({ "fields": fields })
}

/// Lines with a digit are steps; a leading `N.` is dropped.
fn parse_steps(field: &str) -> Vec<String> {
    field
        .lines()
        .map(str::trim)
        .filter(|line| line.chars().any(|c| c.is_ascii_digit()))
        .map(|line| match line.split_once('.') {
            Some((number, rest)) if number.chars().all(|c| c.is_ascii_digit()) => rest.trim().to_string(),
            _ => line.to_string(),
        })
        .filter(|step| !step.is_empty())
        .collect()
}

fn from_issue(issue: &Value) -> RemoteTestCase {
    let fields = &issue["fields"];
    let text = |value: &Value| value.as_str().unwrap_or_default().to_string();
    RemoteTestCase {
        remote_id: text(&issue["key"]),
        title: text(&fields["summary"]),
        description: text(&fields["description"]),
        priority: fields["priority"]["name"].as_str().unwrap_or("Medium").to_string(),
        steps: parse_steps(fields[STEPS_FIELD].as_str().unwrap_or_default()),
        expected_results: text(&fields[EXPECTED_FIELD]),
        status: fields["status"]["name"].as_str().map(str::to_string),
        url: issue["self"].as_str().map(str::to_string),
    }
}

fn search_jql(query: Option<&str>, project: Option<&str>) -> String {
    let mut parts = vec!["issuetype = Test".to_string()];
    if let Some(project) = project.filter(|p| !p.trim().is_empty()) {
        parts.push(format!("project = \"{}\"", project.replace('"', "\\\"")));
    }
    if let Some(query) = query.filter(|q| !q.trim().is_empty()) {
        parts.push(format!("text ~ \"{}\"", query.replace('"', "\\\"")));
    }
    parts.join(" AND ")
}

#[async_trait]
impl TrackerAdapter for JiraAdapter {
    fn kind(&self) -> TrackerKind {
        TrackerKind::Jira
    }

    fn default_project(&self) -> Option<&str> {
        Some(self.project_key.as_str()).filter(|key| !key.trim().is_empty())
    }

    async fn create_test_case(&self, test_case: &TestCase, project: Option<&str>) -> Result<RemoteTestCase> {
        let project = require_project(project, "Jira project key")?;
        let request = self
            .http
            .request(Method::POST, "rest/api/2/issue")
            .json(&issue_payload(test_case, project));
        let created = self.http.send(request, "Jira create issue").await?;

        // The create response only carries id, key and self.
        let key = created["key"].as_str().unwrap_or_default().to_string();
        tracing::info!(key = %key, "Created Jira test case");
        Ok(RemoteTestCase {
            url: Some(self.browse_url(&key)),
            remote_id: key,
            title: test_case.title.clone(),
            description: test_case.description.clone(),
            priority: test_case.priority.to_string(),
            steps: test_case.steps.clone(),
            expected_results: test_case.expected_results.clone(),
            status: None,
        })
    }

    async fn update_test_case(&self, remote_id: &str, update: &TestCaseUpdate) -> Result<RemoteTestCase> {
        let request = self
            .http
            .request(Method::PUT, &format!("rest/api/2/issue/{}", remote_id))
            .json(&update_payload(update));
        // Jira answers 204 without a body.
        self.http.send(request, "Jira update issue").await?;
        tracing::info!(key = %remote_id, "Updated Jira test case");
        self.get_test_case(remote_id).await
    }

    async fn get_test_case(&self, remote_id: &str) -> Result<RemoteTestCase> {
        let request = self
            .http
            .request(Method::GET, &format!("rest/api/2/issue/{}", remote_id));
        let issue = self.http.send(request, "Jira get issue").await?;
        Ok(from_issue(&issue))
    }

    async fn search_test_cases(&self, query: Option<&str>, project: Option<&str>) -> Result<Vec<RemoteTestCase>> {
        let jql = search_jql(query, project);
        let max_results = MAX_RESULTS.to_string();
        let request = self.http.request(Method::GET, "rest/api/2/search").query(&[
            ("jql", jql.as_str()),
            ("maxResults", max_results.as_str()),
            ("fields", SEARCH_FIELDS),
        ]);
        let results = self.http.send(request, "Jira search").await?;

        let found: Vec<RemoteTestCase> = results["issues"]
            .as_array()
            .map(|issues| issues.iter().map(from_issue).collect())
            .unwrap_or_default();
        tracing::info!(count = found.len(), "Jira search finished");
        Ok(found)
    }

    async fn test_connection(&self) -> bool {
        self.http.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_case::{ComplianceCheck, Priority};

    fn sample_case() -> TestCase {
        let mut case = TestCase {
            description: "Pump stops on occlusion".to_string(),
            priority: Priority::High,
            steps: vec!["Start infusion".to_string(), "Clamp line".to_string()],
            expected_results: "Alarm within 5 seconds".to_string(),
            compliance_checks: vec![ComplianceCheck {
                standard: "IEC 62304".to_string(),
                requirement: "Risk control verified".to_string(),
                passed: true,
                issue: None,
                recommendation: None,
            }],
            ..TestCase::new("TC-001", "Occlusion alarm")
        };
        case.test_data.insert("rate".to_string(), "50 ml/h".to_string());
        case
    }

    #[test]
    fn test_issue_payload_fields() {
        let payload = issue_payload(&sample_case(), "MED");
        let fields = &payload["fields"];
        assert_eq!(fields["project"]["key"], "MED");
        assert_eq!(fields["issuetype"]["name"], "Test");
        assert_eq!(fields["priority"]["name"], "High");
        assert_eq!(fields[STEPS_FIELD], "1. Start infusion\n2. Clamp line");
        assert_eq!(fields[EXPECTED_FIELD], "Alarm within 5 seconds");
        assert_eq!(fields["labels"], json!(["ai-generated", "healthcare"]));

        let description = fields["description"].as_str().unwrap();
        assert!(description.starts_with("Pump stops on occlusion"));
        assert!(description.contains("[PASS] IEC 62304: Risk control verified"));
        assert!(description.contains("rate: 50 ml/h"));
    }

    #[test]
    fn test_results_comment_fills_missing_values() {
        let results = TestExecutionResult {
            status: Some("Passed".to_string()),
            tester: Some("  ".to_string()),
            ..TestExecutionResult::default()
        };
        let body = results_comment(&results)["body"].as_str().unwrap().to_string();
        assert_eq!(
            body,
            "*Test Results:*\n- Status: Passed\n- Execution Date: N/A\n- Tester: Automated\n- Notes: No notes"
        );
    }

    #[test]
    fn test_update_payload_only_sends_set_fields() {
        let update = TestCaseUpdate {
            title: Some("Renamed".to_string()),
            priority: Some("Critical".to_string()),
            ..TestCaseUpdate::default()
        };
        let payload = update_payload(&update);
        let fields = payload["fields"].as_object().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["summary"], "Renamed");
        assert_eq!(fields["priority"]["name"], "Critical");
    }

    #[test]
    fn test_from_issue_maps_fields() {
        let issue = json!({
            "key": "MED-42",
            "self": "https://jira.example/rest/api/2/issue/10042",
            "fields": {
                "summary": "Occlusion alarm",
                "description": "Pump stops",
                "priority": {"name": "High"},
                "status": {"name": "To Do"},
                STEPS_FIELD: "1. Start infusion\n2. Clamp line at 10 ml\n\n",
                EXPECTED_FIELD: "Alarm"
            }
        });
        let remote = from_issue(&issue);
        assert_eq!(remote.remote_id, "MED-42");
        assert_eq!(remote.steps, vec!["Start infusion", "Clamp line at 10 ml"]);
        assert_eq!(remote.status.as_deref(), Some("To Do"));
        assert_eq!(remote.expected_results, "Alarm");
    }

    #[test]
    fn test_search_jql() {
        assert_eq!(search_jql(None, None), "issuetype = Test");
        assert_eq!(
            search_jql(Some("dose \"max\""), Some("MED")),
            "issuetype = Test AND project = \"MED\" AND text ~ \"dose \\\"max\\\"\""
        );
    }

    #[tokio::test]
    async fn test_create_requires_project() {
        let adapter = JiraAdapter::new("https://jira.example", "", "", None);
        assert!(adapter.default_project().is_none());
        let err = adapter.create_test_case(&sample_case(), None).await.unwrap_err();
        assert!(matches!(err, crate::domain::error::AppError::InvalidInput(_)));
    }
}
