use super::{compliance_lines, require_project, TrackerAdapter, TrackerAuth, TrackerHttp};
use crate::application::use_cases::compliance::escape_html;
use crate::domain::error::{AppError, Result};
use crate::domain::integration::{PlanAssignment, RemoteTestCase, TestCaseUpdate, TestPlan, TrackerKind};
use crate::domain::test_case::{Priority, TestCase};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::BTreeMap;

const API_VERSION: &str = "7.1";
const JSON_PATCH: &str = "application/json-patch+json";

const TITLE_FIELD: &str = "System.Title";
const DESCRIPTION_FIELD: &str = "System.Description";
const STEPS_FIELD: &str = "Microsoft.VSTS.TCM.Steps";
const PARAMETERS_FIELD: &str = "Microsoft.VSTS.TCM.Parameters";
const PRIORITY_FIELD: &str = "Microsoft.VSTS.Common.Priority";

static STEP_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<step\b[^>]*>(.*?)</step>").unwrap());
static STEP_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<parameterizedString[^>]*>(.*?)</parameterizedString>").unwrap());

/// Azure DevOps work items of type `Test Case`.
pub struct AzureDevOpsAdapter {
    http: TrackerHttp,
    project_name: String,
}

impl AzureDevOpsAdapter {
    pub fn new(organization_url: &str, project_name: &str, personal_access_token: &str) -> Self {
        Self {
            http: TrackerHttp::new(organization_url, TrackerAuth::Pat(personal_access_token.to_string())),
            project_name: project_name.to_string(),
        }
    }

    fn project_or_default<'a>(&'a self, project: Option<&'a str>) -> Result<&'a str> {
        require_project(
            project.filter(|p| !p.trim().is_empty()).or_else(|| self.default_project()),
            "Azure DevOps project name",
        )
    }

    pub async fn create_test_plan(&self, name: &str, project: Option<&str>, description: &str) -> Result<TestPlan> {
        if name.trim().is_empty() {
            return Err(AppError::InvalidInput("Test plan name is required".to_string()));
        }
        let project = self.project_or_default(project)?;
        let request = self
            .http
            .request(Method::POST, &format!("{}/_apis/testplan/plans", project))
            .query(&[("api-version", API_VERSION)])
            .json(&test_plan_payload(name, project, description));
        let created = self.http.send(request, "Azure DevOps create test plan").await?;

        let plan = from_test_plan(&created);
        tracing::info!(plan_id = %plan.plan_id, "Created Azure DevOps test plan");
        Ok(plan)
    }

    /// Adds existing test case work items to the plan's root suite.
    pub async fn add_test_cases_to_plan(
        &self,
        plan_id: &str,
        test_case_ids: &[String],
        project: Option<&str>,
    ) -> Result<PlanAssignment> {
        if test_case_ids.is_empty() {
            return Err(AppError::InvalidInput("No test case ids to add".to_string()));
        }
        let project = self.project_or_default(project)?;
        let request = self
            .http
            .request(
                Method::POST,
                &format!("{}/_apis/testplan/plans/{}/suites/root/testcases", project, plan_id),
            )
            .query(&[("api-version", API_VERSION)])
            .json(&plan_test_cases_payload(test_case_ids));
        let response = self.http.send(request, "Azure DevOps add test cases to plan").await?;

        let added = response["value"]
            .as_array()
            .or_else(|| response.as_array())
            .map(Vec::len)
            .unwrap_or(test_case_ids.len());
        tracing::info!(plan_id = %plan_id, added, "Added test cases to Azure DevOps plan");
        Ok(PlanAssignment {
            plan_id: plan_id.to_string(),
            added,
        })
    }
}

fn test_plan_payload(name: &str, project: &str, description: &str) -> Value {
    json!({
        "name": name,
        "description": description,
        "areaPath": format!("{}\\Test", project),
        "iteration": format!("{}\\Iteration 1", project),
    })
}

/// Work item ids are numeric in Azure DevOps; anything else is passed through as text.
fn plan_test_cases_payload(test_case_ids: &[String]) -> Value {
    Value::Array(
        test_case_ids
            .iter()
            .map(|id| match id.trim().parse::<i64>() {
                Ok(number) => json!({ "id": number }),
                Err(_) => json!({ "id": id }),
            })
            .collect(),
    )
}

fn from_test_plan(plan: &Value) -> TestPlan {
    let plan_id = match &plan["id"] {
        Value::Number(id) => id.to_string(),
        Value::String(id) => id.clone(),
        _ => String::new(),
    };
    TestPlan {
        plan_id,
        name: plan["name"].as_str().unwrap_or_default().to_string(),
        description: plan["description"].as_str().unwrap_or_default().to_string(),
        url: plan["_links"]["_self"]["href"]
            .as_str()
            .or_else(|| plan["url"].as_str())
            .map(str::to_string),
    }
}

fn priority_rank(priority: Priority) -> u8 {
    match priority {
        Priority::Critical => 1,
        Priority::High => 2,
        Priority::Medium => 3,
        Priority::Low => 4,
    }
}

fn priority_label(rank: Option<i64>) -> String {
    match rank {
        Some(1) => Priority::Critical,
        Some(2) => Priority::High,
        Some(4) => Priority::Low,
        _ => Priority::Medium,
    }
    .to_string()
}

/// `<steps>` XML. The case's expected results go on the last step.
fn steps_xml(steps: &[String], expected_results: &str) -> String {
    let default_steps = ["Execute test".to_string(), "Verify results".to_string()];
    let steps = if steps.is_empty() { &default_steps[..] } else { steps };

    let mut xml = format!("<steps id=\"0\" last=\"{}\">", steps.len() + 1);
    for (index, step) in steps.iter().enumerate() {
        let expected = if index + 1 == steps.len() { expected_results } else { "" };
        xml.push_str(&format!(
            "<step id=\"{}\" type=\"ActionStep\"><parameterizedString isformatted=\"true\">{}</parameterizedString><parameterizedString isformatted=\"true\">{}</parameterizedString><description/></step>",
            index + 2,
            escape_html(step),
            escape_html(expected)
        ));
    }
    xml.push_str("</steps>");
    xml
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Action text of every step plus the last non-empty expected result.
fn parse_steps_xml(xml: &str) -> (Vec<String>, String) {
    let mut steps = Vec::new();
    let mut expected = String::new();
    for block in STEP_BLOCK.captures_iter(xml) {
        let mut parts = STEP_TEXT
            .captures_iter(&block[1])
            .map(|part| unescape(part[1].trim()));
        if let Some(action) = parts.next().filter(|action| !action.is_empty()) {
            steps.push(action);
        }
        if let Some(result) = parts.next().filter(|result| !result.is_empty()) {
            expected = result;
        }
    }
    (steps, expected)
}

fn parameters_text(test_data: &BTreeMap<String, String>) -> String {
    if test_data.is_empty() {
        return "No test data specified".to_string();
    }
    let lines: Vec<String> = test_data.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
    format!("Test Data:\n{}", lines.join("\n"))
}

fn work_item_description(test_case: &TestCase) -> String {
    let mut description = test_case.description.clone();
    let checks = compliance_lines(test_case);
    if !checks.is_empty() {
        description.push_str("\n\n**Compliance Checks:**\n");
        description.push_str(&checks.join("\n"));
    }
    description
}

fn create_patch(test_case: &TestCase) -> Value {
    let title = if test_case.title.trim().is_empty() {
        "Untitled Test Case"
    } else {
        test_case.title.as_str()
    };
    json!([
        { "op": "add", "path": format!("/fields/{}", TITLE_FIELD), "value": title },
        { "op": "add", "path": format!("/fields/{}", DESCRIPTION_FIELD), "value": work_item_description(test_case) },
        { "op": "add", "path": format!("/fields/{}", PRIORITY_FIELD), "value": priority_rank(test_case.priority) },
        { "op": "add", "path": format!("/fields/{}", STEPS_FIELD), "value": steps_xml(&test_case.steps, &test_case.expected_results) },
        { "op": "add", "path": format!("/fields/{}", PARAMETERS_FIELD), "value": parameters_text(&test_case.test_data) },
    ])
}

/// Steps and expected results live in the same field, so updating either rewrites both.
fn update_patch(update: &TestCaseUpdate, current: Option<&RemoteTestCase>) -> Value {
    let replace = |field: &str, value: Value| json!({ "op": "replace", "path": format!("/fields/{}", field), "value": value });
    let mut ops = Vec::new();
    if let Some(title) = &update.title {
        ops.push(replace(TITLE_FIELD, json!(title)));
    }
    if let Some(description) = &update.description {
        ops.push(replace(DESCRIPTION_FIELD, json!(description)));
    }
    if let Some(priority) = &update.priority {
        ops.push(replace(PRIORITY_FIELD, json!(priority_rank(Priority::from_label(priority)))));
    }
    if update.steps.is_some() || update.expected_results.is_some() {
        let steps = update
            .steps
            .clone()
            .or_else(|| current.map(|c| c.steps.clone()))
            .unwrap_or_default();
        let expected = update
            .expected_results
            .clone()
            .or_else(|| current.map(|c| c.expected_results.clone()))
            .unwrap_or_default();
        ops.push(replace(STEPS_FIELD, json!(steps_xml(&steps, &expected))));
    }
    Value::Array(ops)
}

fn from_work_item(item: &Value) -> RemoteTestCase {
    let fields = &item["fields"];
    let text = |name: &str| fields[name].as_str().unwrap_or_default().to_string();
    let (steps, expected_results) = parse_steps_xml(fields[STEPS_FIELD].as_str().unwrap_or_default());
    let remote_id = match &item["id"] {
        Value::Number(id) => id.to_string(),
        Value::String(id) => id.clone(),
        _ => String::new(),
    };
    RemoteTestCase {
        remote_id,
        title: text(TITLE_FIELD),
        description: text(DESCRIPTION_FIELD),
        priority: priority_label(fields[PRIORITY_FIELD].as_i64()),
        steps,
        expected_results,
        status: fields["System.State"].as_str().map(str::to_string),
        url: item["url"].as_str().map(str::to_string),
    }
}

fn wiql_query(query: Option<&str>, project: Option<&str>) -> String {
    let quote = |value: &str| value.replace('\'', "''");
    let mut wiql = String::from(
        "SELECT [System.Id] FROM WorkItems WHERE [System.WorkItemType] = 'Test Case'",
    );
    if let Some(project) = project.filter(|p| !p.trim().is_empty()) {
        wiql.push_str(&format!(" AND [System.TeamProject] = '{}'", quote(project)));
    }
    if let Some(query) = query.filter(|q| !q.trim().is_empty()) {
        wiql.push_str(&format!(" AND [System.Title] CONTAINS '{}'", quote(query)));
    }
    wiql
}

#[async_trait]
impl TrackerAdapter for AzureDevOpsAdapter {
    fn kind(&self) -> TrackerKind {
        TrackerKind::AzureDevops
    }

    fn default_project(&self) -> Option<&str> {
        Some(self.project_name.as_str()).filter(|name| !name.trim().is_empty())
    }

    async fn create_test_case(&self, test_case: &TestCase, project: Option<&str>) -> Result<RemoteTestCase> {
        let project = require_project(project, "Azure DevOps project name")?;
        let request = self
            .http
            .request(Method::POST, &format!("{}/_apis/wit/workitems/$Test%20Case", project))
            .query(&[("api-version", API_VERSION)])
            .header(reqwest::header::CONTENT_TYPE, JSON_PATCH)
            .body(create_patch(test_case).to_string());
        let created = self.http.send(request, "Azure DevOps create work item").await?;

        let remote = from_work_item(&created);
        tracing::info!(id = %remote.remote_id, "Created Azure DevOps test case");
        Ok(remote)
    }

    async fn update_test_case(&self, remote_id: &str, update: &TestCaseUpdate) -> Result<RemoteTestCase> {
        let current = if update.steps.is_some() != update.expected_results.is_some() {
            Some(self.get_test_case(remote_id).await?)
        } else {
            None
        };
        let request = self
            .http
            .request(Method::PATCH, &format!("_apis/wit/workitems/{}", remote_id))
            .query(&[("api-version", API_VERSION)])
            .header(reqwest::header::CONTENT_TYPE, JSON_PATCH)
            .body(update_patch(update, current.as_ref()).to_string());
        let updated = self.http.send(request, "Azure DevOps update work item").await?;
        tracing::info!(id = %remote_id, "Updated Azure DevOps test case");
        Ok(from_work_item(&updated))
    }

    async fn get_test_case(&self, remote_id: &str) -> Result<RemoteTestCase> {
        let request = self
            .http
            .request(Method::GET, &format!("_apis/wit/workitems/{}", remote_id))
            .query(&[("api-version", API_VERSION)]);
        let item = self.http.send(request, "Azure DevOps get work item").await?;
        Ok(from_work_item(&item))
    }

    async fn search_test_cases(&self, query: Option<&str>, project: Option<&str>) -> Result<Vec<RemoteTestCase>> {
        let request = self
            .http
            .request(Method::POST, "_apis/wit/wiql")
            .query(&[("api-version", API_VERSION)])
            .json(&json!({ "query": wiql_query(query, project) }));
        let results = self.http.send(request, "Azure DevOps WIQL query").await?;

        let ids: Vec<String> = results["workItems"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["id"].as_i64().map(|id| id.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        // WIQL only returns ids; details come one work item at a time.
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            found.push(self.get_test_case(&id).await?);
        }
        tracing::info!(count = found.len(), "Azure DevOps search finished");
        Ok(found)
    }

    async fn test_connection(&self) -> bool {
        self.http.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_patch_fields() {
        let mut case = TestCase {
            priority: Priority::Critical,
            steps: vec!["Enter dose < 5 mg".to_string(), "Confirm".to_string()],
            expected_results: "Dose accepted".to_string(),
            ..TestCase::new("TC-001", "Dose entry")
        };
        case.test_data.insert("dose".to_string(), "4 mg".to_string());

        let patch = create_patch(&case);
        let ops = patch.as_array().unwrap();
        assert!(ops.iter().all(|op| op["op"] == "add"));
        assert_eq!(ops[0]["path"], "/fields/System.Title");
        assert_eq!(ops[0]["value"], "Dose entry");
        assert_eq!(ops[2]["value"], 1);
        let steps = ops[3]["value"].as_str().unwrap();
        assert!(steps.starts_with("<steps id=\"0\" last=\"3\">"));
        assert!(steps.contains("Enter dose &lt; 5 mg"));
        assert_eq!(ops[4]["value"], "Test Data:\ndose: 4 mg");
    }

    #[test]
    fn test_steps_xml_parses_back() {
        let steps = vec!["Open chart".to_string(), "Record BP & pulse".to_string()];
        let xml = steps_xml(&steps, "Vitals saved");
        let (parsed, expected) = parse_steps_xml(&xml);
        assert_eq!(parsed, steps);
        assert_eq!(expected, "Vitals saved");

        let (defaults, _) = parse_steps_xml(&steps_xml(&[], ""));
        assert_eq!(defaults, vec!["Execute test", "Verify results"]);
    }

    #[test]
    fn test_update_patch_rewrites_steps_with_current_expected() {
        let current = RemoteTestCase {
            remote_id: "17".to_string(),
            title: "Old".to_string(),
            description: String::new(),
            priority: "Medium".to_string(),
            steps: vec!["Old step".to_string()],
            expected_results: "Kept result".to_string(),
            status: None,
            url: None,
        };
        let update = TestCaseUpdate {
            steps: Some(vec!["New step".to_string()]),
            ..TestCaseUpdate::default()
        };
        let patch = update_patch(&update, Some(&current));
        let ops = patch.as_array().unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0]["op"], "replace");
        let (steps, expected) = parse_steps_xml(ops[0]["value"].as_str().unwrap());
        assert_eq!(steps, vec!["New step"]);
        assert_eq!(expected, "Kept result");
    }

    #[test]
    fn test_from_work_item() {
        let item = json!({
            "id": 314,
            "url": "https://dev.azure.example/_apis/wit/workItems/314",
            "fields": {
                "System.Title": "Dose entry",
                "System.State": "Design",
                "Microsoft.VSTS.Common.Priority": 2,
                "Microsoft.VSTS.TCM.Steps": steps_xml(&["Enter dose".to_string()], "Accepted"),
            }
        });
        let remote = from_work_item(&item);
        assert_eq!(remote.remote_id, "314");
        assert_eq!(remote.priority, "High");
        assert_eq!(remote.steps, vec!["Enter dose"]);
        assert_eq!(remote.expected_results, "Accepted");
        assert_eq!(remote.status.as_deref(), Some("Design"));
    }

    #[test]
    fn test_test_plan_payload_paths() {
        let payload = test_plan_payload("Release 2.1", "Cardio", "Regression");
        assert_eq!(payload["name"], "Release 2.1");
        assert_eq!(payload["description"], "Regression");
        assert_eq!(payload["areaPath"], "Cardio\\Test");
        assert_eq!(payload["iteration"], "Cardio\\Iteration 1");
    }

    #[test]
    fn test_plan_test_cases_payload_prefers_numeric_ids() {
        let ids = vec!["314".to_string(), " 42 ".to_string(), "TC-7".to_string()];
        assert_eq!(
            plan_test_cases_payload(&ids),
            json!([{ "id": 314 }, { "id": 42 }, { "id": "TC-7" }])
        );
    }

    #[test]
    fn test_from_test_plan() {
        let plan = from_test_plan(&json!({
            "id": 12,
            "name": "Release 2.1",
            "url": "https://dev.azure.example/Cardio/_apis/testplan/plans/12"
        }));
        assert_eq!(plan.plan_id, "12");
        assert_eq!(plan.name, "Release 2.1");
        assert_eq!(plan.description, "");
        assert_eq!(plan.url.as_deref(), Some("https://dev.azure.example/Cardio/_apis/testplan/plans/12"));
    }

    #[tokio::test]
    async fn test_plan_operations_validate_before_sending() {
        let adapter = AzureDevOpsAdapter::new("https://dev.azure.example/org", "", "pat");
        let err = adapter.create_test_plan(" ", Some("Cardio"), "").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        let err = adapter.create_test_plan("Release", None, "").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        let err = adapter.add_test_cases_to_plan("12", &[], Some("Cardio")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_wiql_quotes_values() {
        let wiql = wiql_query(Some("patient's dose"), Some("Cardio"));
        assert!(wiql.contains("[System.WorkItemType] = 'Test Case'"));
        assert!(wiql.contains("[System.TeamProject] = 'Cardio'"));
        assert!(wiql.ends_with("CONTAINS 'patient''s dose'"));
    }
}
