use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackerKind {
    Jira,
    Polarion,
    AzureDevops,
}

impl TrackerKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "jira" => Some(TrackerKind::Jira),
            "polarion" => Some(TrackerKind::Polarion),
            "azure" | "azure_devops" | "azure-devops" => Some(TrackerKind::AzureDevops),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerKind::Jira => "jira",
            TrackerKind::Polarion => "polarion",
            TrackerKind::AzureDevops => "azure_devops",
        }
    }
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A test case as it exists inside an external tracker.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RemoteTestCase {
    pub remote_id: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub steps: Vec<String>,
    pub expected_results: String,
    pub status: Option<String>,
    pub url: Option<String>,
}

/// Partial update pushed to a tracker. Only populated fields are sent.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TestCaseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub steps: Option<Vec<String>>,
    pub expected_results: Option<String>,
}

/// Outcome of one manual or automated execution, posted back to a tracker.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TestExecutionResult {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub execution_date: Option<String>,
    #[serde(default)]
    pub tester: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TestPlan {
    pub plan_id: String,
    pub name: String,
    pub description: String,
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlanAssignment {
    pub plan_id: String,
    pub added: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ImportOutcome {
    pub test_case_id: String,
    pub remote_id: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ImportSummary {
    pub tracker: TrackerKind,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<ImportOutcome>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IntegrationLog {
    pub integration_type: String,
    pub operation: String,
    pub target_id: Option<String>,
    pub status: String,
    pub details: Option<String>,
    pub timestamp: String,
}
