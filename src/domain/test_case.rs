use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Case-insensitive lookup. Anything unrecognised maps to `Medium`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Priority::Low,
            "high" => Priority::High,
            "critical" => Priority::Critical,
            _ => Priority::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(label) => Priority::from_label(&label),
            _ => Priority::Medium,
        })
    }
}

/// Compliance note attached to a test case at generation time.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ComplianceCheck {
    #[serde(default, deserialize_with = "lenient_string")]
    pub standard: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub requirement: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub passed: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_string"
    )]
    pub issue: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_string"
    )]
    pub recommendation: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TestCase {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, deserialize_with = "lenient_steps")]
    pub steps: Vec<String>,
    #[serde(
        default,
        alias = "expected_result",
        deserialize_with = "lenient_string"
    )]
    pub expected_results: String,
    #[serde(default, deserialize_with = "lenient_test_data")]
    pub test_data: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient_checks")]
    pub compliance_checks: Vec<ComplianceCheck>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_string"
    )]
    pub created_date: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_string"
    )]
    pub last_modified: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_string"
    )]
    pub source_file: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_string"
    )]
    pub project_name: Option<String>,
    #[serde(default = "default_status", deserialize_with = "lenient_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient_steps")]
    pub edge_cases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient_steps")]
    pub negative_tests: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient_steps")]
    pub performance_considerations: Vec<String>,
    /// Fields the model emitted that have no dedicated slot.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for TestCase {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            description: String::new(),
            priority: Priority::Medium,
            steps: Vec::new(),
            expected_results: String::new(),
            test_data: BTreeMap::new(),
            compliance_checks: Vec::new(),
            created_date: None,
            last_modified: None,
            source_file: None,
            project_name: None,
            status: default_status(),
            edge_cases: Vec::new(),
            negative_tests: Vec::new(),
            performance_considerations: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl TestCase {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Builds a record from an arbitrary JSON value. Non-object values are rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}

fn default_status() -> String {
    "draft".to_string()
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(scalar_to_string)
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_to_string(&value))
}

fn lenient_opt_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let text = scalar_to_string(&value);
    Ok((!text.trim().is_empty()).then_some(text))
}

/// Blank or missing status falls back to `draft`.
fn lenient_status<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let text = scalar_to_string(&value);
    if text.trim().is_empty() {
        Ok(default_status())
    } else {
        Ok(text)
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(flag) => flag,
        Value::String(text) => text.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

/// Accepts a list of steps or a single newline-separated block.
fn lenient_steps<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let steps = match value {
        Value::Array(items) => items
            .iter()
            .map(scalar_to_string)
            .filter(|step| !step.trim().is_empty())
            .collect(),
        Value::String(block) => block
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect(),
        _ => Vec::new(),
    };
    Ok(steps)
}

fn lenient_test_data<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let data = match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| (key, scalar_to_string(&value)))
            .collect(),
        _ => BTreeMap::new(),
    };
    Ok(data)
}

fn lenient_checks<'de, D>(deserializer: D) -> std::result::Result<Vec<ComplianceCheck>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let checks = match value {
        Value::Array(items) => items
            .into_iter()
            .filter(|item| item.is_object())
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    };
    Ok(checks)
}
