use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub compliance_standards: Vec<String>,
    #[serde(default)]
    pub created_date: Option<String>,
}
