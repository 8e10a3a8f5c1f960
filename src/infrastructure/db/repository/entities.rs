use crate::domain::compliance::{ComplianceCheckResult, Evidence};
use crate::domain::error::AppError;
use crate::domain::integration::IntegrationLog;
use crate::domain::project::Project;
use crate::domain::requirement::RequirementDocument;
use crate::domain::test_case::TestCase;

#[derive(sqlx::FromRow)]
pub(super) struct TestCaseEntity {
    pub(super) id: String,
    pub(super) record_json: String,
    pub(super) created_date: String,
    pub(super) last_modified: String,
}

impl TryFrom<TestCaseEntity> for TestCase {
    type Error = AppError;

    fn try_from(entity: TestCaseEntity) -> Result<Self, Self::Error> {
        let mut case: TestCase = serde_json::from_str(&entity.record_json).map_err(|e| {
            AppError::StorageFailure(format!("Corrupt test case record {}: {}", entity.id, e))
        })?;
        case.id = entity.id;
        case.created_date = Some(entity.created_date);
        case.last_modified = Some(entity.last_modified);
        Ok(case)
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct RequirementEntity {
    id: String,
    title: String,
    description: Option<String>,
    content: String,
    source_file: Option<String>,
    file_format: Option<String>,
    project_name: Option<String>,
    content_hash: Option<String>,
    extracted_date: String,
}

impl From<RequirementEntity> for RequirementDocument {
    fn from(entity: RequirementEntity) -> Self {
        Self {
            id: entity.id,
            title: entity.title,
            description: entity.description,
            content: entity.content,
            source_file: entity.source_file,
            file_format: entity.file_format,
            project_name: entity.project_name,
            content_hash: entity.content_hash,
            extracted_date: entity.extracted_date,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct ProjectEntity {
    name: String,
    description: String,
    compliance_standards_json: String,
    created_date: String,
}

impl From<ProjectEntity> for Project {
    fn from(entity: ProjectEntity) -> Self {
        Self {
            name: entity.name,
            description: entity.description,
            compliance_standards: serde_json::from_str(&entity.compliance_standards_json)
                .unwrap_or_default(),
            created_date: Some(entity.created_date),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct ComplianceRunEntity {
    pub(super) id: String,
    pub(super) project_name: Option<String>,
    pub(super) overall_score: f64,
    pub(super) total_checks: i64,
    pub(super) passed_checks: i64,
    pub(super) test_cases_count: i64,
    pub(super) created_at: String,
}

#[derive(sqlx::FromRow)]
pub(super) struct ComplianceResultEntity {
    pub(super) standard: String,
    requirement_id: String,
    requirement: String,
    description: String,
    passed: bool,
    evidence_json: String,
    issue: Option<String>,
    recommendation: Option<String>,
}

impl From<ComplianceResultEntity> for ComplianceCheckResult {
    fn from(entity: ComplianceResultEntity) -> Self {
        let evidence: Vec<Evidence> = serde_json::from_str(&entity.evidence_json).unwrap_or_default();
        Self {
            requirement_id: entity.requirement_id,
            requirement: entity.requirement,
            description: entity.description,
            passed: entity.passed,
            evidence,
            issue: entity.issue,
            recommendation: entity.recommendation,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct IntegrationLogEntity {
    integration_type: String,
    operation: String,
    target_id: Option<String>,
    status: String,
    details: Option<String>,
    timestamp: String,
}

impl From<IntegrationLogEntity> for IntegrationLog {
    fn from(entity: IntegrationLogEntity) -> Self {
        Self {
            integration_type: entity.integration_type,
            operation: entity.operation,
            target_id: entity.target_id,
            status: entity.status,
            details: entity.details,
            timestamp: entity.timestamp,
        }
    }
}
