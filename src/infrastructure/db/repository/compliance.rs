use crate::domain::compliance::{ComplianceCheckResult, ComplianceRunResult, StoredComplianceRun};
use crate::domain::error::{AppError, Result};
use std::collections::BTreeMap;

use super::entities::{ComplianceResultEntity, ComplianceRunEntity};
use super::TestGenRepository;

impl TestGenRepository {
    /// Stores a run and one row per requirement result. Returns the run id.
    pub async fn save_compliance_run(
        &self,
        project_name: Option<&str>,
        result: &ComplianceRunResult,
    ) -> Result<String> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::StorageFailure(format!("Failed to start transaction: {}", e)))?;

        sqlx::query(
            "INSERT INTO compliance_runs (id, project_name, overall_score, total_checks, passed_checks, test_cases_count, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&run_id)
        .bind(project_name)
        .bind(result.overall_score)
        .bind(result.total_checks as i64)
        .bind(result.passed_checks as i64)
        .bind(result.test_cases_count as i64)
        .bind(&result.timestamp)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::StorageFailure(format!("Failed to save compliance run: {}", e)))?;

        for (standard, checks) in &result.standards {
            for (position, check) in checks.iter().enumerate() {
                let evidence_json = serde_json::to_string(&check.evidence)
                    .map_err(|e| AppError::Internal(format!("Failed to serialize evidence: {}", e)))?;
                sqlx::query(
                    "INSERT INTO compliance_results (id, run_id, standard, position, requirement_id, requirement, description, passed, evidence_json, issue, recommendation)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(format!("{}:{}", run_id, check.requirement_id))
                .bind(&run_id)
                .bind(standard)
                .bind(position as i64)
                .bind(&check.requirement_id)
                .bind(&check.requirement)
                .bind(&check.description)
                .bind(check.passed)
                .bind(&evidence_json)
                .bind(&check.issue)
                .bind(&check.recommendation)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::StorageFailure(format!("Failed to save compliance result: {}", e))
                })?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::StorageFailure(format!("Failed to commit compliance run: {}", e)))?;

        tracing::debug!(run_id = %run_id, score = result.overall_score, "Stored compliance run");
        Ok(run_id)
    }

    pub async fn get_compliance_run(&self, run_id: &str) -> Result<StoredComplianceRun> {
        let run = sqlx::query_as::<_, ComplianceRunEntity>(
            "SELECT id, project_name, overall_score, total_checks, passed_checks, test_cases_count, created_at
             FROM compliance_runs WHERE id = ?",
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::StorageFailure(format!("Failed to fetch compliance run: {}", e)))?
        .ok_or_else(|| AppError::NotFound(format!("Compliance run not found: {}", run_id)))?;

        let rows = sqlx::query_as::<_, ComplianceResultEntity>(
            "SELECT standard, requirement_id, requirement, description, passed, evidence_json, issue, recommendation
             FROM compliance_results WHERE run_id = ? ORDER BY standard, position",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageFailure(format!("Failed to fetch compliance results: {}", e)))?;

        let mut standards: BTreeMap<String, Vec<ComplianceCheckResult>> = BTreeMap::new();
        for row in rows {
            let standard = row.standard.clone();
            standards.entry(standard).or_default().push(row.into());
        }

        Ok(StoredComplianceRun {
            id: run.id,
            project_name: run.project_name,
            result: ComplianceRunResult {
                overall_score: run.overall_score,
                standards,
                total_checks: run.total_checks as usize,
                passed_checks: run.passed_checks as usize,
                test_cases_count: run.test_cases_count as usize,
                timestamp: run.created_at,
            },
        })
    }
}
