use crate::domain::error::{AppError, Result};
use crate::domain::integration::IntegrationLog;

use super::entities::IntegrationLogEntity;
use super::TestGenRepository;

impl TestGenRepository {
    pub async fn insert_integration_log(&self, log: &IntegrationLog) -> Result<()> {
        sqlx::query(
            "INSERT INTO integration_logs (integration_type, operation, target_id, status, details, timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&log.integration_type)
        .bind(&log.operation)
        .bind(&log.target_id)
        .bind(&log.status)
        .bind(&log.details)
        .bind(&log.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageFailure(format!("Failed to insert integration log: {}", e)))?;

        Ok(())
    }

    /// Newest first.
    pub async fn list_integration_logs(
        &self,
        integration_type: Option<&str>,
        limit: i64,
    ) -> Result<Vec<IntegrationLog>> {
        let entities = sqlx::query_as::<_, IntegrationLogEntity>(
            "SELECT integration_type, operation, target_id, status, details, timestamp
             FROM integration_logs
             WHERE (?1 IS NULL OR integration_type = ?1)
             ORDER BY id DESC LIMIT ?2",
        )
        .bind(integration_type)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageFailure(format!("Failed to list integration logs: {}", e)))?;

        Ok(entities.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_repository;
    use super::*;

    fn log(kind: &str, target: &str, status: &str) -> IntegrationLog {
        IntegrationLog {
            integration_type: kind.to_string(),
            operation: "create_test_case".to_string(),
            target_id: Some(target.to_string()),
            status: status.to_string(),
            details: None,
            timestamp: "2024-05-01T10:00:00+00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_logs_are_filtered_and_newest_first() {
        let (_dir, repo) = test_repository().await;
        repo.insert_integration_log(&log("jira", "TC-001", "success")).await.unwrap();
        repo.insert_integration_log(&log("polarion", "TC-001", "success")).await.unwrap();
        repo.insert_integration_log(&log("jira", "TC-002", "error")).await.unwrap();

        let jira = repo.list_integration_logs(Some("jira"), 10).await.unwrap();
        assert_eq!(jira.len(), 2);
        assert_eq!(jira[0].target_id.as_deref(), Some("TC-002"));
        assert_eq!(jira[0].status, "error");

        assert_eq!(repo.list_integration_logs(None, 2).await.unwrap().len(), 2);
    }
}
