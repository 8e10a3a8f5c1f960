use crate::domain::error::{AppError, Result};
use crate::domain::project::Project;

use super::entities::ProjectEntity;
use super::{now_rfc3339, TestGenRepository};

impl TestGenRepository {
    /// Creates or updates a project. The original creation date is kept.
    pub async fn save_project(&self, project: &Project) -> Result<Project> {
        let name = project.name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Project name is required".to_string()));
        }

        let standards_json = serde_json::to_string(&project.compliance_standards)
            .map_err(|e| AppError::Internal(format!("Failed to serialize standards: {}", e)))?;
        let created_date = project.created_date.clone().unwrap_or_else(now_rfc3339);

        sqlx::query(
            "INSERT INTO projects (name, description, compliance_standards_json, created_date)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET
                description = excluded.description,
                compliance_standards_json = excluded.compliance_standards_json",
        )
        .bind(name)
        .bind(&project.description)
        .bind(&standards_json)
        .bind(&created_date)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageFailure(format!("Failed to save project: {}", e)))?;

        self.get_project(name).await
    }

    pub async fn get_project(&self, name: &str) -> Result<Project> {
        let entity = sqlx::query_as::<_, ProjectEntity>(
            "SELECT name, description, compliance_standards_json, created_date FROM projects WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::StorageFailure(format!("Failed to fetch project: {}", e)))?;

        entity
            .map(Into::into)
            .ok_or_else(|| AppError::NotFound(format!("Project not found: {}", name)))
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let entities = sqlx::query_as::<_, ProjectEntity>(
            "SELECT name, description, compliance_standards_json, created_date FROM projects ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageFailure(format!("Failed to list projects: {}", e)))?;

        Ok(entities.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_repository;
    use super::*;

    #[tokio::test]
    async fn test_project_upsert_keeps_created_date() {
        let (_dir, repo) = test_repository().await;
        let first = repo
            .save_project(&Project {
                name: "Cardio Monitor".to_string(),
                description: "Bedside monitor".to_string(),
                compliance_standards: vec!["FDA".to_string()],
                created_date: None,
            })
            .await
            .unwrap();

        let second = repo
            .save_project(&Project {
                name: "Cardio Monitor".to_string(),
                description: "Bedside and telemetry monitor".to_string(),
                compliance_standards: vec!["FDA".to_string(), "IEC 62304".to_string()],
                created_date: Some("2000-01-01T00:00:00+00:00".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(second.created_date, first.created_date);
        assert_eq!(second.compliance_standards.len(), 2);
        assert_eq!(repo.list_projects().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_project_name_is_rejected() {
        let (_dir, repo) = test_repository().await;
        let err = repo
            .save_project(&Project {
                name: "  ".to_string(),
                description: String::new(),
                compliance_standards: Vec::new(),
                created_date: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
