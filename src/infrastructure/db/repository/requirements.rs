use crate::domain::error::{AppError, Result};
use crate::domain::requirement::RequirementDocument;

use super::entities::RequirementEntity;
use super::TestGenRepository;

impl TestGenRepository {
    pub async fn save_requirement(&self, document: &RequirementDocument) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO requirements (id, title, description, content, source_file, file_format, project_name, content_hash, extracted_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&document.id)
        .bind(&document.title)
        .bind(&document.description)
        .bind(&document.content)
        .bind(&document.source_file)
        .bind(&document.file_format)
        .bind(&document.project_name)
        .bind(&document.content_hash)
        .bind(&document.extracted_date)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageFailure(format!("Failed to save requirement: {}", e)))?;

        Ok(())
    }

    pub async fn get_requirement(&self, id: &str) -> Result<RequirementDocument> {
        let entity = sqlx::query_as::<_, RequirementEntity>(
            "SELECT id, title, description, content, source_file, file_format, project_name, content_hash, extracted_date
             FROM requirements WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::StorageFailure(format!("Failed to fetch requirement: {}", e)))?;

        entity
            .map(Into::into)
            .ok_or_else(|| AppError::NotFound(format!("Requirement not found: {}", id)))
    }

    pub async fn list_requirements(&self, project: Option<&str>) -> Result<Vec<RequirementDocument>> {
        let entities = sqlx::query_as::<_, RequirementEntity>(
            "SELECT id, title, description, content, source_file, file_format, project_name, content_hash, extracted_date
             FROM requirements WHERE (?1 IS NULL OR project_name = ?1) ORDER BY extracted_date DESC",
        )
        .bind(project)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageFailure(format!("Failed to list requirements: {}", e)))?;

        Ok(entities.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_repository;
    use super::*;

    fn document(id: &str, project: Option<&str>) -> RequirementDocument {
        RequirementDocument {
            id: id.to_string(),
            title: "infusion_pump.pdf".to_string(),
            description: None,
            content: "The pump shall stop on occlusion.".to_string(),
            source_file: Some("/tmp/infusion_pump.pdf".to_string()),
            file_format: Some("pdf".to_string()),
            project_name: project.map(str::to_string),
            content_hash: Some("abc123".to_string()),
            extracted_date: "2024-05-01T10:00:00+00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_requirement_round_trip() {
        let (_dir, repo) = test_repository().await;
        repo.save_requirement(&document("REQ-1", Some("pump"))).await.unwrap();
        repo.save_requirement(&document("REQ-2", None)).await.unwrap();

        let loaded = repo.get_requirement("REQ-1").await.unwrap();
        assert_eq!(loaded.content, "The pump shall stop on occlusion.");
        assert_eq!(loaded.file_format.as_deref(), Some("pdf"));

        assert_eq!(repo.list_requirements(Some("pump")).await.unwrap().len(), 1);
        assert_eq!(repo.list_requirements(None).await.unwrap().len(), 2);
        assert!(matches!(
            repo.get_requirement("REQ-9").await,
            Err(AppError::NotFound(_))
        ));
    }
}
