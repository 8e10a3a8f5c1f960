use crate::domain::error::{AppError, Result};
use crate::domain::test_case::TestCase;

use super::entities::TestCaseEntity;
use super::{now_rfc3339, TestGenRepository};

const SELECT_TEST_CASE: &str =
    "SELECT id, record_json, created_date, last_modified FROM test_cases";

impl TestGenRepository {
    /// Insert-or-replace snapshot keyed by id. Missing timestamps are filled in.
    pub async fn save_test_case(&self, test_case: &TestCase) -> Result<TestCase> {
        if test_case.id.trim().is_empty() {
            return Err(AppError::InvalidInput("Test case id is required".to_string()));
        }

        let now = now_rfc3339();
        let mut stored = test_case.clone();
        if stored.created_date.is_none() {
            stored.created_date = Some(now.clone());
        }
        if stored.last_modified.is_none() {
            stored.last_modified = Some(now);
        }

        let record_json = serde_json::to_string(&stored)
            .map_err(|e| AppError::Internal(format!("Failed to serialize test case: {}", e)))?;

        sqlx::query(
            "INSERT OR REPLACE INTO test_cases (id, title, description, priority, status, source_file, project_name, record_json, created_date, last_modified)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&stored.id)
        .bind(&stored.title)
        .bind(&stored.description)
        .bind(stored.priority.as_str())
        .bind(&stored.status)
        .bind(&stored.source_file)
        .bind(&stored.project_name)
        .bind(&record_json)
        .bind(&stored.created_date)
        .bind(&stored.last_modified)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageFailure(format!("Failed to save test case {}: {}", stored.id, e)))?;

        Ok(stored)
    }

    pub async fn save_test_cases(&self, test_cases: &[TestCase]) -> Result<Vec<TestCase>> {
        let mut saved = Vec::with_capacity(test_cases.len());
        for test_case in test_cases {
            saved.push(self.save_test_case(test_case).await?);
        }
        Ok(saved)
    }

    pub async fn get_test_case(&self, id: &str) -> Result<TestCase> {
        let entity = sqlx::query_as::<_, TestCaseEntity>(&format!("{} WHERE id = ?", SELECT_TEST_CASE))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::StorageFailure(format!("Failed to fetch test case: {}", e)))?;

        match entity {
            Some(entity) => entity.try_into(),
            None => Err(AppError::NotFound(format!("Test case not found: {}", id))),
        }
    }

    pub async fn list_test_cases(&self, project: Option<&str>) -> Result<Vec<TestCase>> {
        let entities = match project {
            Some(project) => {
                sqlx::query_as::<_, TestCaseEntity>(&format!(
                    "{} WHERE project_name = ? ORDER BY id",
                    SELECT_TEST_CASE
                ))
                .bind(project)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, TestCaseEntity>(&format!("{} ORDER BY id", SELECT_TEST_CASE))
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| AppError::StorageFailure(format!("Failed to list test cases: {}", e)))?;

        entities.into_iter().map(TestCase::try_from).collect()
    }

    /// Case-insensitive substring match on title and description.
    pub async fn search_test_cases(&self, query: &str, project: Option<&str>) -> Result<Vec<TestCase>> {
        let pattern = format!("%{}%", escape_like(query.trim()));
        let entities = sqlx::query_as::<_, TestCaseEntity>(&format!(
            "{} WHERE (title LIKE ?1 ESCAPE '\\' OR description LIKE ?1 ESCAPE '\\')
               AND (?2 IS NULL OR project_name = ?2)
             ORDER BY id",
            SELECT_TEST_CASE
        ))
        .bind(&pattern)
        .bind(project)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageFailure(format!("Failed to search test cases: {}", e)))?;

        entities.into_iter().map(TestCase::try_from).collect()
    }

    pub async fn delete_test_case(&self, id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM test_cases WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageFailure(format!("Failed to delete test case: {}", e)))?;
        Ok(result.rows_affected())
    }

    /// Highest numeric suffix among stored ids of the form `{prefix}-{n}`.
    pub async fn max_sequence(&self, prefix: &str) -> Result<u32> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM test_cases WHERE id LIKE ? ESCAPE '\\'")
            .bind(format!("{}-%", escape_like(prefix)))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::StorageFailure(format!("Failed to read test case ids: {}", e)))?;

        Ok(ids
            .iter()
            .filter_map(|id| id.strip_prefix(prefix)?.strip_prefix('-')?.parse::<u32>().ok())
            .max()
            .unwrap_or(0))
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::super::test_repository;
    use super::*;
    use crate::domain::test_case::Priority;
    use serde_json::json;

    fn sample(id: &str, title: &str, project: Option<&str>) -> TestCase {
        TestCase {
            description: format!("Checks {}", title.to_lowercase()),
            priority: Priority::High,
            steps: vec!["Open the chart".to_string(), "Enter vitals".to_string()],
            project_name: project.map(str::to_string),
            ..TestCase::new(id, title)
        }
    }

    #[tokio::test]
    async fn test_save_and_get_keeps_the_record() {
        let (_dir, repo) = test_repository().await;
        let mut case = sample("TC-001", "Heart rate alarm", Some("cardio"));
        case.test_data.insert("bpm".to_string(), "180".to_string());
        case.extra.insert("traceability".to_string(), json!(["REQ-7"]));

        let saved = repo.save_test_case(&case).await.unwrap();
        assert!(saved.created_date.is_some());

        let loaded = repo.get_test_case("TC-001").await.unwrap();
        assert_eq!(loaded.title, "Heart rate alarm");
        assert_eq!(loaded.priority, Priority::High);
        assert_eq!(loaded.steps.len(), 2);
        assert_eq!(loaded.test_data["bpm"], "180");
        assert_eq!(loaded.extra["traceability"], json!(["REQ-7"]));
        assert_eq!(loaded.created_date, saved.created_date);
    }

    #[tokio::test]
    async fn test_save_replaces_by_id() {
        let (_dir, repo) = test_repository().await;
        repo.save_test_case(&sample("TC-001", "First", None)).await.unwrap();
        repo.save_test_case(&sample("TC-001", "Second", None)).await.unwrap();

        let all = repo.list_test_cases(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Second");
    }

    #[tokio::test]
    async fn test_missing_case_is_not_found() {
        let (_dir, repo) = test_repository().await;
        let err = repo.get_test_case("TC-404").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_and_search_filter_by_project() {
        let (_dir, repo) = test_repository().await;
        repo.save_test_cases(&[
            sample("TC-001", "Heart rate alarm", Some("cardio")),
            sample("TC-002", "Login lockout", Some("portal")),
            sample("TC-003", "Alarm silencing", Some("cardio")),
        ])
        .await
        .unwrap();

        assert_eq!(repo.list_test_cases(Some("cardio")).await.unwrap().len(), 2);
        assert_eq!(repo.list_test_cases(None).await.unwrap().len(), 3);

        let hits = repo.search_test_cases("ALARM", None).await.unwrap();
        assert_eq!(hits.len(), 2);
        let hits = repo.search_test_cases("lockout", Some("cardio")).await.unwrap();
        assert!(hits.is_empty());
        let hits = repo.search_test_cases("100%", None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_max_sequence_reads_numeric_suffixes() {
        let (_dir, repo) = test_repository().await;
        assert_eq!(repo.max_sequence("TC").await.unwrap(), 0);
        repo.save_test_cases(&[
            sample("TC-002", "A", None),
            sample("TC-010", "B", None),
            sample("SEC-050", "C", None),
            sample("TC-custom", "D", None),
        ])
        .await
        .unwrap();
        assert_eq!(repo.max_sequence("TC").await.unwrap(), 10);
        assert_eq!(repo.max_sequence("SEC").await.unwrap(), 50);
        assert_eq!(repo.delete_test_case("TC-010").await.unwrap(), 1);
        assert_eq!(repo.max_sequence("TC").await.unwrap(), 2);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }
}
