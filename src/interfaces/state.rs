use crate::application::use_cases::extraction::TextExtractor;
use crate::application::use_cases::generator::TestCaseGenerator;
use crate::domain::error::Result;
use crate::domain::id_sequence::IdSequence;
use crate::domain::llm_config::LLMConfig;
use crate::domain::test_case::TestCase;
use crate::infrastructure::config::ConfigService;
use crate::infrastructure::db::TestGenRepository;
use crate::infrastructure::llm_clients::LLMClient;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

pub struct AppState {
    pub config_service: ConfigService,
    pub repository: TestGenRepository,
    pub llm_client: Arc<dyn LLMClient + Send + Sync>,
    pub generator: TestCaseGenerator,
    pub extractor: TextExtractor,
    /// Held from id allocation until the new records are stored. Never held across a model call.
    pub id_lock: AsyncMutex<()>,
}

impl AppState {
    pub fn new(
        config_service: ConfigService,
        repository: TestGenRepository,
        llm_client: Arc<dyn LLMClient + Send + Sync>,
    ) -> Self {
        let extractor = TextExtractor::new(config_service.config().file_processing.max_file_size_mb);
        Self {
            generator: TestCaseGenerator::new(llm_client.clone()),
            config_service,
            repository,
            llm_client,
            extractor,
            id_lock: AsyncMutex::new(()),
        }
    }

    /// Request override when given, configured provider otherwise.
    pub fn llm_config(&self, requested: Option<&LLMConfig>) -> LLMConfig {
        requested
            .cloned()
            .unwrap_or_else(|| self.config_service.llm_config())
    }

    /// Continues after the highest stored id with the same prefix.
    pub async fn id_sequence(&self, prefix: &str) -> Result<IdSequence> {
        let last = self.repository.max_sequence(prefix).await?;
        Ok(IdSequence::starting_at(prefix, last + 1))
    }

    /// Gives freshly generated cases their final ids and stores them under `id_lock`.
    pub async fn store_generated(&self, prefix: &str, mut cases: Vec<TestCase>) -> Result<Vec<TestCase>> {
        let _guard = self.id_lock.lock().await;
        let mut ids = self.id_sequence(prefix).await?;
        for case in cases.iter_mut() {
            case.id = ids.next_id();
        }
        self.repository.save_test_cases(&cases).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::generator::fakes::FakeLLMClient;
    use crate::infrastructure::db::repository::test_repository;

    #[tokio::test]
    async fn test_store_generated_renumbers_after_stored_ids() {
        let (_dir, repository) = test_repository().await;
        repository
            .save_test_case(&TestCase::new("TC-004", "Existing"))
            .await
            .unwrap();
        let config = ConfigService::load_from(None, None).unwrap();
        let state = AppState::new(config, repository, Arc::new(FakeLLMClient::replying("")));

        let scratch = vec![TestCase::new("TC-001", "First"), TestCase::new("TC-002", "Second")];
        let more = vec![TestCase::new("TC-001", "Third")];
        let (a, b) = tokio::join!(
            state.store_generated("TC", scratch),
            state.store_generated("TC", more)
        );

        let mut ids: Vec<String> = a.unwrap().into_iter().chain(b.unwrap()).map(|c| c.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["TC-005", "TC-006", "TC-007"]);
    }
}
