pub mod compliance;
pub mod error;
pub mod id_sequence;
pub mod integration;
pub mod llm_config;
pub mod project;
pub mod requirement;
pub mod test_case;
