//! Configuration management.
//!
//! Layering mirrors the teacher's approach: defaults, then
//! `config/{env}.toml`, then `config/local.toml`, then `APP__`-prefixed
//! environment variables (e.g. `APP__SCHEDULER__POLL_INTERVAL_SECS=60`).

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub scheduler: SchedulerConfig,
    pub planner: PlannerConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// `1536` or `3072`; drives the process-wide dimension choice (§4.4).
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_processor_concurrency")]
    pub max_activity_processor_concurrency: usize,
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlannerConfig {
    #[serde(default = "default_allow_query_rewrite")]
    pub allow_query_rewrite: bool,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
    #[serde(default = "default_summarize_topics")]
    pub summarize_topics: bool,
    #[serde(default = "default_topic_summary_ttl")]
    pub topic_summary_ttl_secs: u64,
    #[serde(default = "default_diversity_fanout")]
    pub diversity_fanout_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_embedding_dimension() -> usize { 1536 }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 3 }
fn default_poll_interval() -> u64 { 2 * 60 * 60 }
fn default_max_processor_concurrency() -> usize { 50 }
fn default_provider_timeout() -> u64 { 5 }
fn default_allow_query_rewrite() -> bool { true }
fn default_min_similarity() -> f32 { 0.0 }
fn default_summarize_topics() -> bool { true }
fn default_topic_summary_ttl() -> u64 { 2 * 60 * 60 }
fn default_diversity_fanout() -> usize { 10 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "feedengine".to_string() }

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .set_default("database.url", "postgres://localhost/feedengine")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{env}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__").try_parsing(true))
            .build()?;

        config.try_deserialize()
    }

    pub fn embedding_dimension(&self) -> crate::types::EmbeddingDimension {
        crate::types::EmbeddingDimension::from_len(self.embedding.dimension)
            .unwrap_or(crate::types::EmbeddingDimension::D1536)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.database.connect_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.poll_interval_secs)
    }

    pub fn topic_summary_ttl(&self) -> Duration {
        Duration::from_secs(self.planner.topic_summary_ttl_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgres://localhost/feedengine".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
            },
            embedding: EmbeddingConfig {
                dimension: default_embedding_dimension(),
                model: default_embedding_model(),
                timeout_secs: default_embedding_timeout(),
                max_retries: default_embedding_retries(),
            },
            scheduler: SchedulerConfig {
                poll_interval_secs: default_poll_interval(),
                max_activity_processor_concurrency: default_max_processor_concurrency(),
                provider_timeout_secs: default_provider_timeout(),
            },
            planner: PlannerConfig {
                allow_query_rewrite: default_allow_query_rewrite(),
                min_similarity: default_min_similarity(),
                summarize_topics: default_summarize_topics(),
                topic_summary_ttl_secs: default_topic_summary_ttl(),
                diversity_fanout_concurrency: default_diversity_fanout(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                metrics_port: default_metrics_port(),
                service_name: default_service_name(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.scheduler.poll_interval_secs, 2 * 60 * 60);
        assert_eq!(config.planner.topic_summary_ttl_secs, 2 * 60 * 60);
        assert_eq!(config.embedding.dimension, 1536);
    }
}
