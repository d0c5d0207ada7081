//! Source Scheduler binary: wires configuration, the database, the LLM
//! stack, and the bounded processor pool, then runs until a shutdown
//! signal arrives.

use std::sync::Arc;

use feedengine_common::config::AppConfig;
use feedengine_common::types::{Activity, Source as DomainSource, TypedUid};
use feedengine_llm::completion::MockCompletionModel;
use feedengine_llm::embedder::Embedder;
use feedengine_llm::embedding::MockEmbeddingModel;
use feedengine_llm::summarizer::Summarizer;
use feedengine_processor::ActivityProcessor;
use feedengine_providers::mock_source::MockSource;
use feedengine_scheduler::Scheduler;
use feedengine_store::{db::DbPool, ActivityStore, SourceStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;

fn mock_source_factory(
    source: &DomainSource,
) -> feedengine_common::errors::Result<Box<dyn feedengine_providers::source::Source>> {
    Ok(Box::new(MockSource::new(source.uid.clone(), source.name.clone(), 5)))
}

/// Registers the hydration constructor matching `MockSource`'s emitted
/// activity shape, which is a plain serialized `Activity`.
fn default_activity_constructor(raw: &serde_json::Value) -> feedengine_common::errors::Result<Activity> {
    serde_json::from_value(raw.clone()).map_err(feedengine_common::errors::AppError::from)
}

fn default_source_constructor(
    raw: &serde_json::Value,
) -> feedengine_common::errors::Result<DomainSource> {
    serde_json::from_value(raw.clone()).map_err(feedengine_common::errors::AppError::from)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::load().expect("failed to load configuration");

    let builder = tracing_subscriber::fmt().with_env_filter(EnvFilter::new(&config.observability.log_level));
    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }

    tracing::info!(version = feedengine_common::VERSION, "starting source scheduler");

    feedengine_common::metrics::install_exporter(config.observability.metrics_port)?;
    feedengine_common::metrics::register_metrics();

    feedengine_common::registry::register_activity_type("mocksource", default_activity_constructor);
    feedengine_common::registry::register_source_type("mocksource", default_source_constructor);

    let db = Arc::new(DbPool::new(&config.database).await?);
    db.ping().await?;

    let activity_store = Arc::new(ActivityStore::new(Arc::clone(&db)));
    let source_store = Arc::new(SourceStore::new(Arc::clone(&db)));

    let summarizer = Arc::new(Summarizer::new(MockCompletionModel));
    let embedder = Arc::new(Embedder::new(MockEmbeddingModel::new(config.embedding.dimension)));
    let processor =
        Arc::new(ActivityProcessor::new(summarizer, embedder, Arc::clone(&activity_store)));

    let scheduler = Arc::new(Scheduler::new(
        activity_store,
        source_store.clone(),
        processor,
        config.scheduler.max_activity_processor_concurrency,
        config.poll_interval(),
    ));
    scheduler.register_factory("mocksource", mock_source_factory);

    // Ensure at least one subscription exists so the scheduler has
    // something to poll on a fresh database.
    let default_uid = TypedUid::parse("mocksource:default").expect("static uid is well-formed");
    source_store
        .add(&DomainSource {
            uid: default_uid,
            name: "Default Fixture Source".into(),
            description: "deterministic fixture source".into(),
            url: "https://example.com/mock".into(),
            icon_url: None,
            topics: Default::default(),
            raw_json: serde_json::json!({}),
        })
        .await?;

    scheduler.start().await?;

    tracing::info!("scheduler running, awaiting shutdown signal");
    shutdown_signal().await;

    tracing::info!("draining in-flight work");
    scheduler.shutdown().await;
    tracing::info!("shutdown complete");
    Ok(())
}
