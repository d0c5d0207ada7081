//! Feed Query Planner binary: a thin process exposing `Activities` over
//! stdin/stdout-free wiring — this binary's job is to prove the planner
//! boots against real configuration and a real database; an HTTP/gRPC
//! front door is out of this workspace's scope (spec §6.1).

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use feedengine_common::config::AppConfig;
use feedengine_common::types::{Activity, Source as DomainSource};
use feedengine_llm::completion::MockCompletionModel;
use feedengine_llm::embedder::Embedder;
use feedengine_llm::embedding::MockEmbeddingModel;
use feedengine_llm::summarizer::Summarizer;
use feedengine_planner::{ActivitiesRequest, FeedPlanner};
use feedengine_processor::ActivityProcessor;
use feedengine_rewrite::QueryRewriter;
use feedengine_scheduler::Scheduler;
use feedengine_store::db::DbPool;
use feedengine_store::{ActivityStore, FeedStore, Period, SortMode, SourceStore};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

fn default_activity_constructor(raw: &serde_json::Value) -> feedengine_common::errors::Result<Activity> {
    serde_json::from_value(raw.clone()).map_err(feedengine_common::errors::AppError::from)
}

fn default_source_constructor(
    raw: &serde_json::Value,
) -> feedengine_common::errors::Result<DomainSource> {
    serde_json::from_value(raw.clone()).map_err(feedengine_common::errors::AppError::from)
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

    tracing::info!(version = feedengine_common::VERSION, "starting feed query planner");

    feedengine_common::metrics::install_exporter(config.observability.metrics_port)?;
    feedengine_common::metrics::register_metrics();

    feedengine_common::registry::register_activity_type("mocksource", default_activity_constructor);
    feedengine_common::registry::register_source_type("mocksource", default_source_constructor);

    let db = Arc::new(DbPool::new(&config.database).await?);
    db.ping().await?;

    let feed_store = Arc::new(FeedStore::new(Arc::clone(&db)));
    let source_store = Arc::new(SourceStore::new(Arc::clone(&db)));
    let activity_store = Arc::new(ActivityStore::new(Arc::clone(&db)));

    let rewriter = Arc::new(QueryRewriter::new(MockCompletionModel));
    let embedder = Arc::new(Embedder::new(MockEmbeddingModel::new(config.embedding.dimension)));
    let summarizer = Arc::new(Summarizer::new(MockCompletionModel));
    let topic_summaries = Arc::new(feedengine_common::cache::TopicSummaryCache::new(config.topic_summary_ttl()));

    // A scheduler is wired in (not started) purely so `FeedPlanner::update`/
    // `remove` can garbage-collect orphaned source subscriptions (spec
    // §6.7); this binary never polls.
    let processor = Arc::new(ActivityProcessor::new(
        Arc::new(Summarizer::new(MockCompletionModel)),
        Arc::new(Embedder::new(MockEmbeddingModel::new(config.embedding.dimension))),
        Arc::clone(&activity_store),
    ));
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&activity_store),
        Arc::clone(&source_store),
        processor,
        config.scheduler.max_activity_processor_concurrency,
        config.poll_interval(),
    ));

    let planner = FeedPlanner::new(
        feed_store,
        source_store,
        activity_store,
        rewriter,
        embedder,
        summarizer,
        topic_summaries,
        scheduler,
        config.planner.clone(),
    );

    tracing::info!("planner ready, reading feed UUIDs from stdin (one per line)");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let feed_id: Uuid = match trimmed.parse() {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(input = trimmed, error = %err, "skipping invalid feed id");
                continue;
            }
        };

        let result = planner
            .activities(ActivitiesRequest {
                feed_id,
                user_id: String::new(),
                sort_by: SortMode::Date,
                limit: 20,
                query_override: String::new(),
                period: Period::Week,
                rewrite_query: false,
            })
            .await;

        match result {
            Ok(activities) => {
                writeln!(stdout, "{} activities, {} topics", activities.activities.len(), activities.topics.len())?;
            }
            Err(err) => {
                tracing::warn!(feed_id = %feed_id, error = %err, "Activities failed");
            }
        }
    }

    Ok(())
}
