//! C7 Source Scheduler: source lifecycle, per-source polling loops, and
//! the bounded activity-processor pool (spec §4.7, §5).
//!
//! Two pools per the concurrency model: one long-lived task per
//! subscribed source (unbounded in count), and a single bounded worker
//! pool for all summarize+embed+upsert work, submitted to non-blockingly
//! from each poller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use feedengine_common::errors::Result;
use feedengine_common::types::{Activity, Source as DomainSource, TypedUid};
use feedengine_llm::completion::CompletionModel;
use feedengine_llm::embedding::EmbeddingModel;
use feedengine_processor::{ActivityProcessor, CreateOptions};
use feedengine_providers::source::Source as ProviderSource;
use feedengine_store::{ActivityStore, Period, SearchRequest, SortMode, SourceStore};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Builds the concrete streaming adapter for a persisted [`DomainSource`],
/// dispatched by `uid.source_type()`. Distinct from
/// `feedengine_common::registry` (which reconstructs inert data), this
/// registry builds the behavioral `Source` trait object — concrete
/// provider adapters (Mastodon, HackerNews, ...) are out of this
/// workspace's scope (spec §6.1), so only test/fixture factories ship here.
pub type SourceFactory = fn(&DomainSource) -> Result<Box<dyn ProviderSource>>;

pub struct Scheduler<C: CompletionModel, E: EmbeddingModel> {
    activity_store: Arc<ActivityStore>,
    source_store: Arc<SourceStore>,
    processor: Arc<ActivityProcessor<C, E>>,
    processor_semaphore: Arc<Semaphore>,
    factories: StdMutex<HashMap<String, SourceFactory>>,
    pollers: StdMutex<HashMap<String, CancellationToken>>,
    poller_tasks: StdMutex<JoinSet<()>>,
    processor_tasks: StdMutex<JoinSet<()>>,
    poll_interval: Duration,
}

impl<C: CompletionModel + 'static, E: EmbeddingModel + 'static> Scheduler<C, E> {
    pub fn new(
        activity_store: Arc<ActivityStore>,
        source_store: Arc<SourceStore>,
        processor: Arc<ActivityProcessor<C, E>>,
        max_processor_concurrency: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            activity_store,
            source_store,
            processor,
            processor_semaphore: Arc::new(Semaphore::new(max_processor_concurrency)),
            factories: StdMutex::new(HashMap::new()),
            pollers: StdMutex::new(HashMap::new()),
            poller_tasks: StdMutex::new(JoinSet::new()),
            processor_tasks: StdMutex::new(JoinSet::new()),
            poll_interval,
        }
    }

    pub fn register_factory(&self, source_type: &str, factory: SourceFactory) {
        self.factories.lock().expect("factories lock poisoned").insert(source_type.to_string(), factory);
    }

    /// Startup lifecycle (spec §4.7): list persisted sources, initialize
    /// each, and register a poller. A single source's failure to
    /// initialize is logged and skipped; the rest still start.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let sources = self.source_store.list().await?;
        for source in sources {
            let uid = source.uid.clone();
            if let Err(err) = self.spawn_poller(source, false).await {
                warn!(uid = %uid, error = %err, "failed to initialize persisted source, skipping");
            }
        }
        Ok(())
    }

    /// `Add(Source)`: idempotent by UID (spec §4.7).
    pub async fn add(self: &Arc<Self>, source: DomainSource) -> Result<()> {
        if self.pollers.lock().expect("pollers lock poisoned").contains_key(source.uid.as_str()) {
            return Ok(());
        }
        self.spawn_poller(source, true).await
    }

    /// `Remove(uid)`: cancels the poller and deletes from the Source Store.
    /// Associated activities are intentionally retained.
    pub async fn remove(&self, uid: &TypedUid) -> Result<()> {
        if let Some(cancel) = self.pollers.lock().expect("pollers lock poisoned").remove(uid.as_str()) {
            cancel.cancel();
        }
        self.source_store.remove(uid).await?;
        Ok(())
    }

    /// Cancels every per-source poller and every in-flight processor task,
    /// then drains both pools.
    pub async fn shutdown(&self) {
        let cancels: Vec<CancellationToken> =
            self.pollers.lock().expect("pollers lock poisoned").drain().map(|(_, c)| c).collect();
        for cancel in cancels {
            cancel.cancel();
        }

        let mut poller_tasks = std::mem::take(&mut *self.poller_tasks.lock().expect("poller tasks lock poisoned"));
        while poller_tasks.join_next().await.is_some() {}

        let mut processor_tasks =
            std::mem::take(&mut *self.processor_tasks.lock().expect("processor tasks lock poisoned"));
        while processor_tasks.join_next().await.is_some() {}
    }

    async fn spawn_poller(self: &Arc<Self>, source: DomainSource, persist: bool) -> Result<()> {
        let factory = {
            let factories = self.factories.lock().expect("factories lock poisoned");
            *factories.get(source.uid.source_type()).ok_or_else(|| {
                feedengine_common::errors::AppError::Internal {
                    message: format!("no source factory registered for type '{}'", source.uid.source_type()),
                }
            })?
        };

        let mut provider = factory(&source)?;
        provider.validate()?;
        provider.initialize(&source.raw_json).await?;
        let provider: Arc<dyn ProviderSource> = Arc::from(provider);

        if persist {
            self.source_store.add(&source).await?;
        }

        let uid = source.uid.clone();
        let cancel = CancellationToken::new();
        self.pollers.lock().expect("pollers lock poisoned").insert(uid.as_str().to_string(), cancel.clone());

        let this = Arc::clone(self);
        let poller_uid = uid.clone();
        let poller_provider = provider.clone();
        let poller_cancel = cancel.clone();
        self.poller_tasks.lock().expect("poller tasks lock poisoned").spawn(async move {
            this.run_poller(poller_uid, poller_provider, poller_cancel).await;
        });

        info!(uid = %uid, "source registered and polling");
        Ok(())
    }

    async fn run_poller(self: Arc<Self>, uid: TypedUid, source: Arc<dyn ProviderSource>, cancel: CancellationToken) {
        loop {
            self.poll_once(&uid, &source, &cancel).await;
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            if cancel.is_cancelled() {
                return;
            }
        }
    }

    async fn poll_once(&self, uid: &TypedUid, source: &Arc<dyn ProviderSource>, cancel: &CancellationToken) {
        let since = match self.checkpoint(uid).await {
            Ok(activity) => activity,
            Err(err) => {
                warn!(uid = %uid, error = %err, "failed to recompute checkpoint, polling from scratch");
                None
            }
        };

        let (activity_tx, mut activity_rx) = mpsc::channel::<Activity>(256);
        let (error_tx, mut error_rx) = mpsc::channel(256);

        let stream_source = source.clone();
        let stream_cancel = cancel.clone();
        let stream_task = tokio::spawn(async move {
            stream_source.stream(since.as_ref(), activity_tx, error_tx, stream_cancel).await;
        });

        let mut activities_done = false;
        let mut errors_done = false;
        loop {
            if activities_done && errors_done {
                break;
            }
            tokio::select! {
                maybe = activity_rx.recv(), if !activities_done => {
                    match maybe {
                        Some(activity) => self.dispatch(activity),
                        None => activities_done = true,
                    }
                }
                maybe = error_rx.recv(), if !errors_done => {
                    match maybe {
                        Some(err) => warn!(uid = %uid, error = %err, "source reported an error"),
                        None => errors_done = true,
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        let _ = stream_task.await;
    }

    async fn checkpoint(&self, uid: &TypedUid) -> Result<Option<Activity>> {
        let req = SearchRequest {
            source_uids: Some(vec![uid.clone()]),
            sort_by: SortMode::Date,
            period: Period::All,
            limit: 1,
            ..Default::default()
        };
        let result = self.activity_store.search(&req).await?;
        Ok(result.activities.into_iter().next().map(|d| d.activity))
    }

    /// Non-blocking submit into the bounded processor pool (spec §4.7).
    fn dispatch(&self, activity: Activity) {
        let processor = Arc::clone(&self.processor);
        let semaphore = Arc::clone(&self.processor_semaphore);
        let uid = activity.uid.clone();
        self.processor_tasks.lock().expect("processor tasks lock poisoned").spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            if let Err(err) = processor.create(activity, CreateOptions::default()).await {
                warn!(uid = %uid, error = %err, "activity processing failed");
            }
        });
    }
}
