//! Source interface consumed by C7 (spec §6.1).

use async_trait::async_trait;
use feedengine_common::errors::Result;
use feedengine_common::types::{Activity, TypedUid};
use std::collections::BTreeSet;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait Source: Send + Sync {
    fn uid(&self) -> &TypedUid;
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn url(&self) -> &str;
    fn icon_url(&self) -> Option<&str>;
    fn topics(&self) -> &BTreeSet<String>;

    /// Provider-specific config sanity check, run before `initialize`.
    fn validate(&self) -> Result<()>;

    /// One-time setup (e.g. HTTP client construction) given the
    /// provider-specific raw config.
    async fn initialize(&mut self, provider_config: &serde_json::Value) -> Result<()>;

    /// Pushes zero or more activities and zero or more errors onto the
    /// given channels, then returns once exhausted or `cancel` fires. The
    /// caller (the scheduler) tolerates re-delivery of already-seen items;
    /// deduplication happens at the Activity Store.
    ///
    /// `since` is the newest previously-seen activity for this source, if
    /// any — an incremental-fetch hint, not a correctness requirement.
    async fn stream(
        &self,
        since: Option<&Activity>,
        activities: Sender<Activity>,
        errors: Sender<feedengine_common::errors::AppError>,
        cancel: CancellationToken,
    );
}
