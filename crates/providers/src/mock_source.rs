//! Two reference adapters for interface-conformance testing (spec §6.1,
//! "out of core, listed for interface clarity" — not production
//! connectors). `MockSource` is fully synthetic; `FeedSource` stands in
//! for a real HackerNews/Reddit-style adapter by streaming from a fixed
//! in-memory fixture list.

use crate::source::Source;
use async_trait::async_trait;
use feedengine_common::errors::{AppError, Result};
use feedengine_common::types::{Activity, Engagement, TypedUid};
use std::collections::BTreeSet;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

/// Deterministic source that streams a small, fixed number of synthetic
/// activities, useful for exercising the scheduler/processor pipeline
/// without network access.
pub struct MockSource {
    uid: TypedUid,
    name: String,
    description: String,
    url: String,
    topics: BTreeSet<String>,
    item_count: usize,
}

impl MockSource {
    pub fn new(uid: TypedUid, name: impl Into<String>, item_count: usize) -> Self {
        Self {
            uid,
            name: name.into(),
            description: "deterministic fixture source".into(),
            url: "https://example.com/mock".into(),
            topics: BTreeSet::new(),
            item_count,
        }
    }
}

#[async_trait]
impl Source for MockSource {
    fn uid(&self) -> &TypedUid {
        &self.uid
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn url(&self) -> &str {
        &self.url
    }
    fn icon_url(&self) -> Option<&str> {
        None
    }
    fn topics(&self) -> &BTreeSet<String> {
        &self.topics
    }

    fn validate(&self) -> Result<()> {
        if self.item_count == 0 {
            return Err(AppError::Validation {
                message: "mock source item_count must be > 0".into(),
                field: Some("item_count".into()),
            });
        }
        Ok(())
    }

    async fn initialize(&mut self, _provider_config: &serde_json::Value) -> Result<()> {
        Ok(())
    }

    async fn stream(
        &self,
        since: Option<&Activity>,
        activities: Sender<Activity>,
        _errors: Sender<AppError>,
        cancel: CancellationToken,
    ) {
        let source_type = self.uid.source_type().to_string();
        let since_index = since
            .and_then(|a| a.uid.as_str().rsplit(':').next())
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);

        for i in (since_index + 1)..=(since_index + self.item_count) {
            if cancel.is_cancelled() {
                return;
            }
            let uid = match TypedUid::parse(format!("{source_type}:{i}")) {
                Ok(uid) => uid,
                Err(_) => continue,
            };
            let activity = Activity {
                uid,
                source_uids: vec![self.uid.clone()],
                title: format!("Mock item {i}"),
                body: format!("Synthetic body for fixture item {i}."),
                url: format!("https://example.com/mock/{i}"),
                image_url: None,
                created_at: chrono::Utc::now(),
                engagement: Engagement::default(),
                social_score: -1.0,
                raw_json: serde_json::json!({ "index": i }),
            };
            if activities.send(activity).await.is_err() {
                return;
            }
        }
    }
}

/// In-memory fixture-backed source, standing in for a real
/// HackerNews/Reddit-style adapter (spec §6.1-6.3: the shim itself is out
/// of scope, only the interface is re-specified here).
pub struct FeedSource {
    uid: TypedUid,
    name: String,
    url: String,
    topics: BTreeSet<String>,
    fixture: Vec<Activity>,
}

impl FeedSource {
    pub fn new(uid: TypedUid, name: impl Into<String>, fixture: Vec<Activity>) -> Self {
        Self { uid, name: name.into(), url: "https://example.com/feed".into(), topics: BTreeSet::new(), fixture }
    }
}

#[async_trait]
impl Source for FeedSource {
    fn uid(&self) -> &TypedUid {
        &self.uid
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "in-memory fixture feed"
    }
    fn url(&self) -> &str {
        &self.url
    }
    fn icon_url(&self) -> Option<&str> {
        None
    }
    fn topics(&self) -> &BTreeSet<String> {
        &self.topics
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    async fn initialize(&mut self, _provider_config: &serde_json::Value) -> Result<()> {
        Ok(())
    }

    async fn stream(
        &self,
        since: Option<&Activity>,
        activities: Sender<Activity>,
        _errors: Sender<AppError>,
        cancel: CancellationToken,
    ) {
        let since_at = since.map(|a| a.created_at);
        for activity in &self.fixture {
            if cancel.is_cancelled() {
                return;
            }
            if let Some(cutoff) = since_at {
                if activity.created_at <= cutoff {
                    continue;
                }
            }
            if activities.send(activity.clone()).await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_source_streams_item_count_activities() {
        let source = MockSource::new(TypedUid::parse("mocksource:fixture").unwrap(), "Fixture", 5);
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let (err_tx, _err_rx) = tokio::sync::mpsc::channel(16);
        let cancel = CancellationToken::new();

        source.stream(None, tx, err_tx, cancel).await;

        let mut received = Vec::new();
        while let Ok(activity) = rx.try_recv() {
            received.push(activity);
        }
        assert_eq!(received.len(), 5);
    }

    #[tokio::test]
    async fn mock_source_honors_cancellation() {
        let source = MockSource::new(TypedUid::parse("mocksource:fixture").unwrap(), "Fixture", 1000);
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);
        let (err_tx, _err_rx) = tokio::sync::mpsc::channel(16);
        let cancel = CancellationToken::new();
        cancel.cancel();

        source.stream(None, tx, err_tx, cancel).await;
        assert!(rx.try_recv().is_err());
    }
}
