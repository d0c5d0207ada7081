//! C8 Feed Query Planner: feed lookup and authorization, rewrite vs.
//! diversity dispatch, fan-out search, deduplication, topic assembly, and
//! topic-summary caching (spec §4.8).
//!
//! The planner's "list active sources" step (spec §4.8 step 3) reads the
//! Source Store directly rather than through the Scheduler: the scheduler's
//! source registry exists to drive polling, not to answer read queries, and
//! going through C2 keeps this crate free of a generic `Scheduler<C, E>`
//! type parameter pair it has no other use for.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use uuid::Uuid;

use chrono::Utc;

use feedengine_common::cache::TopicSummaryCache;
use feedengine_common::config::PlannerConfig;
use feedengine_common::errors::{AppError, Result};
use feedengine_common::types::{Activity, DecoratedActivity, Feed, TopicQueryGroup, TypedUid};
use feedengine_llm::{CompletionModel, EmbeddingModel};
use feedengine_llm::embedder::Embedder;
use feedengine_llm::summarizer::Summarizer;
use feedengine_providers::topic_labels::topic_label_for;
use feedengine_rewrite::{QueryRewriter, SourceRef};
use feedengine_scheduler::Scheduler;
use feedengine_store::{ActivityStore, FeedStore, Period, SearchRequest, SortMode, SourceStore};

pub struct ActivitiesRequest {
    pub feed_id: Uuid,
    pub user_id: String,
    pub sort_by: SortMode,
    pub limit: usize,
    pub query_override: String,
    pub period: Period,
    pub rewrite_query: bool,
}

#[derive(Debug, Clone)]
pub struct ActivitiesResult {
    pub activities: Vec<DecoratedActivity>,
    pub topics: Vec<TopicQueryGroup>,
}

pub struct FeedPlanner<C: CompletionModel, E: EmbeddingModel> {
    feed_store: Arc<FeedStore>,
    source_store: Arc<SourceStore>,
    activity_store: Arc<ActivityStore>,
    rewriter: Arc<QueryRewriter<C>>,
    embedder: Arc<Embedder<E>>,
    summarizer: Arc<Summarizer<C>>,
    topic_summaries: Arc<TopicSummaryCache>,
    scheduler: Arc<Scheduler<C, E>>,
    config: PlannerConfig,
}

/// `Create({name, icon, query, sourceUIDs, userID})` (spec §6.7).
pub struct FeedCreate {
    pub name: String,
    pub icon: Option<String>,
    pub query: String,
    pub source_uids: Vec<TypedUid>,
    pub user_id: String,
}

/// `Update({id, userID, name, icon, query, sourceUIDs})` (spec §6.7).
pub struct FeedUpdate {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub icon: Option<String>,
    pub query: String,
    pub source_uids: Vec<TypedUid>,
}

impl<C: CompletionModel + 'static, E: EmbeddingModel + 'static> FeedPlanner<C, E> {
    pub fn new(
        feed_store: Arc<FeedStore>,
        source_store: Arc<SourceStore>,
        activity_store: Arc<ActivityStore>,
        rewriter: Arc<QueryRewriter<C>>,
        embedder: Arc<Embedder<E>>,
        summarizer: Arc<Summarizer<C>>,
        topic_summaries: Arc<TopicSummaryCache>,
        scheduler: Arc<Scheduler<C, E>>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            feed_store,
            source_store,
            activity_store,
            rewriter,
            embedder,
            summarizer,
            topic_summaries,
            scheduler,
            config,
        }
    }

    /// `Create({name, icon, query, sourceUIDs, userID}) → Feed` (spec §6.7).
    pub async fn create(&self, req: FeedCreate) -> Result<Feed> {
        if req.user_id.is_empty() {
            return Err(AppError::Validation {
                message: "userID is required to create a feed".into(),
                field: Some("user_id".into()),
            });
        }
        let now = Utc::now();
        let feed = Feed {
            id: Uuid::new_v4(),
            name: req.name,
            icon: req.icon,
            query: req.query,
            source_uids: req.source_uids,
            user_id: req.user_id,
            public: false,
            created_at: now,
            updated_at: now,
        };
        self.feed_store.upsert(&feed).await?;
        Ok(feed)
    }

    /// `Update({id, userID, name, icon, query, sourceUIDs})` (spec §6.7): 404
    /// (collapsed to `NotFound`) if the feed isn't owned by `userID`. Any
    /// `sourceUID` dropped by the update is garbage-collected from the
    /// Source Scheduler if no surviving feed still references it.
    pub async fn update(&self, req: FeedUpdate) -> Result<Feed> {
        let existing = self.feed_store.get_by_id(req.id).await?;
        if !existing.mutable_by(&req.user_id) {
            return Err(AppError::not_found("feed", req.id.to_string()));
        }

        let removed = removed_source_uids(&existing.source_uids, &req.source_uids);

        let updated = Feed {
            id: existing.id,
            name: req.name,
            icon: req.icon,
            query: req.query,
            source_uids: req.source_uids,
            user_id: existing.user_id,
            public: existing.public,
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };
        self.feed_store.upsert(&updated).await?;
        self.gc_sources(&removed).await?;
        Ok(updated)
    }

    /// `Remove(id, userID)` (spec §6.7): same authorization as `Update`,
    /// then garbage-collects every source UID no surviving feed references.
    pub async fn remove(&self, id: Uuid, user_id: &str) -> Result<()> {
        let existing = self.feed_store.get_by_id(id).await?;
        if !existing.mutable_by(user_id) {
            return Err(AppError::not_found("feed", id.to_string()));
        }
        self.feed_store.remove(id).await?;
        self.gc_sources(&existing.source_uids).await?;
        Ok(())
    }

    /// `ListByUserID(userID)` (spec §6.7): feeds owned by `userID` or public.
    pub async fn list_by_user_id(&self, user_id: &str) -> Result<Vec<Feed>> {
        let feeds = self.feed_store.list().await?;
        Ok(feeds.into_iter().filter(|f| f.readable_by(user_id)).collect())
    }

    /// For each candidate UID, unregisters it from the Source Scheduler if
    /// no remaining feed still subscribes to it (spec §6.7).
    async fn gc_sources(&self, candidates: &[TypedUid]) -> Result<()> {
        for uid in candidates {
            let referencing = self.feed_store.find_by_source_uids(std::slice::from_ref(uid)).await?;
            if referencing.is_empty() {
                self.scheduler.remove(uid).await?;
            }
        }
        Ok(())
    }

    /// `Activities(feedID, userID, sortBy, limit, queryOverride, period, rewriteQuery)`
    /// (spec §4.8). Authorization failures and missing feeds both surface as
    /// `NotFound` so existence is never leaked to an unauthorized caller.
    pub async fn activities(&self, req: ActivitiesRequest) -> Result<ActivitiesResult> {
        let feed = self.feed_store.get_by_id(req.feed_id).await?;
        if !feed.readable_by(&req.user_id) {
            return Err(feedengine_common::errors::AppError::not_found("feed", req.feed_id.to_string()));
        }

        let effective_query = if req.user_id.is_empty() || req.query_override.is_empty() {
            feed.query.clone()
        } else {
            req.query_override.clone()
        };

        let use_rewrite = req.rewrite_query && !effective_query.is_empty() && self.config.allow_query_rewrite;
        if use_rewrite {
            self.rewrite_path(&feed, &effective_query, req.sort_by, req.limit, req.period).await
        } else {
            self.diversity_path(&feed, &effective_query, req.sort_by, req.limit, req.period).await
        }
    }

    async fn rewrite_path(
        &self,
        feed: &Feed,
        query: &str,
        sort_by: SortMode,
        limit: usize,
        period: Period,
    ) -> Result<ActivitiesResult> {
        let sources = self.source_store.list().await?;
        let refs: Vec<SourceRef> = sources
            .iter()
            .filter(|s| feed.source_uids.contains(&s.uid))
            .map(|s| SourceRef { source_type: s.uid.source_type().to_string(), name: s.name.clone() })
            .collect();

        let mut topics = self.rewriter.rewrite_to_topics(query, &refs).await?;
        let num_topics = topics.len().max(1);
        // Floors to 1 per spec §9; no shortfall top-up from topics with
        // more matches (left unspecified by spec, decided against here to
        // keep each topic's result count predictable).
        let limit_per_topic = (limit / num_topics).max(1);

        // Flattened in topic order, then query order within a topic, so
        // `join_all`'s order-preserving output lets "first occurrence"
        // dedup below be deterministic regardless of completion timing.
        let pairs: Vec<(usize, String)> = topics
            .iter()
            .enumerate()
            .flat_map(|(idx, t)| t.queries.iter().cloned().map(move |q| (idx, q)))
            .collect();

        let searches = pairs.into_iter().map(|(idx, query_text)| {
            let embedder = Arc::clone(&self.embedder);
            let activity_store = Arc::clone(&self.activity_store);
            let source_uids = feed.source_uids.clone();
            let min_similarity = self.config.min_similarity;
            async move {
                let embedding = embedder.embed_activity_query(&query_text).await?;
                let search_req = SearchRequest {
                    source_uids: Some(source_uids),
                    query_embedding: Some(embedding),
                    min_similarity: Some(min_similarity),
                    sort_by,
                    period,
                    limit: limit_per_topic,
                    ..Default::default()
                };
                activity_store.search(&search_req).await.map(|r| (idx, r.activities))
            }
        });

        let mut seen: HashSet<TypedUid> = HashSet::new();
        let mut flat: Vec<DecoratedActivity> = Vec::new();
        for outcome in join_all(searches).await {
            let (idx, found) = outcome?;
            for decorated in found {
                if seen.insert(decorated.activity.uid.clone()) {
                    topics[idx].activity_ids.push(decorated.activity.uid.clone());
                    flat.push(decorated);
                }
            }
        }

        flat.sort_by(|a, b| {
            b.similarity.unwrap_or(0.0).partial_cmp(&a.similarity.unwrap_or(0.0)).unwrap_or(Ordering::Equal)
        });

        if self.config.summarize_topics {
            self.summarize_topics(&mut topics, &flat, period).await?;
        }

        Ok(ActivitiesResult { activities: flat, topics })
    }

    async fn summarize_topics(
        &self,
        topics: &mut [TopicQueryGroup],
        flat: &[DecoratedActivity],
        period: Period,
    ) -> Result<()> {
        let by_uid: HashMap<&TypedUid, &Activity> =
            flat.iter().map(|d| (&d.activity.uid, &d.activity)).collect();

        let loads = topics.iter().map(|topic| {
            let key = TopicSummaryCache::key(period.as_str(), &topic.name);
            let cache = Arc::clone(&self.topic_summaries);
            let summarizer = Arc::clone(&self.summarizer);
            let topic_name = topic.name.clone();
            let activities: Vec<Activity> =
                topic.activity_ids.iter().filter_map(|uid| by_uid.get(uid).map(|a| (*a).clone())).collect();
            async move { cache.get_or_load(&key, || async move { summarizer.summarize_topic(&topic_name, &activities).await }).await }
        });

        let summaries = join_all(loads).await;
        for (topic, summary) in topics.iter_mut().zip(summaries) {
            topic.summary = summary?;
        }
        Ok(())
    }

    async fn diversity_path(
        &self,
        feed: &Feed,
        query: &str,
        sort_by: SortMode,
        limit: usize,
        period: Period,
    ) -> Result<ActivitiesResult> {
        let query_embedding =
            if query.is_empty() { None } else { Some(self.embedder.embed_activity_query(query).await?) };

        let concurrency = self.config.diversity_fanout_concurrency.max(1);
        let min_similarity = self.config.min_similarity;

        let raw_buckets: Vec<Result<Vec<DecoratedActivity>>> = stream::iter(feed.source_uids.clone())
            .map(|uid| {
                let activity_store = Arc::clone(&self.activity_store);
                let query_embedding = query_embedding.clone();
                async move {
                    let search_req = SearchRequest {
                        source_uids: Some(vec![uid]),
                        sort_by: SortMode::SocialScore,
                        period,
                        query_embedding,
                        min_similarity: Some(min_similarity),
                        limit,
                        ..Default::default()
                    };
                    activity_store.search(&search_req).await.map(|r| r.activities)
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut seen: HashSet<TypedUid> = HashSet::new();
        let mut buckets: Vec<Vec<DecoratedActivity>> = Vec::with_capacity(raw_buckets.len());
        for bucket in raw_buckets {
            let bucket = bucket?;
            let filtered: Vec<DecoratedActivity> =
                bucket.into_iter().filter(|d| seen.insert(d.activity.uid.clone())).collect();
            buckets.push(filtered);
        }

        let mut activities = round_robin(buckets, limit);

        match sort_by {
            SortMode::SocialScore => activities
                .sort_by(|a, b| b.activity.social_score.partial_cmp(&a.activity.social_score).unwrap_or(Ordering::Equal)),
            _ => activities.sort_by(|a, b| b.activity.created_at.cmp(&a.activity.created_at)),
        }

        let topics = bucket_by_provider(&activities);
        Ok(ActivitiesResult { activities, topics })
    }
}

/// Repeated round-robin distribution across per-source buckets (spec §4.8,
/// §9): each full pass takes `min(remaining/numSources, len(bucket),
/// remaining)` from every bucket, stopping once a pass makes no progress.
/// This can under-deliver against `limit` when bucket sizes are skewed; spec
/// §9 leaves backfilling from over-populated buckets unspecified, and this
/// implementation does not attempt it.
fn round_robin(mut buckets: Vec<Vec<DecoratedActivity>>, limit: usize) -> Vec<DecoratedActivity> {
    let num_sources = buckets.len().max(1);
    let mut remaining = limit;
    let mut result = Vec::new();

    loop {
        if remaining == 0 {
            break;
        }
        let mut progressed = false;
        for bucket in buckets.iter_mut() {
            if remaining == 0 {
                break;
            }
            let take = (remaining / num_sources).min(bucket.len()).min(remaining);
            if take == 0 {
                continue;
            }
            result.extend(bucket.drain(..take));
            remaining -= take;
            progressed = true;
        }
        if !progressed {
            break;
        }
    }
    result
}

/// Buckets activities by their source's provider type into topics keyed by
/// the §6.8 emoji/label table, in order of first appearance.
fn bucket_by_provider(activities: &[DecoratedActivity]) -> Vec<TopicQueryGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, TopicQueryGroup> = HashMap::new();

    for decorated in activities {
        let (emoji, label) = topic_label_for(decorated.activity.uid.source_type());
        let group = groups.entry(label.to_string()).or_insert_with(|| {
            order.push(label.to_string());
            TopicQueryGroup {
                name: label.to_string(),
                emoji: emoji.to_string(),
                queries: Vec::new(),
                activity_ids: Vec::new(),
                summary: String::new(),
            }
        });
        group.activity_ids.push(decorated.activity.uid.clone());
    }

    order.into_iter().map(|label| groups.remove(&label).expect("label inserted in the same pass")).collect()
}

/// `old \ new` (spec §6.7 `Update`): source UIDs present before an update
/// that are absent afterward, candidates for scheduler GC.
fn removed_source_uids(old: &[TypedUid], new: &[TypedUid]) -> Vec<TypedUid> {
    old.iter().filter(|uid| !new.contains(uid)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedengine_common::types::{ActivitySummary, Engagement};

    fn sample(uid: &str, source_type_uid: &str, social_score: f32) -> DecoratedActivity {
        DecoratedActivity {
            activity: Activity {
                uid: TypedUid::parse(uid).unwrap(),
                source_uids: vec![TypedUid::parse(source_type_uid).unwrap()],
                title: "t".into(),
                body: "b".into(),
                url: "https://example.com".into(),
                image_url: None,
                created_at: chrono::Utc::now(),
                engagement: Engagement::default(),
                social_score,
                raw_json: serde_json::json!({}),
            },
            summary: ActivitySummary { short_summary: String::new(), full_summary: String::new() },
            embedding: vec![],
            similarity: None,
        }
    }

    #[test]
    fn round_robin_draws_from_every_bucket_before_giving_up() {
        let buckets = vec![
            vec![sample("hackernews:1", "hackernews:top", 0.9), sample("hackernews:2", "hackernews:top", 0.5)],
            vec![sample("reddit:1", "reddit:rust", 0.8), sample("reddit:2", "reddit:rust", 0.4)],
        ];
        // Per-pass integer division (`remaining / numSources`, recomputed
        // after each bucket's draw within the same pass) can under-deliver
        // even when buckets are balanced; this is the algorithm as
        // specified, not a rounding bug to paper over.
        let result = round_robin(buckets, 4);
        assert!(!result.is_empty() && result.len() <= 4);
        let hn_count = result.iter().filter(|d| d.activity.uid.source_type() == "hackernews").count();
        let reddit_count = result.iter().filter(|d| d.activity.uid.source_type() == "reddit").count();
        assert!(hn_count > 0 && reddit_count > 0);
    }

    #[test]
    fn round_robin_under_delivers_when_one_bucket_is_starved() {
        let buckets = vec![
            vec![sample("hackernews:1", "hackernews:top", 0.9)],
            vec![
                sample("reddit:1", "reddit:rust", 0.8),
                sample("reddit:2", "reddit:rust", 0.7),
                sample("reddit:3", "reddit:rust", 0.6),
            ],
        ];
        // remaining/numSources == 1 each pass; bucket 0 is exhausted after
        // one item, so the second pass contributes nothing from it.
        let result = round_robin(buckets, 6);
        assert!(result.len() < 6);
    }

    #[test]
    fn round_robin_stops_when_all_buckets_are_empty() {
        let result = round_robin(vec![vec![], vec![]], 10);
        assert!(result.is_empty());
    }

    #[test]
    fn bucket_by_provider_groups_by_label_in_first_occurrence_order() {
        let activities = vec![
            sample("hackernews:1", "hackernews:top", 0.9),
            sample("reddit:1", "reddit:rust", 0.8),
            sample("hackernews:2", "hackernews:top", 0.5),
        ];
        let topics = bucket_by_provider(&activities);
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].name, "HackerNews");
        assert_eq!(topics[0].activity_ids.len(), 2);
        assert_eq!(topics[1].name, "Reddit");
        assert_eq!(topics[1].activity_ids.len(), 1);
    }

    #[test]
    fn removed_source_uids_is_old_minus_new() {
        let old = vec![TypedUid::parse("hackernews:top").unwrap(), TypedUid::parse("reddit:rust").unwrap()];
        let new = vec![TypedUid::parse("hackernews:top").unwrap()];
        let removed = removed_source_uids(&old, &new);
        assert_eq!(removed, vec![TypedUid::parse("reddit:rust").unwrap()]);
    }

    #[test]
    fn removed_source_uids_is_empty_when_nothing_dropped() {
        let old = vec![TypedUid::parse("hackernews:top").unwrap()];
        let new = vec![TypedUid::parse("hackernews:top").unwrap(), TypedUid::parse("reddit:rust").unwrap()];
        assert!(removed_source_uids(&old, &new).is_empty());
    }
}
