//! Core domain types shared by every feed engine crate.
//!
//! These mirror spec §3 (Data Model) exactly: `TypedUid`, `Activity`,
//! `ActivitySummary`, `DecoratedActivity`, `StoredActivity`, `Source`,
//! `Feed`, `TopicQueryGroup`, `Cursor`.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::errors::AppError;

/// A structured identifier of the form `type:segment1:segment2:...`.
///
/// Stable across processes, serializes to a single string, and never
/// contains `/`. The first segment is the dispatch key used by the
/// process-wide [`crate::registry::TypeRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypedUid {
    raw: String,
    type_len: usize,
}

impl TypedUid {
    pub fn parse(raw: impl Into<String>) -> Result<Self, AppError> {
        let raw = raw.into();
        if raw.contains('/') {
            return Err(AppError::InvalidFormat {
                message: format!("typed uid '{raw}' must not contain '/'"),
            });
        }
        let type_len = raw.find(':').ok_or_else(|| AppError::InvalidFormat {
            message: format!("typed uid '{raw}' is missing a ':' separated type segment"),
        })?;
        if type_len == 0 {
            return Err(AppError::InvalidFormat {
                message: format!("typed uid '{raw}' has an empty type segment"),
            });
        }
        Ok(Self { raw, type_len })
    }

    /// The dispatch-key segment before the first `:`.
    pub fn source_type(&self) -> &str {
        &self.raw[..self.type_len]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for TypedUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for TypedUid {
    type Error = AppError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        TypedUid::parse(value)
    }
}

impl From<TypedUid> for String {
    fn from(value: TypedUid) -> Self {
        value.raw
    }
}

/// Engagement counters. `-1` means "unknown" per spec §3.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Engagement {
    pub upvotes: i64,
    pub downvotes: i64,
    pub comments: i64,
    pub amplification: i64,
}

/// Opaque item from a provider. See spec §3.
///
/// Invariant: `uid.source_type() == sourceUIDs[i].source_type()` for all
/// `i` — an activity belongs only to sources of its own type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub uid: TypedUid,
    pub source_uids: Vec<TypedUid>,
    pub title: String,
    pub body: String,
    pub url: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub engagement: Engagement,
    /// `-1.0` means unknown; otherwise in `[0, 1]`.
    pub social_score: f32,
    pub raw_json: serde_json::Value,
}

impl Activity {
    /// Validates the uid/sourceUIDs type-sharing invariant from spec §3.
    pub fn validate_type_invariant(&self) -> Result<(), AppError> {
        let expected = self.uid.source_type();
        for source_uid in &self.source_uids {
            if source_uid.source_type() != expected {
                return Err(AppError::Validation {
                    message: format!(
                        "activity {} has source uid {} of a different type",
                        self.uid, source_uid
                    ),
                    field: Some("source_uids".into()),
                });
            }
        }
        Ok(())
    }

    /// Merges `other`'s sourceUIDs into `self` as a set-union, preserving
    /// the existing-then-new ordering required by spec §4.1's `Upsert`.
    pub fn merge_source_uids(&mut self, other: &[TypedUid]) {
        let seen: BTreeSet<TypedUid> = self.source_uids.iter().cloned().collect();
        for uid in other {
            if !seen.contains(uid) {
                self.source_uids.push(uid.clone());
            }
        }
    }
}

/// `{ shortSummary, fullSummary }` — see spec §3, §4.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySummary {
    /// Plain text, <=20 words.
    pub short_summary: String,
    /// Markdown, <=~200 words, sections `### Context` / `### Key Points` /
    /// `### Why it matters`.
    pub full_summary: String,
}

/// `{ activity, summary, embedding, similarity }` — see spec §3.
///
/// `similarity` is populated only by a search query; it is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoratedActivity {
    pub activity: Activity,
    pub summary: ActivitySummary,
    pub embedding: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

/// The embedding dimension a process is configured to produce, per spec
/// §4.4 ("a single process-wide vector dimension is chosen at startup").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingDimension {
    D1536,
    D3072,
}

impl EmbeddingDimension {
    pub fn as_usize(self) -> usize {
        match self {
            EmbeddingDimension::D1536 => 1536,
            EmbeddingDimension::D3072 => 3072,
        }
    }

    pub fn from_len(len: usize) -> Result<Self, AppError> {
        match len {
            1536 => Ok(EmbeddingDimension::D1536),
            3072 => Ok(EmbeddingDimension::D3072),
            other => Err(AppError::Internal {
                message: format!("unsupported embedding dimension {other}"),
            }),
        }
    }
}

/// Persistence projection of an activity — see spec §3.
///
/// Invariants enforced by `feedengine-store`, not by this struct alone:
/// exactly one of `embedding_1536`/`embedding_3072` is non-null, or both
/// are null for not-yet-embedded rows; `source_type` equals the type of
/// every `source_uids` element; `update_count` only increases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredActivity {
    pub activity: Activity,
    pub summary: Option<ActivitySummary>,
    pub source_type: String,
    pub embedding_1536: Option<Vec<f32>>,
    pub embedding_3072: Option<Vec<f32>>,
    pub update_count: i64,
}

impl StoredActivity {
    pub fn is_complete(&self) -> bool {
        self.summary.is_some() && (self.embedding_1536.is_some() || self.embedding_3072.is_some())
    }
}

/// A configurable provider subscription. See spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub uid: TypedUid,
    pub name: String,
    pub description: String,
    pub url: String,
    pub icon_url: Option<String>,
    pub topics: BTreeSet<String>,
    pub raw_json: serde_json::Value,
}

/// A user's curated collection of sources plus a semantic query. See spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: uuid::Uuid,
    pub name: String,
    pub icon: Option<String>,
    pub query: String,
    pub source_uids: Vec<TypedUid>,
    pub user_id: String,
    pub public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feed {
    /// Spec §4.8 step 1: either `userID == current user` or `public`.
    /// Authorization failures collapse into `NotFound` at the call site
    /// (see [`crate::errors::Classification::NotFound`]) to avoid leaking
    /// existence of feeds the caller cannot read.
    pub fn readable_by(&self, user_id: &str) -> bool {
        self.public || self.user_id == user_id
    }

    pub fn mutable_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// Produced per feed-planner request, not persisted. See spec §3, §4.8.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicQueryGroup {
    pub name: String,
    pub emoji: String,
    /// 1..3 queries.
    pub queries: Vec<String>,
    pub activity_ids: Vec<TypedUid>,
    pub summary: String,
}

/// `{ timestamp, id }`, base64-of-JSON. Stable total order by
/// `(createdAt desc, uid desc)`. See spec §3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub timestamp: DateTime<Utc>,
    pub id: String,
}

#[derive(Serialize, Deserialize)]
struct CursorWire {
    timestamp: DateTime<Utc>,
    id: String,
}

impl Cursor {
    pub fn encode(&self) -> String {
        let wire = CursorWire { timestamp: self.timestamp, id: self.id.clone() };
        let json = serde_json::to_vec(&wire).expect("cursor serialization is infallible");
        base64::engine::general_purpose::STANDARD.encode(json)
    }

    pub fn decode(encoded: &str) -> Result<Self, AppError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| AppError::InvalidFormat { message: format!("bad cursor base64: {e}") })?;
        let wire: CursorWire = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::InvalidFormat { message: format!("bad cursor json: {e}") })?;
        Ok(Cursor { timestamp: wire.timestamp, id: wire.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_uid_rejects_missing_type_segment() {
        assert!(TypedUid::parse("no-colon-here").is_err());
    }

    #[test]
    fn typed_uid_rejects_slash() {
        assert!(TypedUid::parse("hackernews:top/extra").is_err());
    }

    #[test]
    fn typed_uid_source_type_is_prefix() {
        let uid = TypedUid::parse("redditsubreddit:rust:hot:day").unwrap();
        assert_eq!(uid.source_type(), "redditsubreddit");
    }

    #[test]
    fn merge_source_uids_is_union_preserving_order() {
        let mut a = sample_activity("a:1", &["reddit:x", "reddit:y"]);
        a.merge_source_uids(&[
            TypedUid::parse("reddit:y").unwrap(),
            TypedUid::parse("reddit:z").unwrap(),
        ]);
        let got: Vec<&str> = a.source_uids.iter().map(|u| u.as_str()).collect();
        assert_eq!(got, vec!["reddit:x", "reddit:y", "reddit:z"]);
    }

    #[test]
    fn cursor_round_trips_through_base64() {
        let cursor = Cursor { timestamp: Utc::now(), id: "hackernews:123".into() };
        let encoded = cursor.encode();
        let decoded = Cursor::decode(&encoded).unwrap();
        assert_eq!(cursor, decoded);
    }

    #[test]
    fn feed_readable_by_owner_or_public() {
        let feed = sample_feed("alice", false);
        assert!(feed.readable_by("alice"));
        assert!(!feed.readable_by("bob"));

        let public_feed = sample_feed("alice", true);
        assert!(public_feed.readable_by("bob"));
    }

    fn sample_activity(uid: &str, source_uids: &[&str]) -> Activity {
        Activity {
            uid: TypedUid::parse(uid).unwrap(),
            source_uids: source_uids.iter().map(|s| TypedUid::parse(*s).unwrap()).collect(),
            title: "t".into(),
            body: "b".into(),
            url: "https://example.com".into(),
            image_url: None,
            created_at: Utc::now(),
            engagement: Engagement::default(),
            social_score: -1.0,
            raw_json: serde_json::json!({}),
        }
    }

    fn sample_feed(user_id: &str, public: bool) -> Feed {
        Feed {
            id: uuid::Uuid::new_v4(),
            name: "n".into(),
            icon: None,
            query: "rust".into(),
            source_uids: vec![],
            user_id: user_id.into(),
            public,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
