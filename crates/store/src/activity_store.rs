//! C1 Activity Store: `Upsert` and `Search` over the `activities` table.
//!
//! Every operation here is hand-written SQL via `sea_orm::Statement`, the
//! same approach the teacher used for its pgvector retriever — sea-orm's
//! entity/query-builder layer does not model `<=>` distance operators or
//! JSONB containment cleanly, so raw SQL is the idiomatic escape hatch.
//!
//! Expected schema (documented here since this workspace has no migration
//! tooling):
//!
//! ```sql
//! CREATE TABLE activities (
//!     uid             TEXT PRIMARY KEY,
//!     source_uids     JSONB NOT NULL,
//!     title           TEXT NOT NULL,
//!     body            TEXT NOT NULL,
//!     url             TEXT NOT NULL,
//!     image_url       TEXT,
//!     created_at      TIMESTAMPTZ NOT NULL,
//!     upvotes         BIGINT NOT NULL,
//!     downvotes       BIGINT NOT NULL,
//!     comments        BIGINT NOT NULL,
//!     amplification   BIGINT NOT NULL,
//!     social_score    REAL NOT NULL,
//!     raw_json        JSONB NOT NULL,
//!     source_type     TEXT NOT NULL,
//!     short_summary   TEXT,
//!     full_summary    TEXT,
//!     embedding_1536  VECTOR(1536),
//!     embedding_3072  VECTOR(3072),
//!     update_count    BIGINT NOT NULL DEFAULT 0
//! );
//! CREATE INDEX activities_created_at_idx ON activities (created_at DESC);
//! CREATE INDEX activities_source_uids_gin_idx ON activities USING GIN (source_uids);
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ConnectionTrait, DbBackend, Statement, Value};

use feedengine_common::errors::{AppError, Result};
use feedengine_common::registry;
use feedengine_common::types::{
    Activity, ActivitySummary, Cursor, DecoratedActivity, EmbeddingDimension, StoredActivity, TypedUid,
};

use crate::db::DbPool;
use crate::search::{Period, ScoreWeights, SearchRequest, SearchResult, SortMode};

/// `socialScore'` fallback used when `social_score < 0` ("unknown"): a
/// fixed mid-range value, normalized against an assumed ceiling of 100
/// engagement points (`20 / 100`).
const SOCIAL_SCORE_FALLBACK: f64 = 0.2;

pub struct ActivityStore {
    db: Arc<DbPool>,
}

impl ActivityStore {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Registers the default hydration constructor — plain
    /// `serde_json::from_value::<Activity>` — for every known source type.
    /// Providers whose `rawJSON` diverges from the common `Activity` shape
    /// should register their own constructor instead, before this is called.
    pub fn register_default_constructors(source_types: &[&str]) {
        for source_type in source_types {
            registry::register_activity_type(source_type, default_activity_constructor);
        }
    }

    pub async fn upsert(&self, dec: &DecoratedActivity) -> Result<()> {
        let dimension = EmbeddingDimension::from_len(dec.embedding.len())?;
        let embedding_column = match dimension {
            EmbeddingDimension::D1536 => "embedding_1536",
            EmbeddingDimension::D3072 => "embedding_3072",
        };

        let source_type = dec
            .activity
            .source_uids
            .first()
            .ok_or_else(|| AppError::Validation {
                message: "activity has no source uids".into(),
                field: Some("source_uids".into()),
            })?
            .source_type()
            .to_string();

        let merged_source_uids =
            self.merge_with_existing(&dec.activity.uid, &dec.activity.source_uids).await?;
        let source_uids_json =
            serde_json::to_value(merged_source_uids.iter().map(|u| u.as_str()).collect::<Vec<_>>())?;
        let raw_json = serde_json::to_value(&dec.activity)?;
        let embedding_literal = vector_literal(&dec.embedding);

        let sql = format!(
            r#"
            INSERT INTO activities (
                uid, source_uids, title, body, url, image_url, created_at,
                upvotes, downvotes, comments, amplification, social_score,
                raw_json, source_type, short_summary, full_summary,
                {embedding_column}, update_count
            ) VALUES (
                $1, $2::jsonb, $3, $4, $5, $6, $7,
                $8, $9, $10, $11, $12,
                $13::jsonb, $14, $15, $16,
                '{embedding_literal}'::vector, 1
            )
            ON CONFLICT (uid) DO UPDATE SET
                source_uids = $2::jsonb,
                title = EXCLUDED.title,
                body = EXCLUDED.body,
                url = EXCLUDED.url,
                image_url = EXCLUDED.image_url,
                created_at = EXCLUDED.created_at,
                upvotes = EXCLUDED.upvotes,
                downvotes = EXCLUDED.downvotes,
                comments = EXCLUDED.comments,
                amplification = EXCLUDED.amplification,
                social_score = EXCLUDED.social_score,
                raw_json = EXCLUDED.raw_json,
                source_type = EXCLUDED.source_type,
                short_summary = EXCLUDED.short_summary,
                full_summary = EXCLUDED.full_summary,
                {embedding_column} = EXCLUDED.{embedding_column},
                update_count = activities.update_count + 1
            "#
        );

        self.db
            .conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                &sql,
                vec![
                    dec.activity.uid.as_str().into(),
                    source_uids_json.into(),
                    dec.activity.title.clone().into(),
                    dec.activity.body.clone().into(),
                    dec.activity.url.clone().into(),
                    dec.activity.image_url.clone().into(),
                    dec.activity.created_at.into(),
                    dec.activity.engagement.upvotes.into(),
                    dec.activity.engagement.downvotes.into(),
                    dec.activity.engagement.comments.into(),
                    dec.activity.engagement.amplification.into(),
                    dec.activity.social_score.into(),
                    raw_json.into(),
                    source_type.into(),
                    dec.summary.short_summary.clone().into(),
                    dec.summary.full_summary.clone().into(),
                ],
            ))
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn search(&self, req: &SearchRequest) -> Result<SearchResult> {
        if req.sort_by == SortMode::Similarity && req.query_embedding.is_none() {
            return Err(AppError::Internal {
                message: "sort_by=similarity requires a query embedding".into(),
            });
        }
        if req.cursor.is_some() && req.sort_by != SortMode::Date {
            return Err(AppError::Internal {
                message: "cursor pagination is only supported with sort_by=date".into(),
            });
        }

        let mut params: Vec<Value> = Vec::new();
        let mut conditions: Vec<String> = Vec::new();

        if let Some(uids) = &req.source_uids {
            if !uids.is_empty() {
                let mut ors = Vec::with_capacity(uids.len());
                for uid in uids {
                    let literal = serde_json::to_string(&[uid.as_str()])
                        .expect("single-element string array serialization is infallible");
                    ors.push(format!("source_uids @> '{literal}'::jsonb"));
                }
                conditions.push(format!("({})", ors.join(" OR ")));
            }
        }

        if let Some(uids) = &req.activity_uids {
            if !uids.is_empty() {
                let placeholders: Vec<String> =
                    uids.iter().map(|u| bind(&mut params, u.as_str().into())).collect();
                conditions.push(format!("uid IN ({})", placeholders.join(", ")));
            }
        }

        if let Some(duration) = req.period.threshold() {
            let threshold = Utc::now() - duration;
            let placeholder = bind(&mut params, threshold.into());
            conditions.push(format!("created_at >= {placeholder}"));
        }

        let similarity_expr = match &req.query_embedding {
            Some(embedding) => {
                let dimension = EmbeddingDimension::from_len(embedding.len())?;
                let column = match dimension {
                    EmbeddingDimension::D1536 => "embedding_1536",
                    EmbeddingDimension::D3072 => "embedding_3072",
                };
                // A NULL embedding in the requested dimension must exclude the
                // row outright (spec §4.1), not fall back to a similarity of 0
                // and let it compete in a similarity-sorted result.
                conditions.push(format!("{column} IS NOT NULL"));
                let literal = vector_literal(embedding);
                format!("1 - ({column} <=> '{literal}'::vector)")
            }
            None => "0".to_string(),
        };

        let where_clause =
            if conditions.is_empty() { "TRUE".to_string() } else { conditions.join(" AND ") };

        let mut outer_conditions = Vec::new();
        if let (Some(min_similarity), Some(_)) = (req.min_similarity, &req.query_embedding) {
            let placeholder = bind(&mut params, (min_similarity as f64).into());
            outer_conditions.push(format!("sub.similarity > {placeholder}"));
        }
        if let Some(cursor) = &req.cursor {
            let ts_placeholder = bind(&mut params, cursor.timestamp.into());
            let id_placeholder = bind(&mut params, cursor.id.clone().into());
            outer_conditions.push(format!(
                "(sub.created_at < {ts_placeholder} OR (sub.created_at = {ts_placeholder} AND sub.uid < {id_placeholder}))"
            ));
        }
        let outer_where =
            if outer_conditions.is_empty() { "TRUE".to_string() } else { outer_conditions.join(" AND ") };

        let weights = req.weights.normalized();
        let order_clause = match req.sort_by {
            SortMode::Similarity => "sub.similarity DESC, sub.uid DESC".to_string(),
            SortMode::Date => "sub.created_at DESC, sub.uid DESC".to_string(),
            SortMode::SocialScore => "sub.social_score DESC, sub.uid DESC".to_string(),
            SortMode::WeightedScore => format!(
                "({w_sim} * sub.similarity + {w_social} * (CASE WHEN sub.social_score < 0 THEN {fallback} ELSE sub.social_score END) + {w_recency} * EXP(-0.1 * (EXTRACT(EPOCH FROM (NOW() - sub.created_at)) / 86400.0))) DESC, sub.uid DESC",
                w_sim = weights.similarity,
                w_social = weights.social,
                fallback = SOCIAL_SCORE_FALLBACK,
                w_recency = weights.recency,
            ),
        };

        let fetch_limit = (req.limit as i64) + 1;
        let limit_placeholder = bind(&mut params, fetch_limit.into());

        let sql = format!(
            r#"
            SELECT * FROM (
                SELECT
                    uid, source_uids, title, body, url, image_url, created_at,
                    upvotes, downvotes, comments, amplification, social_score,
                    raw_json, source_type, short_summary, full_summary,
                    embedding_1536::text AS embedding_1536_text,
                    embedding_3072::text AS embedding_3072_text,
                    {similarity_expr} AS similarity
                FROM activities
                WHERE {where_clause}
            ) sub
            WHERE {outer_where}
            ORDER BY {order_clause}
            LIMIT {limit_placeholder}
            "#
        );

        let rows = self
            .db
            .conn()
            .query_all(Statement::from_sql_and_values(DbBackend::Postgres, &sql, params))
            .await
            .map_err(AppError::Database)?;

        let fetched = rows.len();
        let has_more = fetched > req.limit;
        let returned_rows = if has_more { &rows[..req.limit] } else { &rows[..] };

        let mut activities = Vec::with_capacity(returned_rows.len());
        let mut next_cursor = None;
        for row in returned_rows {
            let decorated = row_to_decorated(row)?;
            if req.sort_by == SortMode::Date {
                next_cursor =
                    Some(Cursor { timestamp: decorated.activity.created_at, id: decorated.activity.uid.as_str().to_string() });
            }
            activities.push(decorated);
        }
        if !has_more || req.sort_by != SortMode::Date {
            next_cursor = None;
        }

        Ok(SearchResult { activities, next_cursor, has_more })
    }

    /// Direct lookup by uid, used by the Activity Processor (C6) to decide
    /// whether a row already exists and whether it is complete (spec §4.6).
    pub async fn get(&self, uid: &TypedUid) -> Result<Option<StoredActivity>> {
        let row = self
            .db
            .conn()
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                SELECT
                    uid, source_uids, title, body, url, image_url, created_at,
                    upvotes, downvotes, comments, amplification, social_score,
                    raw_json, source_type, short_summary, full_summary,
                    embedding_1536::text AS embedding_1536_text,
                    embedding_3072::text AS embedding_3072_text,
                    update_count
                FROM activities WHERE uid = $1
                "#,
                vec![uid.as_str().into()],
            ))
            .await
            .map_err(AppError::Database)?;

        row.as_ref().map(row_to_stored).transpose()
    }

    async fn merge_with_existing(&self, uid: &TypedUid, incoming: &[TypedUid]) -> Result<Vec<TypedUid>> {
        let row = self
            .db
            .conn()
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT source_uids FROM activities WHERE uid = $1",
                vec![uid.as_str().into()],
            ))
            .await
            .map_err(AppError::Database)?;

        let Some(row) = row else {
            return Ok(incoming.to_vec());
        };

        let json: serde_json::Value = row.try_get("", "source_uids").map_err(AppError::Database)?;
        let existing = parse_source_uids(&json)?;
        let seen: BTreeSet<TypedUid> = existing.iter().cloned().collect();

        let mut merged = existing;
        for uid in incoming {
            if !seen.contains(uid) {
                merged.push(uid.clone());
            }
        }
        Ok(merged)
    }
}

fn bind(params: &mut Vec<Value>, value: Value) -> String {
    params.push(value);
    format!("${}", params.len())
}

fn vector_literal(embedding: &[f32]) -> String {
    format!("[{}]", embedding.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(","))
}

fn parse_vector_text(text: &str) -> Vec<f32> {
    text.trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<f32>().ok())
        .collect()
}

fn parse_source_uids(json: &serde_json::Value) -> Result<Vec<TypedUid>> {
    let values = json.as_array().ok_or_else(|| AppError::Internal {
        message: "stored source_uids column is not a JSON array".into(),
    })?;
    values
        .iter()
        .map(|v| {
            let s = v.as_str().ok_or_else(|| AppError::Internal {
                message: "stored source_uids element is not a string".into(),
            })?;
            TypedUid::parse(s.to_string())
        })
        .collect()
}

fn default_activity_constructor(raw_json: &serde_json::Value) -> Result<Activity> {
    serde_json::from_value(raw_json.clone()).map_err(AppError::from)
}

/// Hydrates the common row shape shared by `get` and `search`: dispatches
/// on `source_type` to reconstruct the `Activity`, re-injecting the
/// canonical merged `source_uids` before unmarshal (spec §4.1).
fn row_to_stored(row: &sea_orm::QueryResult) -> Result<StoredActivity> {
    let source_type: String = row.try_get("", "source_type").map_err(AppError::Database)?;
    let source_uids_json: serde_json::Value =
        row.try_get("", "source_uids").map_err(AppError::Database)?;
    let source_uids = parse_source_uids(&source_uids_json)?;
    let mut raw_json: serde_json::Value = row.try_get("", "raw_json").map_err(AppError::Database)?;

    if let serde_json::Value::Object(ref mut map) = raw_json {
        map.insert(
            "source_uids".to_string(),
            serde_json::json!(source_uids.iter().map(|u| u.as_str()).collect::<Vec<_>>()),
        );
    }
    let activity = registry::hydrate_activity(&source_type, &raw_json)?;

    let short_summary: Option<String> = row.try_get("", "short_summary").map_err(AppError::Database)?;
    let full_summary: Option<String> = row.try_get("", "full_summary").map_err(AppError::Database)?;
    let summary = match (short_summary, full_summary) {
        (None, None) => None,
        (short, full) => {
            Some(ActivitySummary { short_summary: short.unwrap_or_default(), full_summary: full.unwrap_or_default() })
        }
    };

    let embedding_1536: Option<String> = row.try_get("", "embedding_1536_text").ok().flatten();
    let embedding_3072: Option<String> = row.try_get("", "embedding_3072_text").ok().flatten();
    let update_count: i64 = row.try_get("", "update_count").unwrap_or(0);

    Ok(StoredActivity {
        activity,
        summary,
        source_type,
        embedding_1536: embedding_1536.map(|t| parse_vector_text(&t)),
        embedding_3072: embedding_3072.map(|t| parse_vector_text(&t)),
        update_count,
    })
}

fn row_to_decorated(row: &sea_orm::QueryResult) -> Result<DecoratedActivity> {
    let stored = row_to_stored(row)?;
    let embedding = stored.embedding_1536.clone().or_else(|| stored.embedding_3072.clone()).unwrap_or_default();
    let summary = stored
        .summary
        .clone()
        .unwrap_or(ActivitySummary { short_summary: String::new(), full_summary: String::new() });
    let similarity: f64 = row.try_get("", "similarity").unwrap_or(0.0);

    Ok(DecoratedActivity { activity: stored.activity, summary, embedding, similarity: Some(similarity as f32) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_literal_formats_as_bracketed_csv() {
        assert_eq!(vector_literal(&[0.1, 0.2, 0.3]), "[0.1,0.2,0.3]");
    }

    #[test]
    fn parse_vector_text_round_trips_vector_literal() {
        let original = vec![1.0_f32, -2.5, 3.0];
        let text = vector_literal(&original);
        assert_eq!(parse_vector_text(&text), original);
    }

    #[test]
    fn parse_source_uids_rejects_non_array() {
        assert!(parse_source_uids(&serde_json::json!("not-an-array")).is_err());
    }

    #[test]
    fn score_weights_normalize_to_similarity_only_when_all_zero() {
        let weights = ScoreWeights { similarity: 0.0, social: 0.0, recency: 0.0 }.normalized();
        assert_eq!(weights.similarity, 1.0);
        assert_eq!(weights.social, 0.0);
    }

    #[test]
    fn period_all_has_no_threshold() {
        assert!(Period::All.threshold().is_none());
        assert!(Period::Day.threshold().is_some());
    }
}
