//! Feed Store (spec §6.4): CRUD for `Feed`, plus `FindBySourceUIDs` used by
//! the feed mutation surface (§6.7) to decide whether a removed source
//! subscription can be unregistered from the scheduler.
//!
//! ```sql
//! CREATE TABLE feeds (
//!     id          UUID PRIMARY KEY,
//!     name        TEXT NOT NULL,
//!     icon        TEXT,
//!     query       TEXT NOT NULL,
//!     source_uids JSONB NOT NULL,
//!     user_id     TEXT NOT NULL,
//!     public      BOOLEAN NOT NULL,
//!     created_at  TIMESTAMPTZ NOT NULL,
//!     updated_at  TIMESTAMPTZ NOT NULL
//! );
//! ```

use std::sync::Arc;

use sea_orm::{ConnectionTrait, DbBackend, Statement};
use uuid::Uuid;

use feedengine_common::errors::{AppError, Result};
use feedengine_common::types::{Feed, TypedUid};

use crate::db::DbPool;

pub struct FeedStore {
    db: Arc<DbPool>,
}

impl FeedStore {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn upsert(&self, feed: &Feed) -> Result<()> {
        let source_uids_json =
            serde_json::to_value(feed.source_uids.iter().map(|u| u.as_str()).collect::<Vec<_>>())?;

        let sql = r#"
            INSERT INTO feeds (id, name, icon, query, source_uids, user_id, public, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5::jsonb, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                icon = EXCLUDED.icon,
                query = EXCLUDED.query,
                source_uids = EXCLUDED.source_uids,
                public = EXCLUDED.public,
                updated_at = EXCLUDED.updated_at
        "#;
        self.db
            .conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                vec![
                    feed.id.into(),
                    feed.name.clone().into(),
                    feed.icon.clone().into(),
                    feed.query.clone().into(),
                    source_uids_json.into(),
                    feed.user_id.clone().into(),
                    feed.public.into(),
                    feed.created_at.into(),
                    feed.updated_at.into(),
                ],
            ))
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    pub async fn remove(&self, id: Uuid) -> Result<()> {
        self.db
            .conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "DELETE FROM feeds WHERE id = $1",
                vec![id.into()],
            ))
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Feed>> {
        let rows = self
            .db
            .conn()
            .query_all(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT id, name, icon, query, source_uids, user_id, public, created_at, updated_at FROM feeds",
                vec![],
            ))
            .await
            .map_err(AppError::Database)?;
        rows.iter().map(row_to_feed).collect()
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Feed> {
        let row = self
            .db
            .conn()
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT id, name, icon, query, source_uids, user_id, public, created_at, updated_at FROM feeds WHERE id = $1",
                vec![id.into()],
            ))
            .await
            .map_err(AppError::Database)?;
        let row = row.ok_or_else(|| AppError::not_found("feed", id.to_string()))?;
        row_to_feed(&row)
    }

    /// All feeds whose `sourceUIDs` contains `uid`, for any `uid` in the
    /// given slice. Used by the feed mutation surface (§6.7) to decide
    /// whether a dropped subscription is still referenced elsewhere.
    pub async fn find_by_source_uids(&self, uids: &[TypedUid]) -> Result<Vec<Feed>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let mut ors = Vec::with_capacity(uids.len());
        for uid in uids {
            let literal = serde_json::to_string(&[uid.as_str()])
                .expect("single-element string array serialization is infallible");
            ors.push(format!("source_uids @> '{literal}'::jsonb"));
        }
        let sql = format!(
            "SELECT id, name, icon, query, source_uids, user_id, public, created_at, updated_at FROM feeds WHERE {}",
            ors.join(" OR ")
        );
        let rows = self
            .db
            .conn()
            .query_all(Statement::from_sql_and_values(DbBackend::Postgres, &sql, vec![]))
            .await
            .map_err(AppError::Database)?;
        rows.iter().map(row_to_feed).collect()
    }
}

fn row_to_feed(row: &sea_orm::QueryResult) -> Result<Feed> {
    let source_uids_json: serde_json::Value =
        row.try_get("", "source_uids").map_err(AppError::Database)?;
    let source_uids: Vec<TypedUid> = source_uids_json
        .as_array()
        .ok_or_else(|| AppError::Internal { message: "feed source_uids is not a JSON array".into() })?
        .iter()
        .map(|v| {
            let s = v
                .as_str()
                .ok_or_else(|| AppError::Internal { message: "feed source_uids element is not a string".into() })?;
            TypedUid::parse(s.to_string())
        })
        .collect::<Result<_>>()?;

    Ok(Feed {
        id: row.try_get("", "id").map_err(AppError::Database)?,
        name: row.try_get("", "name").map_err(AppError::Database)?,
        icon: row.try_get("", "icon").map_err(AppError::Database)?,
        query: row.try_get("", "query").map_err(AppError::Database)?,
        source_uids,
        user_id: row.try_get("", "user_id").map_err(AppError::Database)?,
        public: row.try_get("", "public").map_err(AppError::Database)?,
        created_at: row.try_get("", "created_at").map_err(AppError::Database)?,
        updated_at: row.try_get("", "updated_at").map_err(AppError::Database)?,
    })
}
