//! C2 Source Store: small CRUD over `Source` (spec §4.2).
//!
//! ```sql
//! CREATE TABLE sources (
//!     uid         TEXT PRIMARY KEY,
//!     name        TEXT NOT NULL,
//!     description TEXT NOT NULL,
//!     url         TEXT NOT NULL,
//!     icon_url    TEXT,
//!     topics      JSONB NOT NULL,
//!     source_type TEXT NOT NULL,
//!     raw_json    JSONB NOT NULL
//! );
//! ```

use std::sync::Arc;

use sea_orm::{ConnectionTrait, DbBackend, Statement};

use feedengine_common::errors::{AppError, Result};
use feedengine_common::registry;
use feedengine_common::types::{Source, TypedUid};

use crate::db::DbPool;

pub struct SourceStore {
    db: Arc<DbPool>,
}

impl SourceStore {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// No-op if a row with this UID already exists, per spec §4.2.
    pub async fn add(&self, source: &Source) -> Result<()> {
        if self.get_by_id(&source.uid).await.is_ok() {
            return Ok(());
        }

        let sql = r#"
            INSERT INTO sources (uid, name, description, url, icon_url, topics, source_type, raw_json)
            VALUES ($1, $2, $3, $4, $5, $6::jsonb, $7, $8::jsonb)
            ON CONFLICT (uid) DO NOTHING
        "#;
        self.db
            .conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                vec![
                    source.uid.as_str().into(),
                    source.name.clone().into(),
                    source.description.clone().into(),
                    source.url.clone().into(),
                    source.icon_url.clone().into(),
                    serde_json::to_value(&source.topics)?.into(),
                    source.uid.source_type().to_string().into(),
                    serde_json::to_value(source)?.into(),
                ],
            ))
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    pub async fn remove(&self, uid: &TypedUid) -> Result<()> {
        self.db
            .conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "DELETE FROM sources WHERE uid = $1",
                vec![uid.as_str().into()],
            ))
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Source>> {
        let rows = self
            .db
            .conn()
            .query_all(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT source_type, raw_json FROM sources",
                vec![],
            ))
            .await
            .map_err(AppError::Database)?;

        rows.iter().map(row_to_source).collect()
    }

    pub async fn get_by_id(&self, uid: &TypedUid) -> Result<Source> {
        let row = self
            .db
            .conn()
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT source_type, raw_json FROM sources WHERE uid = $1",
                vec![uid.as_str().into()],
            ))
            .await
            .map_err(AppError::Database)?;

        let row = row.ok_or_else(|| AppError::not_found("source", uid.as_str()))?;
        row_to_source(&row)
    }
}

fn row_to_source(row: &sea_orm::QueryResult) -> Result<Source> {
    let source_type: String = row.try_get("", "source_type").map_err(AppError::Database)?;
    let raw_json: serde_json::Value = row.try_get("", "raw_json").map_err(AppError::Database)?;
    registry::reconstruct_source(&source_type, &raw_json)
}
