//! Fetcher interface: source catalog, consumed by the source registry
//! (spec §6.2).

use async_trait::async_trait;
use feedengine_common::errors::Result;
use feedengine_common::types::{Source, TypedUid};

#[async_trait]
pub trait Fetcher: Send + Sync {
    fn source_type(&self) -> &str;
    async fn search(&self, query: &str, provider_config: &serde_json::Value) -> Result<Vec<Source>>;
    async fn find_by_id(&self, uid: &TypedUid, provider_config: &serde_json::Value) -> Result<Source>;
}
