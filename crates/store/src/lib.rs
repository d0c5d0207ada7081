//! C1 Activity Store and C2 Source Store: pgvector-backed persistence.
//!
//! There is no entity/migration layer here — the row shapes are fixed by
//! spec §6.6/§6.7 and every operation is hand-written SQL via
//! `sea_orm::Statement`, the same pattern the teacher used for its
//! vector/hybrid retrievers. Schema migrations are out of scope.

pub mod activity_store;
pub mod db;
pub mod feed_store;
pub mod search;
pub mod source_store;

pub use activity_store::ActivityStore;
pub use db::DbPool;
pub use feed_store::FeedStore;
pub use search::{Period, SearchRequest, SearchResult, SortMode};
pub use source_store::SourceStore;
