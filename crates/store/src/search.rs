//! Search request/response types for the Activity Store (spec §4.1).

use feedengine_common::types::{Cursor, DecoratedActivity, TypedUid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Similarity,
    Date,
    SocialScore,
    WeightedScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    All,
    Month,
    Week,
    Day,
}

impl Period {
    /// `createdAt >= now - duration`, or `None` for `All`.
    pub fn threshold(self) -> Option<chrono::Duration> {
        match self {
            Period::All => None,
            Period::Month => Some(chrono::Duration::days(30)),
            Period::Week => Some(chrono::Duration::days(7)),
            Period::Day => Some(chrono::Duration::days(1)),
        }
    }

    /// Stable string form used in topic-summary cache keys (spec §4.8).
    pub fn as_str(self) -> &'static str {
        match self {
            Period::All => "all",
            Period::Month => "month",
            Period::Week => "week",
            Period::Day => "day",
        }
    }
}

/// Relative weights for `weighted_score` sort. Normalized to sum to 1; if
/// all zero, `w_sim` defaults to 1 (spec §4.1).
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub similarity: f32,
    pub social: f32,
    pub recency: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { similarity: 1.0, social: 0.0, recency: 0.0 }
    }
}

impl ScoreWeights {
    pub fn normalized(self) -> Self {
        let sum = self.similarity + self.social + self.recency;
        if sum <= 0.0 {
            return Self { similarity: 1.0, social: 0.0, recency: 0.0 };
        }
        Self { similarity: self.similarity / sum, social: self.social / sum, recency: self.recency / sum }
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub source_uids: Option<Vec<TypedUid>>,
    pub activity_uids: Option<Vec<TypedUid>>,
    pub period: Period,
    pub query_embedding: Option<Vec<f32>>,
    pub min_similarity: Option<f32>,
    pub sort_by: SortMode,
    pub weights: ScoreWeights,
    pub limit: usize,
    pub cursor: Option<Cursor>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            source_uids: None,
            activity_uids: None,
            period: Period::All,
            query_embedding: None,
            min_similarity: None,
            sort_by: SortMode::Date,
            weights: ScoreWeights::default(),
            limit: 20,
            cursor: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub activities: Vec<DecoratedActivity>,
    pub next_cursor: Option<Cursor>,
    pub has_more: bool,
}
