//! C5 Query Rewriter: expands a user query plus active sources into
//! topic/query groups (spec §4.5).

use feedengine_common::errors::{AppError, Result};
use feedengine_common::types::TopicQueryGroup;
use feedengine_llm::CompletionModel;
use serde::Deserialize;

const MIN_TOPICS: usize = 2;
const MAX_TOPICS: usize = 5;
const MIN_QUERIES_PER_TOPIC: usize = 1;
const MAX_QUERIES_PER_TOPIC: usize = 3;

/// `(type, name)` pair the rewriter is conditioned on — just enough to
/// describe a subscribed source, not its full provider config.
pub struct SourceRef {
    pub source_type: String,
    pub name: String,
}

pub struct QueryRewriter<M: CompletionModel> {
    model: M,
}

#[derive(Deserialize)]
struct RewriteTopic {
    name: String,
    emoji: String,
    queries: Vec<String>,
}

impl<M: CompletionModel> QueryRewriter<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// Produces 2-5 topics, each with 1-3 queries more specific than the
    /// original, each with a representative emoji. On parse failure the
    /// call errors; there is no silent fallback (spec §4.5).
    pub async fn rewrite_to_topics(
        &self,
        query: &str,
        sources: &[SourceRef],
    ) -> Result<Vec<TopicQueryGroup>> {
        let prompt = build_prompt(query, sources);
        let raw = self.model.call(&prompt, 0.7).await?;
        let topics = parse_topics(&raw)?;
        Ok(topics
            .into_iter()
            .map(|t| TopicQueryGroup {
                name: t.name,
                emoji: t.emoji,
                queries: t.queries,
                activity_ids: Vec::new(),
                summary: String::new(),
            })
            .collect())
    }
}

fn build_prompt(query: &str, sources: &[SourceRef]) -> String {
    let source_list: String =
        sources.iter().map(|s| format!("- {} ({})\n", s.name, s.source_type)).collect();
    format!(
        "Expand the following feed query into 2 to 5 more specific topics, each with 1 to 3 \
         search queries and a representative emoji. Respond with a JSON array only, no prose, \
         where each element has the shape {{\"name\": string, \"emoji\": string, \"queries\": \
         [string]}}.\n\nQuery: {query}\n\nSubscribed sources:\n{source_list}"
    )
}

fn parse_topics(raw: &str) -> Result<Vec<RewriteTopic>> {
    let json_slice = extract_json_array(raw).ok_or_else(|| AppError::Validation {
        message: "rewrite response did not contain a JSON array".into(),
        field: None,
    })?;

    let topics: Vec<RewriteTopic> = serde_json::from_str(json_slice)
        .map_err(|e| AppError::Validation { message: format!("rewrite JSON parse failed: {e}"), field: None })?;

    if !(MIN_TOPICS..=MAX_TOPICS).contains(&topics.len()) {
        return Err(AppError::Validation {
            message: format!("rewrite produced {} topics, expected {MIN_TOPICS}-{MAX_TOPICS}", topics.len()),
            field: None,
        });
    }
    for topic in &topics {
        if !(MIN_QUERIES_PER_TOPIC..=MAX_QUERIES_PER_TOPIC).contains(&topic.queries.len()) {
            return Err(AppError::Validation {
                message: format!(
                    "topic '{}' has {} queries, expected {MIN_QUERIES_PER_TOPIC}-{MAX_QUERIES_PER_TOPIC}",
                    topic.name,
                    topic.queries.len()
                ),
                field: None,
            });
        }
    }
    Ok(topics)
}

/// Best-effort extraction of the first top-level JSON array from a
/// completion response, tolerating surrounding prose/code fences.
fn extract_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedModel(String);

    #[async_trait]
    impl CompletionModel for FixedModel {
        async fn call(&self, _prompt: &str, _temperature: f32) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn rewrites_into_topic_query_groups() {
        let response = r#"Here is the expansion:
        [
          {"name": "Machine Learning Breakthroughs", "emoji": "🧠", "queries": ["new ML architectures"]},
          {"name": "AI Industry News", "emoji": "📰", "queries": ["AI funding", "AI acquisitions"]}
        ]"#;
        let rewriter = QueryRewriter::new(FixedModel(response.to_string()));
        let topics = rewriter
            .rewrite_to_topics("AI developments", &[SourceRef { source_type: "rss".into(), name: "TechCrunch".into() }])
            .await
            .unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].name, "Machine Learning Breakthroughs");
        assert_eq!(topics[1].queries.len(), 2);
    }

    #[tokio::test]
    async fn parse_failure_errors_without_fallback() {
        let rewriter = QueryRewriter::new(FixedModel("not json at all".to_string()));
        let result = rewriter.rewrite_to_topics("AI developments", &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn too_few_topics_is_rejected() {
        let response = r#"[{"name": "Only one", "emoji": "🔹", "queries": ["q1"]}]"#;
        let rewriter = QueryRewriter::new(FixedModel(response.to_string()));
        let result = rewriter.rewrite_to_topics("AI developments", &[]).await;
        assert!(result.is_err());
    }
}
