//! C3 Summarizer: produces `(short, full)` summaries per activity and
//! topic-level digests (spec §4.3).

use crate::completion::CompletionModel;
use feedengine_common::errors::{AppError, Result};
use feedengine_common::types::{Activity, ActivitySummary};

const FULL_SUMMARY_WORD_CAP: usize = 200;
const SHORT_SUMMARY_WORD_CAP: usize = 20;
const FULL_SUMMARY_MAX_RETRIES: u32 = 3;

pub struct Summarizer<M: CompletionModel> {
    model: M,
}

impl<M: CompletionModel> Summarizer<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// Runs the full and short summary calls in parallel, per spec §4.3.
    pub async fn summarize_activity(&self, activity: &Activity) -> Result<ActivitySummary> {
        let (full, short) =
            tokio::join!(self.summarize_full(activity), self.summarize_short(activity));
        Ok(ActivitySummary { full_summary: full?, short_summary: short? })
    }

    /// Markdown, <=~200 words, sections `### Context` / `### Key Points` /
    /// `### Why it matters`. Retries up to 3 times, each retry reusing the
    /// previous (too-long) output as new input; if no retry reaches the
    /// cap, the last produced output is returned (best effort).
    async fn summarize_full(&self, activity: &Activity) -> Result<String> {
        let mut output = self.model.call(&full_prompt(activity, None), 1.0).await?;

        for _ in 0..FULL_SUMMARY_MAX_RETRIES {
            if word_count(&output) <= FULL_SUMMARY_WORD_CAP {
                return Ok(output);
            }
            output = self.model.call(&full_prompt(activity, Some(&output)), 1.0).await?;
        }

        Ok(output)
    }

    /// Plain text, <=~20 words, single call at temperature 0, no retry.
    async fn summarize_short(&self, activity: &Activity) -> Result<String> {
        self.model.call(&short_prompt(activity), 0.0).await
    }

    /// 1-3 sentence plain-text digest. Empty input yields empty output
    /// without calling the model.
    pub async fn summarize_topic(&self, topic: &str, activities: &[Activity]) -> Result<String> {
        if activities.is_empty() {
            return Ok(String::new());
        }
        self.model.call(&topic_prompt(topic, activities), 0.3).await
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn full_prompt(activity: &Activity, previous_too_long: Option<&str>) -> String {
    let mut prompt = format!(
        "Summarize the following item faithfully, using only the given title, body, and url. \
         Do not invent facts. Produce Markdown with exactly these sections: \
         \"### Context\", \"### Key Points\", \"### Why it matters\". \
         Hard limit: {FULL_SUMMARY_WORD_CAP} words total.\n\n\
         Title: {}\nURL: {}\nBody:\n{}\n",
        activity.title, activity.url, activity.body
    );
    if let Some(previous) = previous_too_long {
        prompt.push_str(&format!(
            "\nYour previous attempt exceeded the word limit:\n{previous}\n\
             Rewrite it to fit within {FULL_SUMMARY_WORD_CAP} words while keeping all three sections.\n"
        ));
    }
    prompt
}

fn short_prompt(activity: &Activity) -> String {
    format!(
        "In plain text, at most {SHORT_SUMMARY_WORD_CAP} words, faithfully summarize this item \
         using only the given title, body, and url. Do not invent facts.\n\n\
         Title: {}\nURL: {}\nBody:\n{}\n",
        activity.title, activity.url, activity.body
    )
}

fn topic_prompt(topic: &str, activities: &[Activity]) -> String {
    let mut prompt = format!(
        "Write a 1-3 sentence plain-text digest of the following items under the topic \"{topic}\". \
         Use only the given titles and bodies. Do not invent facts.\n\n"
    );
    for activity in activities {
        prompt.push_str(&format!("- {} ({})\n", activity.title, activity.url));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionModel;
    use async_trait::async_trait;
    use chrono::Utc;
    use feedengine_common::types::{Engagement, TypedUid};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sample_activity() -> Activity {
        Activity {
            uid: TypedUid::parse("hackernews:123").unwrap(),
            source_uids: vec![TypedUid::parse("hackernewsposts:top").unwrap()],
            title: "Rust 2.0 announced".into(),
            body: "The Rust team announced a new major version with breaking changes.".into(),
            url: "https://example.com/rust-2".into(),
            image_url: None,
            created_at: Utc::now(),
            engagement: Engagement::default(),
            social_score: -1.0,
            raw_json: serde_json::json!({}),
        }
    }

    struct FixedModel(String);

    #[async_trait]
    impl CompletionModel for FixedModel {
        async fn call(&self, _prompt: &str, _temperature: f32) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn empty_topic_activities_skip_the_model_call() {
        let summarizer = Summarizer::new(FixedModel("unused".into()));
        let digest = summarizer.summarize_topic("Rust", &[]).await.unwrap();
        assert_eq!(digest, "");
    }

    #[tokio::test]
    async fn short_summary_is_a_single_call() {
        let summarizer = Summarizer::new(FixedModel("a short summary".into()));
        let activity = sample_activity();
        let summary = summarizer.summarize_activity(&activity).await.unwrap();
        assert_eq!(summary.short_summary, "a short summary");
    }

    struct CountingModel {
        calls: Arc<AtomicUsize>,
        long_output: String,
    }

    #[async_trait]
    impl CompletionModel for CountingModel {
        async fn call(&self, prompt: &str, _temperature: f32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.contains("at most") {
                Ok("fine".into())
            } else {
                Ok(self.long_output.clone())
            }
        }
    }

    #[tokio::test]
    async fn full_summary_retries_until_cap_or_exhaustion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let long_output: String = std::iter::repeat("word ").take(300).collect();
        let model = CountingModel { calls: calls.clone(), long_output };
        let summarizer = Summarizer::new(model);
        let activity = sample_activity();

        let summary = summarizer.summarize_activity(&activity).await.unwrap();
        assert!(word_count(&summary.full_summary) > FULL_SUMMARY_WORD_CAP);
        // 1 initial full call + 3 retries + 1 short call = 5
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
