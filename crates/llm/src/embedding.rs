//! `embeddingModel` capability interface (spec §6.5).

use async_trait::async_trait;
use feedengine_common::errors::{AppError, Result};
use std::time::Duration;

#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn create_embedding(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn dimension(&self) -> usize;
}

/// Minimal OpenAI-embeddings-compatible HTTP client with the teacher's
/// retry-with-backoff shape (`OpenAIEmbedder::request_with_retry`).
pub struct HttpEmbeddingModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    max_retries: u32,
}

impl HttpEmbeddingModel {
    pub fn new(
        api_key: String,
        model: String,
        dimension: usize,
        base_url: Option<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            api_key,
            model,
            dimension,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            max_retries,
        }
    }

    async fn request_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_error = None;
        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(100 * 2u64.pow(attempt));
                tokio::time::sleep(delay).await;
            }
            match self.make_request(texts).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "embedding request failed, retrying");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| AppError::Transient { message: "embedding retries exhausted".into() }))
    }

    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(serde::Serialize)]
        struct Req<'a> {
            input: &'a [String],
            model: &'a str,
        }
        #[derive(serde::Deserialize)]
        struct Resp {
            data: Vec<RespItem>,
        }
        #[derive(serde::Deserialize)]
        struct RespItem {
            embedding: Vec<f32>,
        }

        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&Req { input: texts, model: &self.model })
            .send()
            .await
            .map_err(|e| AppError::Transient { message: format!("embedding request failed: {e}") })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Transient { message: format!("embedding API error {status}: {body}") });
        }

        let parsed: Resp = response
            .json()
            .await
            .map_err(|e| AppError::Transient { message: format!("bad embedding response: {e}") })?;
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingModel for HttpEmbeddingModel {
    async fn create_embedding(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.request_with_retry(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic embedding model for tests and interface-conformance
/// fixtures.
pub struct MockEmbeddingModel {
    dimension: usize,
}

impl MockEmbeddingModel {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingModel for MockEmbeddingModel {
    async fn create_embedding(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        Ok(texts.iter().map(|_| (0..self.dimension).map(|_| rng.gen::<f32>()).collect()).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
