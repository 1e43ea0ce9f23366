use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::{VectorError, VectorResult};
use crate::models::OneOrMany;

const BODY_PREVIEW_CHARS: usize = 200;

/// HTTP client for the embedding service
///
/// Sends `{"text": ...}` as JSON and reads the vectors from the `data` member
/// of the response. The underlying `reqwest::Client` is built on first use and
/// reused for every later call.
pub struct EmbeddingClient {
    config: EmbeddingConfig,
    endpoint: String,
    client: OnceCell<Client>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    text: TextPayload<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum TextPayload<'a> {
    One(&'a str),
    Many(&'a [String]),
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse<T> {
    data: T,
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Self {
        let endpoint = config.endpoint();
        Self {
            config,
            endpoint,
            client: OnceCell::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Embed one text or a batch, mirroring the input shape in the output
    pub async fn encode(&self, input: OneOrMany<String>) -> VectorResult<OneOrMany<Vec<f32>>> {
        match input {
            OneOrMany::One(text) => Ok(OneOrMany::One(self.embed(&text).await?)),
            OneOrMany::Many(texts) => Ok(OneOrMany::Many(self.embed_batch(&texts).await?)),
        }
    }

    async fn http(&self) -> VectorResult<&Client> {
        self.client
            .get_or_try_init(|| async {
                debug!(endpoint = %self.endpoint, "Building embedding HTTP client");
                Client::builder()
                    .timeout(Duration::from_secs(self.config.timeout_secs))
                    .build()
                    .map_err(VectorError::Transport)
            })
            .await
    }

    async fn post<T: DeserializeOwned>(&self, text: TextPayload<'_>) -> VectorResult<T> {
        let client = self.http().await?;

        let response = client
            .post(&self.endpoint)
            .json(&EmbeddingRequest { text })
            .send()
            .await
            .map_err(VectorError::Transport)?
            .error_for_status()
            .map_err(VectorError::Transport)?;

        let body = response.text().await.map_err(VectorError::Transport)?;

        let parsed: EmbeddingResponse<T> = serde_json::from_str(&body).map_err(|e| {
            VectorError::Decode(format!("{} (body: {})", e, preview(&body)))
        })?;

        Ok(parsed.data)
    }
}

fn preview(body: &str) -> String {
    if body.chars().count() <= BODY_PREVIEW_CHARS {
        return body.to_string();
    }
    let head: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
    format!("{}...", head)
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn embed(&self, text: &str) -> VectorResult<Vec<f32>> {
        self.post(TextPayload::One(text)).await
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> VectorResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let vectors: Vec<Vec<f32>> = self.post(TextPayload::Many(texts)).await?;

        if vectors.len() != texts.len() {
            return Err(VectorError::Decode(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shapes() {
        let single = serde_json::to_value(EmbeddingRequest {
            text: TextPayload::One("I like soccer."),
        })
        .unwrap();
        assert_eq!(single, serde_json::json!({"text": "I like soccer."}));

        let texts = vec!["a".to_string(), "b".to_string()];
        let batch = serde_json::to_value(EmbeddingRequest {
            text: TextPayload::Many(&texts),
        })
        .unwrap();
        assert_eq!(batch, serde_json::json!({"text": ["a", "b"]}));
    }

    #[test]
    fn test_endpoint_from_config() {
        let client = EmbeddingClient::new(EmbeddingConfig::new("10.0.0.5", 9000));
        assert_eq!(client.endpoint(), "http://10.0.0.5:9000/api/v1/embedding");
    }

    #[test]
    fn test_preview_truncates_long_bodies() {
        let long = "x".repeat(500);
        let shown = preview(&long);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.len(), BODY_PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }

    #[tokio::test]
    async fn test_empty_batch_skips_network() {
        // Port 9 (discard) is never contacted for an empty batch.
        let client = EmbeddingClient::new(EmbeddingConfig::new("127.0.0.1", 9));
        let vectors = client.embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
