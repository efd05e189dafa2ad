//! Embedding provider abstraction and implementations.
//!
//! Two interchangeable remote endpoints sit behind the same interface:
//! OpenAI and Voyage. Selection is purely configuration; the rest of the
//! system only sees "a batch of strings in, one fixed-dimension vector per
//! string out". Vectors are stored as little-endian f32 blobs and compared
//! with cosine distance in Rust.
//!
//! Retry strategy: network errors and 5xx get exponential backoff
//! (1s, 2s, 4s, ... capped at 32s); HTTP 429 gets one long fixed delay per
//! attempt (`rate_limit_delay_secs`, minutes-scale, because providers
//! rate-limit in windows, not bursts); other 4xx fail immediately.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::EmbeddingConfig;

pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier stored alongside every vector. Similarity queries
    /// never mix vectors from different models.
    fn model_name(&self) -> &str;
    fn dims(&self) -> usize;
}

/// Embed a batch of texts with the configured provider. One request per
/// call; callers batch, this function does not.
pub async fn embed_texts(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let (endpoint, key) = match config.provider.as_str() {
        "openai" => (
            "https://api.openai.com/v1/embeddings",
            std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?,
        ),
        "voyage" => (
            "https://api.voyageai.com/v1/embeddings",
            std::env::var("VOYAGE_API_KEY")
                .map_err(|_| anyhow::anyhow!("VOYAGE_API_KEY not set"))?,
        ),
        "disabled" => bail!("Embedding provider is disabled"),
        other => bail!("Unknown embedding provider: {}", other),
    };

    let model = config
        .model
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("embedding.model required"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": model,
        "input": texts,
    });

    let mut last_err = None;
    let mut rate_limited = false;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = if rate_limited {
                Duration::from_secs(config.rate_limit_delay_secs)
            } else {
                Duration::from_secs(1 << (attempt - 1).min(5))
            };
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    let vectors = parse_embeddings_response(&json)?;
                    if vectors.len() != texts.len() {
                        bail!(
                            "Provider returned {} vectors for {} inputs",
                            vectors.len(),
                            texts.len()
                        );
                    }
                    return Ok(vectors);
                }

                rate_limited = status.as_u16() == 429;
                if rate_limited || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "Embedding API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }

                // Other client errors are not retryable
                let body_text = response.text().await.unwrap_or_default();
                bail!("Embedding API error {}: {}", status, body_text);
            }
            Err(e) => {
                rate_limited = false;
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
}

/// Embed a single query string (search path).
pub async fn embed_query(config: &EmbeddingConfig, text: &str) -> Result<Vec<f32>> {
    let results = embed_texts(config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// Both providers return `{"data": [{"embedding": [...]}, ...]}`.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: missing embedding"))?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }

    Ok(embeddings)
}

pub struct RemoteProvider {
    model: String,
    dims: usize,
}

impl RemoteProvider {
    /// Fails fast when the provider's credential is absent; there is no
    /// degraded mode for embedding-dependent operations.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required"))?;

        let key_var = match config.provider.as_str() {
            "openai" => "OPENAI_API_KEY",
            "voyage" => "VOYAGE_API_KEY",
            "disabled" => bail!("Embedding provider is disabled. Set [embedding] provider in config."),
            other => bail!("Unknown embedding provider: {}", other),
        };
        if std::env::var(key_var).is_err() {
            bail!("{} environment variable not set", key_var);
        }

        Ok(Self { model, dims })
    }
}

impl EmbeddingProvider for RemoteProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine distance in `[0, 2]`; `0` = identical direction. The user-facing
/// similarity score is `1 - distance`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_distance(&a, &b) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_parse_embeddings_response() {
        let json = serde_json::json!({
            "data": [
                {"embedding": [0.1, 0.2]},
                {"embedding": [0.3, 0.4]}
            ]
        });
        let vecs = parse_embeddings_response(&json).unwrap();
        assert_eq!(vecs.len(), 2);
        assert!((vecs[1][0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_parse_embeddings_response_malformed() {
        assert!(parse_embeddings_response(&serde_json::json!({})).is_err());
        assert!(parse_embeddings_response(&serde_json::json!({"data": [{}]})).is_err());
    }
}
