//! HTTP embedding adapter and the deterministic fallback generator.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::RagError;
use crate::providers::EmbeddingProvider;

/// OpenAI-compatible embeddings client.
pub struct HttpEmbeddingClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimension: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl HttpEmbeddingClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Result<Self, RagError> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .timeout(std::time::Duration::from_secs(120))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RagError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error("embedding", &self.endpoint, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            RagError::hard(
                "embedding",
                format!("failed to read response body from {}: {}", self.endpoint, e),
            )
        })?;

        if !status.is_success() {
            return Err(classify_status("embedding", status, &body));
        }

        let parsed: EmbeddingResponse = parse_json_body("embedding", &self.endpoint, &body)?;
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();

        if vectors.len() != texts.len() {
            return Err(RagError::hard(
                "embedding",
                format!(
                    "provider returned {} vectors for {} inputs",
                    vectors.len(),
                    texts.len()
                ),
            ));
        }
        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(RagError::hard(
                    "embedding",
                    format!(
                        "provider returned dimension {} but index expects {}",
                        vector.len(),
                        self.dimension
                    ),
                ));
            }
        }

        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic pseudo-random unit vector derived from a hash of the text.
/// Used only as an opt-in query-side stand-in when the embedding provider is
/// down; never written to the index.
pub fn fallback_embedding(text: &str, dimension: usize) -> Vec<f32> {
    // FNV-1a over the text seeds a splitmix-style generator.
    let mut seed: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in text.as_bytes() {
        seed ^= u64::from(*byte);
        seed = seed.wrapping_mul(0x0000_0100_0000_01b3);
    }

    let mut vector = Vec::with_capacity(dimension);
    let mut state = seed;
    for _ in 0..dimension {
        state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^= z >> 31;
        // Map to [-1, 1).
        vector.push((z as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32);
    }

    // Normalize so cosine scores stay in a sane range. The generator cannot
    // produce an all-zero vector, but guard the norm anyway.
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    } else {
        vector[0] = 1.0;
    }
    vector
}

pub fn is_zero_vector(vector: &[f32]) -> bool {
    vector.iter().all(|v| *v == 0.0)
}

pub(crate) fn classify_reqwest_error(
    provider: &str,
    endpoint: &str,
    error: reqwest::Error,
) -> RagError {
    if error.is_timeout() {
        RagError::transient(provider, format!("request to {} timed out", endpoint))
    } else if error.is_connect() {
        RagError::transient(
            provider,
            format!("failed to connect to {}: {}", endpoint, error),
        )
    } else {
        RagError::hard(provider, format!("request to {} failed: {}", endpoint, error))
    }
}

pub(crate) fn classify_status(
    provider: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> RagError {
    let preview: String = body.chars().take(200).collect();
    if status.as_u16() == 429 || status.is_server_error() {
        RagError::transient(provider, format!("HTTP {}: {}", status, preview))
    } else {
        RagError::hard(provider, format!("HTTP {}: {}", status, preview))
    }
}

/// Parse a response body as JSON, flagging HTML bodies separately so a dead
/// gateway does not read as a serde failure.
pub(crate) fn parse_json_body<T: serde::de::DeserializeOwned>(
    provider: &str,
    endpoint: &str,
    body: &str,
) -> Result<T, RagError> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        let preview: String = trimmed.chars().take(200).collect();
        return Err(RagError::transient(
            provider,
            format!(
                "{} returned HTML instead of JSON, service may be down: {}",
                endpoint, preview
            ),
        ));
    }
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(300).collect();
        RagError::hard(
            provider,
            format!("failed to parse JSON from {}: {}. Body: {}", endpoint, e, preview),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_deterministic_per_text() {
        let a = fallback_embedding("what is covered", 64);
        let b = fallback_embedding("what is covered", 64);
        let c = fallback_embedding("what is excluded", 64);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fallback_is_never_zero_and_unit_norm() {
        let vector = fallback_embedding("", 128);
        assert!(!is_zero_vector(&vector));
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[test]
    fn html_body_reads_as_transient() {
        let result: Result<EmbeddingResponse, _> =
            parse_json_body("embedding", "http://x", "<html>502</html>");
        assert!(matches!(result, Err(RagError::TransientExternal { .. })));
    }

    #[test]
    fn rate_limit_status_is_transient() {
        let err = classify_status("llm", reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(err.is_transient());
        let err = classify_status("llm", reqwest::StatusCode::BAD_REQUEST, "nope");
        assert!(!err.is_transient());
    }
}
