use docqa_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::ollama::OllamaClient;

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

const MAX_PROMPT_BYTES: usize = 12_000;

/// Cap the prompt at `max_bytes`, flooring to a char boundary so the
/// cut never lands inside a multi-byte character.
fn truncate_to_boundary(input: &str, max_bytes: usize) -> &str {
    if input.len() <= max_bytes {
        return input;
    }
    let mut end = max_bytes;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        // Keep requests bounded. Chunking enforces reasonable sizes, but guard anyway.
        let prompt = truncate_to_boundary(input, MAX_PROMPT_BYTES);

        let url = format!("{}/api/embeddings", self.client.base_url());
        let req = EmbeddingsRequest {
            model: &self.model,
            prompt,
        };
        let resp = ureq::post(&url)
            .timeout(std::time::Duration::from_secs(10))
            .send_json(serde_json::to_value(req).map_err(|e| {
                AppError::new("RAG_EMBEDDINGS_FAILED", "Failed to encode embeddings request")
                    .with_details(e.to_string())
            })?);

        match resp {
            Ok(r) if r.status() == 200 => {
                let v: EmbeddingsResponse = r.into_json().map_err(|e| {
                    AppError::new("RAG_EMBEDDINGS_FAILED", "Failed to decode embeddings response")
                        .with_details(e.to_string())
                })?;
                if v.embedding.is_empty() {
                    return Err(AppError::new(
                        "RAG_EMBEDDINGS_FAILED",
                        "Embeddings response was empty",
                    ));
                }
                Ok(v.embedding)
            }
            Ok(r) => Err(
                AppError::new("RAG_EMBEDDINGS_FAILED", "Embeddings request failed")
                    .with_details(format!("status={}", r.status())),
            ),
            Err(e) => Err(
                AppError::new("RAG_EMBEDDINGS_FAILED", "Failed to call embeddings endpoint")
                    .with_details(e.to_string())
                    .with_retryable(true),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{truncate_to_boundary, MAX_PROMPT_BYTES};

    #[test]
    fn short_input_passes_through_untruncated() {
        assert_eq!(truncate_to_boundary("hello", MAX_PROMPT_BYTES), "hello");
    }

    #[test]
    fn cap_floors_to_a_char_boundary_in_multibyte_text() {
        // 1 ASCII byte then three-byte characters: byte 12000 lands
        // mid-character, so the cut must walk back to 11998.
        let input = format!("a{}", "€".repeat(5_000));
        let out = truncate_to_boundary(&input, MAX_PROMPT_BYTES);
        assert!(out.len() <= MAX_PROMPT_BYTES);
        assert_eq!(out.len(), 11_998);
        assert!(input.is_char_boundary(out.len()));
        assert!(out.chars().last() == Some('€'));
    }
}
