use std::io::{BufRead, BufReader};

use docqa_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::{GenerateOptions, Llm};
use crate::ollama::OllamaClient;

#[derive(Debug, Clone)]
pub struct OllamaLlm {
    client: OllamaClient,
    model: String,
}

impl OllamaLlm {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn request(&self, prompt: &str, options: &GenerateOptions, stream: bool) -> GenerateRequest<'_> {
        GenerateRequest {
            model: &self.model,
            prompt: prompt.to_string(),
            stream,
            options: ModelOptions {
                num_predict: options.max_tokens,
                stop: options.stop_sequences.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ModelOptions {
    num_predict: u32,
    stop: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: ModelOptions,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Clone, Deserialize)]
struct StreamFragment {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

impl Llm for OllamaLlm {
    fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, AppError> {
        let url = format!("{}/api/generate", self.client.base_url());
        let req = self.request(prompt, options, false);

        let resp = ureq::post(&url)
            .timeout(std::time::Duration::from_secs(120))
            .send_json(serde_json::to_value(req).map_err(|e| {
                AppError::new("RAG_GENERATE_FAILED", "Failed to encode generate request")
                    .with_details(e.to_string())
            })?);

        match resp {
            Ok(r) if r.status() == 200 => {
                let v: GenerateResponse = r.into_json().map_err(|e| {
                    AppError::new("RAG_GENERATE_FAILED", "Failed to decode generate response")
                        .with_details(e.to_string())
                })?;
                Ok(v.response.trim().to_string())
            }
            Ok(r) => Err(
                AppError::new("RAG_GENERATE_FAILED", "Generate request failed")
                    .with_details(format!("status={}", r.status())),
            ),
            Err(e) => Err(
                AppError::new("RAG_GENERATE_FAILED", "Failed to call generate endpoint")
                    .with_details(e.to_string())
                    .with_retryable(true),
            ),
        }
    }

    fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerateOptions,
        on_token: &mut dyn FnMut(&str) -> bool,
    ) -> Result<(), AppError> {
        let url = format!("{}/api/generate", self.client.base_url());
        let req = self.request(prompt, options, true);

        let resp = ureq::post(&url)
            .timeout(std::time::Duration::from_secs(300))
            .send_json(serde_json::to_value(req).map_err(|e| {
                AppError::new("RAG_GENERATE_FAILED", "Failed to encode generate request")
                    .with_details(e.to_string())
            })?);

        let r = match resp {
            Ok(r) if r.status() == 200 => r,
            Ok(r) => {
                return Err(
                    AppError::new("RAG_GENERATE_FAILED", "Generate request failed")
                        .with_details(format!("status={}", r.status())),
                )
            }
            Err(e) => {
                return Err(
                    AppError::new("RAG_GENERATE_FAILED", "Failed to call generate endpoint")
                        .with_details(e.to_string())
                        .with_retryable(true),
                )
            }
        };

        // One JSON fragment per line until `done`. Dropping the reader
        // mid-stream closes the connection, which is how cancellation
        // propagates to the model server.
        let reader = BufReader::new(r.into_reader());
        for line in reader.lines() {
            let line = line.map_err(|e| {
                AppError::new("RAG_GENERATE_FAILED", "Failed to read generate stream")
                    .with_details(e.to_string())
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let fragment: StreamFragment = serde_json::from_str(&line).map_err(|e| {
                AppError::new("RAG_GENERATE_FAILED", "Failed to decode stream fragment")
                    .with_details(e.to_string())
            })?;
            if !fragment.response.is_empty() && !on_token(&fragment.response) {
                return Ok(());
            }
            if fragment.done {
                break;
            }
        }
        Ok(())
    }
}
