//! Ollama HTTP client.

use crate::error::{OllamaError, OllamaResult};
use crate::types::*;
use futures_util::StreamExt;
use lectern_config::OllamaConfig;
use reqwest::{Client, Response};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Client for interacting with Ollama's API.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    host: String,
    timeout: Duration,
}

impl OllamaClient {
    /// Create a new client from configuration.
    pub fn from_config(config: &OllamaConfig) -> OllamaResult<Self> {
        Self::with_timeout(&config.host, Duration::from_secs(config.timeout_seconds))
    }

    /// Create a new client with default settings.
    pub fn new(host: impl Into<String>) -> OllamaResult<Self> {
        Self::with_timeout(&host.into(), Duration::from_secs(120))
    }

    fn with_timeout(host: &str, timeout: Duration) -> OllamaResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(OllamaError::Http)?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Check if Ollama server is available.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.host);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// List all available models.
    pub async fn list_models(&self) -> OllamaResult<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.host);
        debug!("Listing models from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        let response = check_status(response, None).await?;

        let list: ListModelsResponse = response.json().await?;
        Ok(list.models)
    }

    /// Check if a specific model is available.
    pub async fn has_model(&self, model: &str) -> OllamaResult<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| model_matches(&m.name, model)))
    }

    /// Generate an embedding for text.
    pub async fn embed(&self, model: &str, text: &str) -> OllamaResult<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.host);
        debug!("Generating embedding with model {} for text length {}", model, text.len());

        let request = EmbeddingRequest {
            model: model.to_string(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        let response = check_status(response, Some(model)).await?;

        let embedding_response: EmbeddingResponse = response.json().await?;
        if embedding_response.embedding.is_empty() {
            return Err(OllamaError::EmptyEmbedding {
                model: model.to_string(),
            });
        }

        Ok(embedding_response.embedding)
    }

    /// Generate text (non-streaming).
    pub async fn generate(&self, request: GenerateRequest) -> OllamaResult<GenerateResponse> {
        let url = format!("{}/api/generate", self.host);
        debug!(
            images = request.images.as_ref().map_or(0, |i| i.len()),
            "Generating with model {}", request.model
        );

        let request = request.with_stream(false);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        let response = check_status(response, Some(request.model.as_str())).await?;

        Ok(response.json().await?)
    }

    /// Generate text with streaming.
    /// Returns a channel receiver that yields response chunks.
    pub async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> OllamaResult<mpsc::Receiver<String>> {
        let url = format!("{}/api/generate", self.host);
        debug!("Starting streaming generation with model {}", request.model);

        let request = request.with_stream(true);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        let response = check_status(response, Some(request.model.as_str())).await?;

        let (tx, rx) = mpsc::channel(100);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            // A JSON line may be split across network chunks.
            let mut pending = String::new();

            while let Some(chunk_result) = stream.next().await {
                let bytes = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("Stream error: {}", e);
                        return;
                    }
                };
                pending.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(newline) = pending.find('\n') {
                    let line: String = pending.drain(..=newline).collect();
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    match serde_json::from_str::<StreamChunk>(line) {
                        Ok(chunk) => {
                            if !chunk.response.is_empty() && tx.send(chunk.response).await.is_err() {
                                return; // Receiver dropped
                            }
                            if chunk.done {
                                return;
                            }
                        }
                        Err(e) => warn!("Failed to parse stream chunk: {}", e),
                    }
                }
            }
        });

        Ok(rx)
    }

    fn send_error(&self, e: reqwest::Error) -> OllamaError {
        if e.is_connect() {
            OllamaError::ServerNotRunning {
                host: self.host.clone(),
            }
        } else if e.is_timeout() {
            OllamaError::Timeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            OllamaError::Http(e)
        }
    }
}

/// Turn a non-success response into an error.
async fn check_status(response: Response, model: Option<&str>) -> OllamaResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    if let Some(model) = model {
        if text.contains("not found") || status.as_u16() == 404 {
            return Err(OllamaError::ModelNotFound {
                model: model.to_string(),
            });
        }
    }

    Err(OllamaError::ApiError {
        status: status.as_u16(),
        message: text,
    })
}

/// Whether an installed model name satisfies a configured one.
/// `llava` matches `llava:latest`; `llava:13b` matches only itself.
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || (!wanted.contains(':') && installed.starts_with(&format!("{}:", wanted)))
}
