//! Adapters exposing [`OllamaClient`] through the pipeline's collaborator traits.

use crate::client::OllamaClient;
use crate::types::{GenerateOptions, GenerateRequest};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lectern_core::{Captioner, Completer, Embedder, Error, Result};

const CAPTION_PROMPT: &str = "This image is a figure from course material. \
Describe what it shows in 2-4 sentences: the type of visual, the data or concept it \
illustrates, and any labels, axes or key values. Answer with the description only.";

/// Text embeddings from one Ollama model.
#[derive(Clone)]
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

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client
            .embed(&self.model, text)
            .await
            .map_err(|e| Error::Embedding(e.to_string()))
    }
}

/// Figure descriptions from an Ollama vision model.
#[derive(Clone)]
pub struct OllamaCaptioner {
    client: OllamaClient,
    model: String,
}

impl OllamaCaptioner {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Captioner for OllamaCaptioner {
    async fn caption(&self, image: &[u8], _media_type: &str) -> Result<String> {
        let request = GenerateRequest::new(&self.model, CAPTION_PROMPT)
            .with_image(STANDARD.encode(image))
            .with_options(GenerateOptions::new().with_temperature(0.2).with_num_predict(300));

        let response = self
            .client
            .generate(request)
            .await
            .map_err(|e| Error::Description(e.to_string()))?;

        let text = response.response.trim();
        if text.is_empty() {
            return Err(Error::Description(format!(
                "{} returned an empty description",
                self.model
            )));
        }
        Ok(text.to_string())
    }
}

/// Answer synthesis with an Ollama chat model.
#[derive(Clone)]
pub struct OllamaCompleter {
    client: OllamaClient,
    model: String,
    system: Option<String>,
    temperature: f32,
}

impl OllamaCompleter {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            system: None,
            temperature: 0.3,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The request [`Completer::complete`] would send.
    pub fn request(&self, prompt: &str, image: Option<&[u8]>) -> GenerateRequest {
        let mut request = GenerateRequest::new(&self.model, prompt)
            .with_options(GenerateOptions::new().with_temperature(self.temperature));
        if let Some(system) = &self.system {
            request = request.with_system(system);
        }
        if let Some(image) = image {
            request = request.with_image(STANDARD.encode(image));
        }
        request
    }
}

#[async_trait]
impl Completer for OllamaCompleter {
    async fn complete(&self, prompt: &str, image: Option<&[u8]>) -> Result<String> {
        self.client
            .generate(self.request(prompt, image))
            .await
            .map(|response| response.response)
            .map_err(|e| Error::Generation(e.to_string()))
    }
}
