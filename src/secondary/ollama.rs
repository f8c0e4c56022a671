//! Secondary classifier backed by a local Ollama server.
//!
//! Uses the non-streaming `/api/generate` endpoint with a low temperature
//! and a short completion budget; the answer is a small JSON object.

use super::parse::parse_verdict;
use super::{ConfidenceScale, SecondaryClassifier, SecondaryRequest, SecondaryVerdict, build_prompt};
use crate::error::SecondaryError;
use crate::utils::clip_for_log;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "mistral";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const TEMPERATURE: f32 = 0.1;
const NUM_PREDICT: u32 = 300;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

/// Classifier backed by a model served from a local Ollama instance.
#[derive(Debug, Clone)]
pub struct OllamaClassifier {
    endpoint: String,
    model: String,
    scale: ConfidenceScale,
    client: Client,
}

impl OllamaClassifier {
    /// # Errors
    ///
    /// Fails only if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        scale: ConfidenceScale,
        timeout: Duration,
    ) -> Result<Self, SecondaryError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            scale,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check that the server answers and has the configured model pulled.
    ///
    /// Model names match with or without the `:latest` tag.
    #[instrument(level = "info", skip_all, fields(endpoint = %self.endpoint, model = %self.model))]
    pub async fn ping(&self) -> Result<(), SecondaryError> {
        let url = format!("{}/api/tags", self.endpoint);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SecondaryError::Status {
                status: status.as_u16(),
                body: clip_for_log(&body, 200),
            });
        }
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| SecondaryError::Envelope(e.to_string()))?;
        let wanted = self.model.trim_end_matches(":latest");
        if tags
            .models
            .iter()
            .any(|m| m.name.trim_end_matches(":latest") == wanted)
        {
            info!(available = tags.models.len(), "Secondary classifier reachable");
            Ok(())
        } else {
            Err(SecondaryError::ModelNotAvailable(self.model.clone()))
        }
    }

    /// Send one prompt and return the raw completion text.
    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    pub async fn generate(&self, prompt: &str) -> Result<String, SecondaryError> {
        let url = format!("{}/api/generate", self.endpoint);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: TEMPERATURE,
                num_predict: NUM_PREDICT,
            },
        };

        let t0 = Instant::now();
        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SecondaryError::ModelNotAvailable(self.model.clone()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Generate call failed");
            return Err(SecondaryError::Status {
                status: status.as_u16(),
                body: clip_for_log(&text, 200),
            });
        }
        let envelope: GenerateResponse = response
            .json()
            .await
            .map_err(|e| SecondaryError::Envelope(e.to_string()))?;
        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            output = %clip_for_log(&envelope.response, 300),
            "Generate call returned"
        );
        Ok(envelope.response)
    }
}

impl SecondaryClassifier for OllamaClassifier {
    async fn classify(
        &self,
        request: &SecondaryRequest<'_>,
    ) -> Result<SecondaryVerdict, SecondaryError> {
        let prompt = build_prompt(request, self.scale);
        let raw = self.generate(&prompt).await?;
        Ok(parse_verdict(&raw))
    }
}
