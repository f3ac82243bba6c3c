use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use moka::future::Cache;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::config::{IMAGE_DESCRIPTION_MODEL_CANDIDATES, MAX_ATTACHMENT_CONTEXT_CHARS};
use crate::pipeline::normalize::clean_and_truncate;
use crate::prompts::Prompts;

/// Closed error taxonomy at the vision-provider boundary. The fallback loop
/// only continues past `ModelUnavailable`; every other kind aborts the
/// summarization.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("transient provider failure: {0}")]
    Transient(String),
    #[error("provider failure: {0}")]
    Fatal(String),
}

/// Resolved endpoint for one model id. Built once per model and cached for
/// the life of the process.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    pub name: String,
    pub endpoint: String,
}

impl ModelHandle {
    fn resolve(name: &str) -> Self {
        ModelHandle {
            name: name.to_string(),
            endpoint: format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{name}:generateContent"
            ),
        }
    }
}

#[async_trait]
pub trait VisionApi: Send + Sync {
    async fn generate_content(
        &self,
        handle: &ModelHandle,
        image_b64: &str,
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, ProviderError>;
}

/// Gemini `generateContent` over REST.
pub struct GeminiVision {
    http: reqwest::Client,
    api_key: String,
}

impl GeminiVision {
    pub fn new(api_key: String) -> Self {
        GeminiVision {
            http: reqwest::Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl VisionApi for GeminiVision {
    async fn generate_content(
        &self,
        handle: &ModelHandle,
        image_b64: &str,
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let body = json!({
            "contents": [{
                "parts": [
                    { "inline_data": { "mime_type": mime_type, "data": image_b64 } },
                    { "text": prompt }
                ]
            }]
        });

        let response = self
            .http
            .post(&handle.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                404 => ProviderError::ModelUnavailable(message),
                429 => ProviderError::RateLimited(message),
                s if s >= 500 => ProviderError::Transient(message),
                _ => ProviderError::Fatal(message),
            });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Fatal(e.to_string()))?;

        let text = payload["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(text)
    }
}

/// Owns the vision credential, the ordered candidate list, the per-model
/// handle cache, and the once-per-process missing-key warn latch. Built at
/// startup and shared across requests via the app state.
pub struct VisionSummarizer {
    api: Option<Arc<dyn VisionApi>>,
    candidates: Vec<String>,
    handles: Cache<String, ModelHandle>,
    logged_missing_key: AtomicBool,
}

impl VisionSummarizer {
    pub fn new(api_key: Option<String>) -> Self {
        let api: Option<Arc<dyn VisionApi>> =
            api_key.map(|key| Arc::new(GeminiVision::new(key)) as Arc<dyn VisionApi>);
        Self::with_api(
            api,
            IMAGE_DESCRIPTION_MODEL_CANDIDATES
                .iter()
                .map(|name| name.to_string())
                .collect(),
        )
    }

    pub fn with_api(api: Option<Arc<dyn VisionApi>>, candidates: Vec<String>) -> Self {
        VisionSummarizer {
            api,
            candidates,
            handles: Cache::new(16),
            logged_missing_key: AtomicBool::new(false),
        }
    }

    pub fn has_cached_handle(&self, model: &str) -> bool {
        self.handles.contains_key(model)
    }

    /// Describes an image for financial-advisory context. Candidates are
    /// tried most-capable first; an unavailable model is dropped from the
    /// handle cache and the next one tried, while any other provider error
    /// ends the attempt. Returns `None` whenever no usable summary was
    /// produced.
    pub async fn describe_image(&self, bytes: &[u8], mime_type: &str) -> Option<String> {
        let Some(api) = &self.api else {
            if !self.logged_missing_key.swap(true, Ordering::Relaxed) {
                warn!("Image description skipped: GOOGLE_API_KEY is not configured.");
            }
            return None;
        };

        let image_b64 = BASE64.encode(bytes);
        let mut last_error = None;

        for model_name in &self.candidates {
            let handle = self
                .handles
                .get_with(model_name.clone(), async { ModelHandle::resolve(model_name) })
                .await;

            match api
                .generate_content(&handle, &image_b64, mime_type, Prompts::IMAGE_DESCRIPTION)
                .await
            {
                Ok(text) => {
                    if text.trim().is_empty() {
                        return None;
                    }
                    return Some(clean_and_truncate(&text, MAX_ATTACHMENT_CONTEXT_CHARS));
                }
                Err(ProviderError::ModelUnavailable(message)) => {
                    self.handles.invalidate(model_name).await;
                    last_error = Some(message);
                    continue;
                }
                Err(e) => {
                    error!("Failed to generate image description: {e}");
                    return None;
                }
            }
        }

        if let Some(message) = last_error {
            warn!(
                "Image description skipped: no supported multimodal models were available: {message}"
            );
        }

        None
    }
}
