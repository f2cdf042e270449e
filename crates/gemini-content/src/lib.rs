//! Minimal client for the Gemini `generateContent` REST endpoint.
//!
//! Only the surface needed for one-shot text, image and speech generation is
//! modelled: a single user turn in, the candidates' parts out.

pub mod types;

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

pub use types::{
    Blob, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
    ResponseModality,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Errors that can occur when talking to the Gemini API.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Gemini API client bound to one API key.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    /// Creates a client against `base_url` with a per-request timeout.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    /// Sends one `generateContent` call for `model`.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, Error> {
        debug!(%model, "Sending generateContent request");
        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

fn api_error(status: u16, body: &str) -> Error {
    let message = match serde_json::from_str::<types::ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("{code}: {}", envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => body.to_string(),
    };
    Error::Api { status, message }
}
