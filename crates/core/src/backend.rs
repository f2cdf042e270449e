use anyhow::Result;
use async_trait::async_trait;
use gemini_content::{GeminiClient, GenerateContentRequest, GenerationConfig};
use std::f32::consts::PI;
use tracing::{debug, instrument};

use crate::pcm::{self, SPEECH_SAMPLE_RATE};

/// The remote generative service, one method per kind of output.
///
/// Each call returns `Ok(None)` when the service answered but the response
/// held nothing usable (no text, no inline data).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoryBackend: Send + Sync {
    /// Generates narrative text for `prompt`.
    async fn generate_text(&self, prompt: &str) -> Result<Option<String>>;

    /// Generates an illustration, returned as base64 PNG data.
    async fn generate_image(&self, prompt: &str) -> Result<Option<String>>;

    /// Synthesizes speech, returned as base64 mono PCM16 at 24 kHz.
    async fn synthesize_speech(&self, prompt: &str) -> Result<Option<String>>;
}

/// Model identifiers used for each call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSet {
    pub text: String,
    pub image: String,
    pub speech: String,
}

impl Default for ModelSet {
    fn default() -> Self {
        Self {
            text: "gemini-3-flash-preview".to_string(),
            image: "gemini-2.5-flash-image".to_string(),
            speech: "gemini-2.5-flash-preview-tts".to_string(),
        }
    }
}

/// An implementation of `StoryBackend` on top of the Gemini REST API.
pub struct GeminiBackend {
    client: GeminiClient,
    models: ModelSet,
    voice: String,
}

impl GeminiBackend {
    /// # Arguments
    ///
    /// * `client` - An authenticated Gemini client.
    /// * `models` - The model ids for text, image and speech calls.
    /// * `voice` - The prebuilt voice used for narration (e.g. "Puck").
    pub fn new(client: GeminiClient, models: ModelSet, voice: impl Into<String>) -> Self {
        Self {
            client,
            models,
            voice: voice.into(),
        }
    }
}

#[async_trait]
impl StoryBackend for GeminiBackend {
    #[instrument(skip_all, fields(model = %self.models.text))]
    async fn generate_text(&self, prompt: &str) -> Result<Option<String>> {
        let request = GenerateContentRequest::from_text(prompt);
        let response = self.client.generate_content(&self.models.text, &request).await?;
        let text = response.text();
        debug!(chars = text.as_ref().map_or(0, String::len), "Text response received");
        Ok(text)
    }

    #[instrument(skip_all, fields(model = %self.models.image))]
    async fn generate_image(&self, prompt: &str) -> Result<Option<String>> {
        let request = GenerateContentRequest::from_text(prompt);
        let response = self.client.generate_content(&self.models.image, &request).await?;
        let image = response.find_inline_data().map(|blob| blob.data.clone());
        debug!(found = image.is_some(), "Image response received");
        Ok(image)
    }

    #[instrument(skip_all, fields(model = %self.models.speech, voice = %self.voice))]
    async fn synthesize_speech(&self, prompt: &str) -> Result<Option<String>> {
        let request = GenerateContentRequest::from_text(prompt)
            .with_generation_config(GenerationConfig::speech(&self.voice));
        let response = self
            .client
            .generate_content(&self.models.speech, &request)
            .await?;
        let audio = response.leading_inline_data().map(|blob| blob.data.clone());
        debug!(found = audio.is_some(), "Speech response received");
        Ok(audio)
    }
}

/// A `StoryBackend` that answers every call with canned data.
///
/// Useful for running the app without network access or API costs.
pub struct OfflineStoryBackend {
    pub story: String,
    pub image_base64: String,
    pub audio_base64: Option<String>,
}

impl Default for OfflineStoryBackend {
    fn default() -> Self {
        Self {
            story: "Era uma vez um herói muito corajoso que viveu uma aventura mágica \
                    e voltou para casa feliz. Fim!"
                .to_string(),
            // 1x1 transparent PNG.
            image_base64: "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII="
                .to_string(),
            audio_base64: Some(chime()),
        }
    }
}

/// A short fading tone, standing in for narration when offline.
fn chime() -> String {
    let rate = SPEECH_SAMPLE_RATE as f32;
    let samples: Vec<f32> = (0..SPEECH_SAMPLE_RATE)
        .map(|i| {
            let t = i as f32 / rate;
            (2.0 * PI * 660.0 * t).sin() * 0.2 * (1.0 - t)
        })
        .collect();
    pcm::encode_pcm16_base64(&samples)
}

#[async_trait]
impl StoryBackend for OfflineStoryBackend {
    async fn generate_text(&self, _prompt: &str) -> Result<Option<String>> {
        Ok(Some(self.story.clone()))
    }

    async fn generate_image(&self, _prompt: &str) -> Result<Option<String>> {
        Ok(Some(self.image_base64.clone()))
    }

    async fn synthesize_speech(&self, _prompt: &str) -> Result<Option<String>> {
        Ok(self.audio_base64.clone())
    }
}
