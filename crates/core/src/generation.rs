//! Story Generation Client
//!
//! Turns a [`StoryRequest`] into a [`GenerationResult`] by asking the backend
//! for text and an illustration at the same time, and separately turns the
//! finished story into narration audio.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

use crate::backend::StoryBackend;
use crate::prompts;
use crate::state::{AudioPayload, GenerationResult, StoryRequest};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("story text request failed: {0}")]
    Text(#[source] anyhow::Error),

    #[error("illustration request failed: {0}")]
    Image(#[source] anyhow::Error),

    #[error("the service returned an empty story")]
    EmptyStory,

    #[error("the service returned no image data")]
    MissingImage,
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech request failed: {0}")]
    Request(#[source] anyhow::Error),

    #[error("the service returned no audio data")]
    MissingAudio,
}

#[derive(Clone)]
pub struct StoryGenerator {
    backend: Arc<dyn StoryBackend>,
}

impl StoryGenerator {
    pub fn new(backend: Arc<dyn StoryBackend>) -> Self {
        Self { backend }
    }

    /// Generates story text and illustration concurrently.
    ///
    /// Fails as soon as either request fails; a result is only returned when
    /// both a non-empty story and image data are present.
    #[instrument(skip_all, fields(hero = request.hero.id, world = request.world.id, quest = request.quest.id))]
    pub async fn generate(&self, request: &StoryRequest) -> Result<GenerationResult, GenerationError> {
        let story_prompt = prompts::story_prompt(request);
        let image_prompt = prompts::illustration_prompt(request);

        let text = async {
            self.backend
                .generate_text(&story_prompt)
                .await
                .map_err(GenerationError::Text)
        };
        let image = async {
            self.backend
                .generate_image(&image_prompt)
                .await
                .map_err(GenerationError::Image)
        };
        let (story, image) = tokio::try_join!(text, image)?;

        let story = story
            .filter(|s| !s.trim().is_empty())
            .ok_or(GenerationError::EmptyStory)?;
        let image = image
            .filter(|data| !data.is_empty())
            .ok_or(GenerationError::MissingImage)?;

        info!(chars = story.len(), image_bytes = image.len(), "Story and illustration generated");
        Ok(GenerationResult::new(story, &image))
    }

    /// Narrates `story`. Best effort: callers treat failures as "no audio".
    #[instrument(skip_all)]
    pub async fn synthesize(&self, story: &str) -> Result<AudioPayload, SpeechError> {
        let prompt = prompts::speech_prompt(story);
        let audio = self
            .backend
            .synthesize_speech(&prompt)
            .await
            .map_err(SpeechError::Request)?
            .filter(|data| !data.is_empty())
            .ok_or(SpeechError::MissingAudio)?;
        Ok(AudioPayload::new(audio))
    }
}
