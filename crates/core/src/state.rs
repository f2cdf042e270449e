//! Application State Machine
//!
//! `StoryApp` tracks which screen is showing, what the child picked, and what
//! came back from the generation service. Every transition is a synchronous
//! method that may hand a [`Command`] back to the runtime; the runtime
//! performs the side effect and reports the outcome through
//! [`StoryApp::generation_finished`] or [`StoryApp::speech_finished`].

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::Command;
use crate::catalog::{Category, StoryOption};
use crate::generation::{GenerationError, SpeechError};

pub const INCOMPLETE_SELECTION_MESSAGE: &str =
    "Por favor, escolha um herói, um mundo e uma aventura!";
pub const GENERATION_FAILED_MESSAGE: &str =
    "Oops! Algo deu errado ao criar a história. Tente novamente!";

/// The three screens of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Selection,
    Loading,
    Result,
}

/// Token identifying one generation attempt.
///
/// Completions carrying an older token than the current one are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenerationId(pub u64);

/// A fully specified story request: one option from each catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoryRequest {
    pub hero: &'static StoryOption,
    pub world: &'static StoryOption,
    pub quest: &'static StoryOption,
}

/// The child's picks so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub hero: Option<&'static StoryOption>,
    pub world: Option<&'static StoryOption>,
    pub quest: Option<&'static StoryOption>,
}

impl Selection {
    pub fn get(&self, category: Category) -> Option<&'static StoryOption> {
        match category {
            Category::Hero => self.hero,
            Category::World => self.world,
            Category::Quest => self.quest,
        }
    }

    fn set(&mut self, category: Category, option: &'static StoryOption) {
        let slot = match category {
            Category::Hero => &mut self.hero,
            Category::World => &mut self.world,
            Category::Quest => &mut self.quest,
        };
        *slot = Some(option);
    }

    /// Returns the request only when every slot is filled.
    pub fn complete(&self) -> Option<StoryRequest> {
        Some(StoryRequest {
            hero: self.hero?,
            world: self.world?,
            quest: self.quest?,
        })
    }

    pub fn missing(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.get(*c).is_none())
            .collect()
    }
}

/// Story text plus illustration, always produced together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub story: String,
    pub image_data_uri: String,
}

impl GenerationResult {
    /// Wraps a base64 PNG into a `data:` URI next to the story text.
    pub fn new(story: impl Into<String>, png_base64: &str) -> Self {
        Self {
            story: story.into(),
            image_data_uri: format!("data:image/png;base64,{png_base64}"),
        }
    }

    /// The base64 portion of the image URI.
    pub fn image_base64(&self) -> &str {
        self.image_data_uri
            .split_once(',')
            .map(|(_, data)| data)
            .unwrap_or_default()
    }
}

/// Base64 text of mono PCM16 speech at 24 kHz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload(String);

impl AudioPayload {
    pub fn new(base64: impl Into<String>) -> Self {
        Self(base64.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("this action is not available on the {current:?} screen")]
    WrongScreen { current: Screen },
}

/// Everything observable about a session, minus the generation token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub screen: Screen,
    pub selection: Selection,
    pub result: Option<GenerationResult>,
    pub audio: Option<AudioPayload>,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct StoryApp {
    screen: Screen,
    selection: Selection,
    result: Option<GenerationResult>,
    audio: Option<AudioPayload>,
    error: Option<String>,
    generation: GenerationId,
}

impl Default for StoryApp {
    fn default() -> Self {
        Self::new()
    }
}

impl StoryApp {
    pub fn new() -> Self {
        Self {
            screen: Screen::Selection,
            selection: Selection::default(),
            result: None,
            audio: None,
            error: None,
            generation: GenerationId(0),
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn result(&self) -> Option<&GenerationResult> {
        self.result.as_ref()
    }

    pub fn audio(&self) -> Option<&AudioPayload> {
        self.audio.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn generation(&self) -> GenerationId {
        self.generation
    }

    pub fn can_submit(&self) -> bool {
        self.screen == Screen::Selection && self.selection.complete().is_some()
    }

    /// The play control is enabled once speech has arrived.
    pub fn can_play(&self) -> bool {
        self.screen == Screen::Result && self.audio.is_some()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            screen: self.screen,
            selection: self.selection,
            result: self.result.clone(),
            audio: self.audio.clone(),
            error: self.error.clone(),
        }
    }

    fn expect_screen(&self, expected: Screen) -> Result<(), StateError> {
        if self.screen == expected {
            Ok(())
        } else {
            Err(StateError::WrongScreen {
                current: self.screen,
            })
        }
    }

    /// Fills one selection slot.
    pub fn select(
        &mut self,
        category: Category,
        option: &'static StoryOption,
    ) -> Result<(), StateError> {
        self.expect_screen(Screen::Selection)?;
        debug!(%category, option = option.id, "Option selected");
        self.selection.set(category, option);
        Ok(())
    }

    /// Starts a generation attempt if all three slots are filled.
    ///
    /// With an incomplete selection the validation message is set and no
    /// command is returned; the screen does not change.
    pub fn submit(&mut self) -> Result<Option<Command>, StateError> {
        self.expect_screen(Screen::Selection)?;
        let Some(request) = self.selection.complete() else {
            debug!(missing = ?self.selection.missing(), "Submit with incomplete selection");
            self.error = Some(INCOMPLETE_SELECTION_MESSAGE.to_string());
            return Ok(None);
        };

        self.error = None;
        self.audio = None;
        self.generation = GenerationId(self.generation.0 + 1);
        self.screen = Screen::Loading;
        info!(
            generation = self.generation.0,
            hero = request.hero.id,
            world = request.world.id,
            quest = request.quest.id,
            "Generating story"
        );
        Ok(Some(Command::Generate {
            id: self.generation,
            request,
        }))
    }

    fn is_current(&self, id: GenerationId, screen: Screen) -> bool {
        id == self.generation && self.screen == screen
    }

    /// Applies the outcome of a text+image generation.
    ///
    /// On success the result screen is shown and speech synthesis is
    /// requested. Stale outcomes are dropped.
    pub fn generation_finished(
        &mut self,
        id: GenerationId,
        outcome: Result<GenerationResult, GenerationError>,
    ) -> Option<Command> {
        if !self.is_current(id, Screen::Loading) {
            debug!(generation = id.0, "Ignoring stale generation result");
            return None;
        }
        match outcome {
            Ok(result) => {
                info!(generation = id.0, chars = result.story.len(), "Story ready");
                let story = result.story.clone();
                self.result = Some(result);
                self.screen = Screen::Result;
                Some(Command::SynthesizeSpeech { id, story })
            }
            Err(e) => {
                warn!(generation = id.0, error = %e, "Story generation failed");
                self.result = None;
                self.error = Some(GENERATION_FAILED_MESSAGE.to_string());
                self.screen = Screen::Selection;
                None
            }
        }
    }

    /// Stores synthesized speech for the story currently shown.
    ///
    /// Failures only leave the play control disabled.
    pub fn speech_finished(&mut self, id: GenerationId, outcome: Result<AudioPayload, SpeechError>) {
        if !self.is_current(id, Screen::Result) {
            debug!(generation = id.0, "Ignoring stale speech result");
            return;
        }
        match outcome {
            Ok(audio) => {
                info!(generation = id.0, "Story audio ready");
                self.audio = Some(audio);
            }
            Err(e) => warn!(generation = id.0, error = %e, "Speech synthesis failed"),
        }
    }

    /// Returns to the initial state. Any in-flight work becomes stale.
    pub fn reset(&mut self) -> Command {
        info!(from = ?self.screen, "Resetting session");
        self.screen = Screen::Selection;
        self.selection = Selection::default();
        self.result = None;
        self.audio = None;
        self.error = None;
        self.generation = GenerationId(self.generation.0 + 1);
        Command::StopPlayback
    }
}
