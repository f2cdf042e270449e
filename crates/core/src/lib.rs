pub mod backend;
pub mod catalog;
pub mod generation;
pub mod pcm;
pub mod playback;
pub mod prompts;
pub mod state;

use state::{GenerationId, StoryRequest};

/// Work that [`state::StoryApp`] asks for but never performs itself.
///
/// Transitions only return one of these. The terminal runtime spawns the
/// Gemini calls and drives the speaker; remote results come back in tagged
/// with the [`GenerationId`] they were issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Generate story text and illustration for the request.
    Generate { id: GenerationId, request: StoryRequest },
    /// Narrate the story that was just shown.
    SynthesizeSpeech { id: GenerationId, story: String },
    /// Tear down any audio belonging to the result view.
    StopPlayback,
}
