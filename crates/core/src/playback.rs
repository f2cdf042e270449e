//! Audio Playback Manager
//!
//! Owns the single audio output context for a result view and drives
//! exclusive playback of the synthesized speech. The platform side is
//! abstracted behind [`AudioBackend`], [`OutputContext`] and [`OutputSource`]
//! so the lifecycle rules can be exercised without a sound card.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::pcm::{self, SPEECH_SAMPLE_RATE};
use crate::state::AudioPayload;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),

    #[error("invalid base64 audio payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("PCM16 payload has an odd byte length ({0})")]
    OddLength(usize),

    #[error("failed to build resampler: {0}")]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),

    #[error("failed to resample audio: {0}")]
    Resample(#[from] rubato::ResampleError),

    #[error("audio output failed: {0}")]
    Output(String),
}

/// Lifecycle state of an output context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    /// Created but not allowed to produce sound yet (e.g. autoplay policy).
    Suspended,
    Closed,
}

/// Decoded mono samples ready to be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Identity of one playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

/// Called from the output side once a source has rendered its last sample.
pub type EndedCallback = Box<dyn FnOnce() + Send + 'static>;

/// Receives completion notices for playback sessions.
pub type EndedNotifier = Arc<dyn Fn(SessionId) + Send + Sync>;

/// Opens output contexts on a platform.
pub trait AudioBackend {
    type Context: OutputContext;

    fn open(&self, sample_rate: u32) -> Result<Self::Context, PlaybackError>;
}

/// A platform audio output, the equivalent of one audio graph destination.
pub trait OutputContext {
    type Source: OutputSource;

    fn state(&self) -> ContextState;

    fn resume(&mut self) -> Result<(), PlaybackError>;

    /// Creates a source bound to `buffer`, connects it to the destination and
    /// starts it. `on_ended` must be invoked at most once, after the last
    /// sample has been rendered, and never after [`OutputSource::stop`].
    fn start(
        &mut self,
        buffer: SampleBuffer,
        on_ended: EndedCallback,
    ) -> Result<Self::Source, PlaybackError>;

    fn close(&mut self);
}

/// A running playback source.
pub trait OutputSource {
    /// Halts rendering immediately.
    fn stop(&mut self);
}

/// Result of a play request.
#[derive(Debug)]
pub enum PlayOutcome {
    Started(SessionId),
    /// A session was active, so the request acted as a stop.
    Stopped,
    /// No output context could be acquired.
    Unavailable,
    Failed(PlaybackError),
}

struct ActiveSession<S> {
    id: SessionId,
    source: S,
    /// Set from the output side as soon as the last sample is rendered,
    /// before the runtime gets to deliver the ended notice.
    finished: Arc<AtomicBool>,
}

impl<S> ActiveSession<S> {
    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// Drives at most one playback session on one lazily acquired context.
pub struct PlaybackManager<B: AudioBackend> {
    backend: B,
    context: Option<B::Context>,
    active: Option<ActiveSession<<B::Context as OutputContext>::Source>>,
    next_session: u64,
    notifier: EndedNotifier,
    unavailable: bool,
}

impl<B: AudioBackend> PlaybackManager<B> {
    pub fn new(backend: B, notifier: EndedNotifier) -> Self {
        Self {
            backend,
            context: None,
            active: None,
            next_session: 0,
            notifier,
            unavailable: false,
        }
    }

    /// Opens the output context on first use. Returns whether one is held.
    ///
    /// A failure is remembered, so later calls do not retry the device.
    pub fn acquire_context(&mut self) -> bool {
        if self.context.is_some() {
            return true;
        }
        if self.unavailable {
            return false;
        }
        match self.backend.open(SPEECH_SAMPLE_RATE) {
            Ok(context) => {
                info!(sample_rate = SPEECH_SAMPLE_RATE, "Audio output context acquired");
                self.context = Some(context);
                true
            }
            Err(e) => {
                error!(error = %e, "Audio output is not supported here; playback disabled");
                self.unavailable = true;
                false
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.context.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.active.as_ref().is_some_and(|s| !s.is_finished())
    }

    /// Toggles playback of `payload`.
    pub fn play(&mut self, payload: &AudioPayload) -> PlayOutcome {
        if self.active.as_ref().is_some_and(|s| s.is_finished()) {
            debug!("Previous session already rendered to the end");
            self.active = None;
        }
        if self.active.is_some() {
            self.stop();
            return PlayOutcome::Stopped;
        }
        if !self.acquire_context() {
            return PlayOutcome::Unavailable;
        }
        match self.start_session(payload) {
            Ok(id) => PlayOutcome::Started(id),
            Err(e) => {
                warn!(error = %e, "Could not play story audio");
                PlayOutcome::Failed(e)
            }
        }
    }

    fn start_session(&mut self, payload: &AudioPayload) -> Result<SessionId, PlaybackError> {
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| PlaybackError::Unavailable("no output context".to_string()))?;

        match context.state() {
            ContextState::Suspended => context.resume()?,
            ContextState::Closed => {
                return Err(PlaybackError::Unavailable("output context is closed".to_string()));
            }
            ContextState::Running => {}
        }

        let samples = pcm::decode_pcm16_base64(payload.as_str())?;
        let buffer = SampleBuffer {
            samples,
            sample_rate: SPEECH_SAMPLE_RATE,
        };
        debug!(seconds = buffer.duration_secs(), "Decoded story audio");

        self.next_session += 1;
        let id = SessionId(self.next_session);
        let notifier = self.notifier.clone();
        let finished = Arc::new(AtomicBool::new(false));
        let done = finished.clone();
        let source = context.start(
            buffer,
            Box::new(move || {
                done.store(true, Ordering::Release);
                notifier(id);
            }),
        )?;
        self.active = Some(ActiveSession {
            id,
            source,
            finished,
        });
        Ok(id)
    }

    /// Stops the active session, if any.
    pub fn stop(&mut self) {
        if let Some(mut session) = self.active.take() {
            session.source.stop();
            debug!(session = session.id.0, "Playback stopped");
        }
    }

    /// Completion path for a session that rendered to the end.
    ///
    /// Notices for a session that is no longer active are ignored. Returns
    /// whether the notice ended the current session.
    pub fn playback_ended(&mut self, id: SessionId) -> bool {
        if self.active.as_ref().is_some_and(|s| s.id == id) {
            self.active = None;
            debug!(session = id.0, "Playback finished");
            return true;
        }
        false
    }
}

impl<B: AudioBackend> Drop for PlaybackManager<B> {
    fn drop(&mut self) {
        self.stop();
        if let Some(mut context) = self.context.take() {
            if context.state() != ContextState::Closed {
                context.close();
            }
        }
    }
}
