//! The event loop that runs the story app in a terminal.
//!
//! `Runtime` owns the state machine and executes the [`Command`]s it hands
//! back: generation and speech calls run on spawned tasks and report through
//! an unbounded channel, while playback stays on the loop's own task.

use anyhow::Result;
use magic_stories_core::Command;
use magic_stories_core::catalog::{self, Category};
use magic_stories_core::generation::{GenerationError, SpeechError, StoryGenerator};
use magic_stories_core::playback::{
    AudioBackend, EndedNotifier, PlayOutcome, PlaybackManager, SessionId,
};
use magic_stories_core::state::{
    AudioPayload, GenerationId, GenerationResult, Screen, StateError, StoryApp,
};
use std::io::Write;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span};

use crate::input::{InputError, UserCommand};
use crate::ui::{self, AudioControl, ScreenView};

/// Completions delivered back to the loop.
#[derive(Debug)]
pub enum AppEvent {
    GenerationFinished {
        id: GenerationId,
        outcome: Result<GenerationResult, GenerationError>,
    },
    SpeechFinished {
        id: GenerationId,
        outcome: Result<AudioPayload, SpeechError>,
    },
    PlaybackEnded(SessionId),
}

pub struct Runtime<B: AudioBackend + Clone, W: Write> {
    app: StoryApp,
    generator: StoryGenerator,
    /// `None` when audio output is disabled.
    audio_backend: Option<B>,
    /// Playback for the story currently shown; dropped when it goes away.
    player: Option<PlaybackManager<B>>,
    events: mpsc::UnboundedSender<AppEvent>,
    out: W,
}

impl<B, W> Runtime<B, W>
where
    B: AudioBackend + Clone,
    W: Write,
{
    /// Creates the runtime together with the receiving end of its event
    /// channel, which is passed back into [`Runtime::run`].
    pub fn new(
        generator: StoryGenerator,
        audio_backend: Option<B>,
        out: W,
    ) -> (Self, mpsc::UnboundedReceiver<AppEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let runtime = Self {
            app: StoryApp::new(),
            generator,
            audio_backend,
            player: None,
            events,
            out,
        };
        (runtime, events_rx)
    }

    pub fn app(&self) -> &StoryApp {
        &self.app
    }

    pub fn player(&self) -> Option<&PlaybackManager<B>> {
        self.player.as_ref()
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn audio_control(&self) -> AudioControl {
        match &self.player {
            Some(player) if player.is_available() => match self.app.audio() {
                Some(_) => AudioControl::Ready {
                    playing: player.is_playing(),
                },
                None => AudioControl::Pending,
            },
            _ => AudioControl::Unavailable,
        }
    }

    /// Runs until the user quits, input ends or Ctrl-C is pressed.
    pub async fn run(
        mut self,
        mut input: mpsc::UnboundedReceiver<String>,
        mut events: mpsc::UnboundedReceiver<AppEvent>,
    ) -> Result<()> {
        self.render()?;
        loop {
            tokio::select! {
                line = input.recv() => match line {
                    Some(line) => {
                        if self.handle_line(&line)?.is_break() {
                            info!("Quit requested");
                            break;
                        }
                    }
                    None => {
                        info!("Input closed");
                        break;
                    }
                },
                Some(event) = events.recv() => self.handle_event(event)?,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Applies one line of user input.
    pub fn handle_line(&mut self, line: &str) -> Result<ControlFlow<()>> {
        let command = match line.parse::<UserCommand>() {
            Ok(command) => command,
            Err(InputError::Empty) => return Ok(ControlFlow::Continue(())),
            Err(e) => {
                self.hint(&e.to_string())?;
                return Ok(ControlFlow::Continue(()));
            }
        };
        debug!(?command, "User command");

        match command {
            UserCommand::Quit => return Ok(ControlFlow::Break(())),
            UserCommand::Help => {
                writeln!(self.out, "{}", ui::HELP)?;
                self.out.flush()?;
            }
            UserCommand::Select(category, query) => self.select(category, &query)?,
            UserCommand::Create => match self.app.submit() {
                Ok(command) => {
                    if let Some(command) = command {
                        self.execute(command);
                    }
                    self.render()?;
                }
                Err(e) => self.wrong_screen(e)?,
            },
            UserCommand::Play => self.toggle_playback()?,
            UserCommand::New => {
                let command = self.app.reset();
                self.execute(command);
                self.render()?;
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Applies a completion from a spawned task or the audio callback.
    pub fn handle_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::GenerationFinished { id, outcome } => {
                let before = self.app.screen();
                if let Some(command) = self.app.generation_finished(id, outcome) {
                    self.execute(command);
                }
                if self.app.screen() != before {
                    self.render()?;
                }
            }
            AppEvent::SpeechFinished { id, outcome } => {
                let had_audio = self.app.audio().is_some();
                self.app.speech_finished(id, outcome);
                if !had_audio && self.app.audio().is_some() {
                    if let AudioControl::Ready { .. } = self.audio_control() {
                        self.hint("🔊 A narração está pronta! Digite 'ouvir'.")?;
                    }
                }
            }
            AppEvent::PlaybackEnded(session) => {
                let ended = self
                    .player
                    .as_mut()
                    .is_some_and(|player| player.playback_ended(session));
                if ended {
                    self.hint("Fim da narração. ✨")?;
                }
            }
        }
        Ok(())
    }

    fn select(&mut self, category: Category, query: &str) -> Result<()> {
        let Some(option) = catalog::resolve(category, query) else {
            return self.hint(&format!("Não encontrei {category} \"{query}\"."));
        };
        match self.app.select(category, option) {
            Ok(()) => self.render(),
            Err(e) => self.wrong_screen(e),
        }
    }

    fn toggle_playback(&mut self) -> Result<()> {
        if self.app.screen() != Screen::Result {
            return self.wrong_screen(StateError::WrongScreen {
                current: self.app.screen(),
            });
        }
        let outcome = match (self.app.audio(), self.player.as_mut()) {
            (None, _) => None,
            (Some(audio), Some(player)) => Some(player.play(audio)),
            (Some(_), None) => Some(PlayOutcome::Unavailable),
        };
        match outcome {
            None => self.hint("A narração ainda está sendo preparada..."),
            Some(PlayOutcome::Started(session)) => {
                info!(session = session.0, "Narration started");
                self.hint("🔊 Tocando a narração... ('ouvir' para parar)")
            }
            Some(PlayOutcome::Stopped) => self.hint("⏹️  Narração parada."),
            Some(PlayOutcome::Unavailable) => self.hint("🔇 Narração indisponível."),
            Some(PlayOutcome::Failed(_)) => self.hint("Não foi possível tocar a narração."),
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Generate { id, request } => {
                let generator = self.generator.clone();
                let events = self.events.clone();
                tokio::spawn(
                    async move {
                        let outcome = generator.generate(&request).await;
                        let _ = events.send(AppEvent::GenerationFinished { id, outcome });
                    }
                    .instrument(info_span!("generation", id = id.0)),
                );
            }
            Command::SynthesizeSpeech { id, story } => {
                self.mount_player();
                let generator = self.generator.clone();
                let events = self.events.clone();
                tokio::spawn(
                    async move {
                        let outcome = generator.synthesize(&story).await;
                        let _ = events.send(AppEvent::SpeechFinished { id, outcome });
                    }
                    .instrument(info_span!("speech", id = id.0)),
                );
            }
            Command::StopPlayback => {
                if self.player.take().is_some() {
                    debug!("Story audio torn down");
                }
            }
        }
    }

    /// Sets up playback for the story view that just appeared.
    fn mount_player(&mut self) {
        let Some(backend) = self.audio_backend.clone() else {
            return;
        };
        let events = self.events.clone();
        let notifier: EndedNotifier = Arc::new(move |session| {
            let _ = events.send(AppEvent::PlaybackEnded(session));
        });
        let mut player = PlaybackManager::new(backend, notifier);
        player.acquire_context();
        self.player = Some(player);
    }

    fn render(&mut self) -> Result<()> {
        let view = ScreenView::for_app(&self.app, self.audio_control());
        writeln!(self.out, "\n{view}")?;
        self.out.flush()?;
        Ok(())
    }

    fn hint(&mut self, message: &str) -> Result<()> {
        writeln!(self.out, "» {message}")?;
        self.out.flush()?;
        Ok(())
    }

    fn wrong_screen(&mut self, error: StateError) -> Result<()> {
        debug!(%error, "Command not available");
        self.hint("Isso não dá para fazer agora. Digite 'ajuda' para ver os comandos.")
    }
}
