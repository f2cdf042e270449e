//! End-to-end flows through the runtime with in-memory backends.
//!
//! Stories come from `OfflineStoryBackend` (or a failing backend), audio goes
//! to a fake output that records what happened and lets the test decide when
//! a narration "finishes".

use anyhow::anyhow;
use async_trait::async_trait;
use magic_stories_app::runtime::{AppEvent, Runtime};
use magic_stories_app::ui::AudioControl;
use magic_stories_core::backend::{OfflineStoryBackend, StoryBackend};
use magic_stories_core::generation::StoryGenerator;
use magic_stories_core::playback::{
    AudioBackend, ContextState, EndedCallback, OutputContext, OutputSource, PlaybackError,
    SampleBuffer,
};
use magic_stories_core::state::{GENERATION_FAILED_MESSAGE, INCOMPLETE_SELECTION_MESSAGE, Screen};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
struct Calls {
    opened: u32,
    started: u32,
    stopped: u32,
    closed: u32,
    pending_end: Option<EndedCallback>,
}

#[derive(Clone, Default)]
struct FakeOutput(Arc<Mutex<Calls>>);

impl FakeOutput {
    fn calls(&self) -> std::sync::MutexGuard<'_, Calls> {
        self.0.lock().unwrap()
    }

    /// Simulates the device rendering the last sample.
    fn finish(&self) {
        let done = self.calls().pending_end.take().expect("nothing is playing");
        done();
    }
}

struct FakeContext(Arc<Mutex<Calls>>);
struct FakeSource(Arc<Mutex<Calls>>);

impl AudioBackend for FakeOutput {
    type Context = FakeContext;

    fn open(&self, _sample_rate: u32) -> Result<FakeContext, PlaybackError> {
        self.calls().opened += 1;
        Ok(FakeContext(self.0.clone()))
    }
}

impl OutputContext for FakeContext {
    type Source = FakeSource;

    fn state(&self) -> ContextState {
        ContextState::Running
    }

    fn resume(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn start(
        &mut self,
        buffer: SampleBuffer,
        on_ended: EndedCallback,
    ) -> Result<FakeSource, PlaybackError> {
        assert!(!buffer.samples.is_empty());
        let mut calls = self.0.lock().unwrap();
        calls.started += 1;
        calls.pending_end = Some(on_ended);
        Ok(FakeSource(self.0.clone()))
    }

    fn close(&mut self) {
        self.0.lock().unwrap().closed += 1;
    }
}

impl OutputSource for FakeSource {
    fn stop(&mut self) {
        let mut calls = self.0.lock().unwrap();
        calls.stopped += 1;
        calls.pending_end = None;
    }
}

struct BrokenBackend;

#[async_trait]
impl StoryBackend for BrokenBackend {
    async fn generate_text(&self, _prompt: &str) -> anyhow::Result<Option<String>> {
        Err(anyhow!("503 UNAVAILABLE"))
    }

    async fn generate_image(&self, _prompt: &str) -> anyhow::Result<Option<String>> {
        Ok(Some("iVBORw0KGgo=".to_string()))
    }

    async fn synthesize_speech(&self, _prompt: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

type TestRuntime = Runtime<FakeOutput, Vec<u8>>;

fn runtime(
    backend: Arc<dyn StoryBackend>,
    output: Option<FakeOutput>,
) -> (TestRuntime, mpsc::UnboundedReceiver<AppEvent>) {
    Runtime::new(StoryGenerator::new(backend), output, Vec::new())
}

fn offline() -> Arc<dyn StoryBackend> {
    Arc::new(OfflineStoryBackend::default())
}

fn send(rt: &mut TestRuntime, line: &str) {
    assert!(rt.handle_line(line).unwrap().is_continue(), "{line} ended the loop");
}

fn printed(rt: &TestRuntime) -> String {
    String::from_utf8_lossy(rt.output()).into_owned()
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<AppEvent>) -> AppEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

async fn pump(rt: &mut TestRuntime, events: &mut mpsc::UnboundedReceiver<AppEvent>) {
    let event = next_event(events).await;
    rt.handle_event(event).unwrap();
}

/// Selects a full set of options and submits.
fn start_story(rt: &mut TestRuntime) {
    send(rt, "h 1");
    send(rt, "mundo castelo");
    send(rt, "aventura Tesouro");
    send(rt, "criar");
    assert_eq!(rt.app().screen(), Screen::Loading);
}

#[tokio::test]
async fn full_story_with_narration() {
    let output = FakeOutput::default();
    let (mut rt, mut events) = runtime(offline(), Some(output.clone()));

    start_story(&mut rt);
    let request = rt.app().selection().complete().unwrap();
    assert_eq!(request.hero.id, "astronauta");
    assert_eq!(request.world.id, "castelo");
    assert_eq!(request.quest.id, "tesouro");

    pump(&mut rt, &mut events).await;
    assert_eq!(rt.app().screen(), Screen::Result);
    assert!(rt.app().result().unwrap().story.starts_with("Era uma vez"));
    assert_eq!(output.calls().opened, 1);
    assert_eq!(rt.audio_control(), AudioControl::Pending);

    send(&mut rt, "ouvir");
    assert!(printed(&rt).contains("sendo preparada"));
    assert_eq!(output.calls().started, 0);

    pump(&mut rt, &mut events).await;
    assert_eq!(rt.audio_control(), AudioControl::Ready { playing: false });
    assert!(printed(&rt).contains("narração está pronta"));

    send(&mut rt, "ouvir");
    assert_eq!(output.calls().started, 1);
    assert_eq!(rt.audio_control(), AudioControl::Ready { playing: true });

    output.finish();
    pump(&mut rt, &mut events).await;
    assert_eq!(rt.audio_control(), AudioControl::Ready { playing: false });
    assert!(printed(&rt).contains("Fim da narração"));
}

#[tokio::test]
async fn second_play_stops_the_narration() {
    let output = FakeOutput::default();
    let (mut rt, mut events) = runtime(offline(), Some(output.clone()));
    start_story(&mut rt);
    pump(&mut rt, &mut events).await;
    pump(&mut rt, &mut events).await;

    send(&mut rt, "play");
    send(&mut rt, "play");
    assert_eq!(output.calls().started, 1);
    assert_eq!(output.calls().stopped, 1);
    assert!(!rt.player().unwrap().is_playing());

    send(&mut rt, "play");
    assert_eq!(output.calls().started, 2);
}

#[tokio::test]
async fn play_right_after_the_end_replays_instead_of_stopping() {
    let output = FakeOutput::default();
    let (mut rt, mut events) = runtime(offline(), Some(output.clone()));
    start_story(&mut rt);
    pump(&mut rt, &mut events).await;
    pump(&mut rt, &mut events).await;

    send(&mut rt, "ouvir");
    output.finish();
    // The ended notice is still queued when the user asks again.
    send(&mut rt, "ouvir");
    assert_eq!(output.calls().started, 2);
    assert_eq!(output.calls().stopped, 0);
    assert!(!printed(&rt).contains("Narração parada"));
    assert_eq!(rt.audio_control(), AudioControl::Ready { playing: true });

    // The late notice belongs to the first session and is ignored.
    pump(&mut rt, &mut events).await;
    assert_eq!(rt.audio_control(), AudioControl::Ready { playing: true });
    assert!(!printed(&rt).contains("Fim da narração"));
}

#[tokio::test]
async fn new_story_tears_down_audio() {
    let output = FakeOutput::default();
    let (mut rt, mut events) = runtime(offline(), Some(output.clone()));
    start_story(&mut rt);
    pump(&mut rt, &mut events).await;
    pump(&mut rt, &mut events).await;
    send(&mut rt, "ouvir");

    send(&mut rt, "nova");
    assert_eq!(rt.app().screen(), Screen::Selection);
    assert!(rt.app().selection().complete().is_none());
    assert!(rt.player().is_none());
    let calls = output.calls();
    assert_eq!(calls.stopped, 1);
    assert_eq!(calls.closed, 1);
}

#[tokio::test]
async fn reset_while_loading_discards_the_late_story() {
    let output = FakeOutput::default();
    let (mut rt, mut events) = runtime(offline(), Some(output.clone()));
    start_story(&mut rt);
    send(&mut rt, "nova");
    assert_eq!(rt.app().screen(), Screen::Selection);

    pump(&mut rt, &mut events).await;
    assert_eq!(rt.app().screen(), Screen::Selection);
    assert!(rt.app().result().is_none());
    assert!(rt.player().is_none());
    assert_eq!(output.calls().opened, 0);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn failed_generation_returns_to_selection_with_message() {
    let (mut rt, mut events) = runtime(Arc::new(BrokenBackend), Some(FakeOutput::default()));
    start_story(&mut rt);

    pump(&mut rt, &mut events).await;
    assert_eq!(rt.app().screen(), Screen::Selection);
    assert_eq!(rt.app().error(), Some(GENERATION_FAILED_MESSAGE));
    assert!(rt.app().selection().complete().is_some());
    assert!(printed(&rt).contains(GENERATION_FAILED_MESSAGE));
}

#[tokio::test]
async fn incomplete_selection_stays_put() {
    let (mut rt, mut events) = runtime(offline(), None);
    send(&mut rt, "heroi fada");
    send(&mut rt, "criar");

    assert_eq!(rt.app().screen(), Screen::Selection);
    assert_eq!(rt.app().error(), Some(INCOMPLETE_SELECTION_MESSAGE));
    assert!(printed(&rt).contains(INCOMPLETE_SELECTION_MESSAGE));
    tokio::task::yield_now().await;
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn without_audio_the_story_still_arrives() {
    let (mut rt, mut events) = runtime(offline(), None);
    start_story(&mut rt);
    pump(&mut rt, &mut events).await;
    pump(&mut rt, &mut events).await;

    assert_eq!(rt.app().screen(), Screen::Result);
    assert!(rt.app().audio().is_some());
    assert_eq!(rt.audio_control(), AudioControl::Unavailable);

    send(&mut rt, "ouvir");
    assert!(printed(&rt).contains("Narração indisponível"));
}

#[tokio::test]
async fn bad_input_only_prints_hints() {
    let (mut rt, _events) = runtime(offline(), None);

    send(&mut rt, "voar");
    send(&mut rt, "h 42");
    send(&mut rt, "w");
    send(&mut rt, "ouvir");
    send(&mut rt, "");

    let text = printed(&rt);
    assert!(text.contains("não conheço o comando 'voar'"));
    assert!(text.contains("Não encontrei herói \"42\""));
    assert!(text.contains("diga qual mundo você quer"));
    assert!(text.contains("Isso não dá para fazer agora"));
    assert_eq!(rt.app().view(), magic_stories_core::state::StoryApp::new().view());
}

#[tokio::test]
async fn quit_ends_the_loop() {
    let (mut rt, _events) = runtime(offline(), None);
    assert!(rt.handle_line("sair").unwrap().is_break());
}

#[tokio::test]
async fn run_exits_when_input_closes() {
    let (rt, events) = runtime(offline(), None);
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    input_tx.send("ajuda".to_string()).unwrap();
    drop(input_tx);

    tokio::time::timeout(Duration::from_secs(5), rt.run(input_rx, events))
        .await
        .expect("run should stop at end of input")
        .unwrap();
}
