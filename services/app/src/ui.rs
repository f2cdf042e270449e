//! Text views for the three screens.
//!
//! Each view borrows what it shows and renders through `Display`, so the
//! runtime can write it to any `io::Write` sink.

use magic_stories_core::catalog::{Category, StoryOption};
use magic_stories_core::state::{GenerationResult, Screen, Selection, StoryApp};
use std::fmt;

const RULE: &str = "────────────────────────────────────────────";

pub const HELP: &str = "\
Comandos:
  heroi <n|nome>     escolhe o herói (ex.: heroi 2, h fada)
  mundo <n|nome>     escolhe o mundo (ex.: w castelo)
  aventura <n|nome>  escolhe a aventura (ex.: q tesouro)
  criar              cria a história
  ouvir              ouve ou para a narração
  nova               começa uma nova história
  ajuda              mostra esta ajuda
  sair               fecha o app";

/// State of the "listen" control on the story screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioControl {
    /// Narration has not arrived yet.
    Pending,
    Ready { playing: bool },
    /// No output device, or audio disabled.
    Unavailable,
}

pub struct OptionCard<'a> {
    pub position: usize,
    pub option: &'a StoryOption,
    pub selected: bool,
}

impl fmt::Display for OptionCard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.selected { '●' } else { '○' };
        write!(
            f,
            "  {mark} {}. {} {}",
            self.position, self.option.icon, self.option.name
        )
    }
}

pub struct SelectionView<'a> {
    pub selection: &'a Selection,
    pub error: Option<&'a str>,
    pub can_submit: bool,
}

impl fmt::Display for SelectionView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}")?;
        writeln!(f, "✨ Criador de Histórias Mágicas ✨")?;
        writeln!(f, "{RULE}")?;
        for category in Category::ALL {
            let chosen = self.selection.get(category);
            writeln!(f, "{}", category.title())?;
            for (index, option) in category.options().iter().enumerate() {
                let card = OptionCard {
                    position: index + 1,
                    option,
                    selected: chosen.is_some_and(|c| c.id == option.id),
                };
                writeln!(f, "{card}")?;
            }
        }
        if let Some(error) = self.error {
            writeln!(f, "⚠️  {error}")?;
        }
        if self.can_submit {
            write!(f, "Tudo pronto! Digite 'criar' para fazer a mágica acontecer.")
        } else {
            write!(f, "Digite 'ajuda' para ver os comandos.")
        }
    }
}

pub struct LoadingView;

impl fmt::Display for LoadingView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}")?;
        writeln!(f, "🪄 Criando sua história mágica...")?;
        write!(f, "Isso pode levar alguns segundos. Digite 'nova' para desistir.")
    }
}

pub struct StoryView<'a> {
    pub result: &'a GenerationResult,
    pub audio: AudioControl,
}

impl StoryView<'_> {
    /// Approximate decoded size of the illustration.
    fn image_kib(&self) -> usize {
        (self.result.image_base64().len() * 3 / 4).div_ceil(1024)
    }
}

impl fmt::Display for StoryView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}")?;
        writeln!(f, "📖 Sua História Mágica!")?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "🖼️  Ilustração: image/png, ~{} KiB", self.image_kib())?;
        writeln!(f)?;
        writeln!(f, "{}", self.result.story.trim())?;
        writeln!(f)?;
        let listen = match self.audio {
            AudioControl::Pending => "🔇 Preparando a narração...",
            AudioControl::Ready { playing: false } => "🔊 'ouvir' para ouvir a história",
            AudioControl::Ready { playing: true } => "⏹️  'ouvir' para parar a narração",
            AudioControl::Unavailable => "🔇 Narração indisponível",
        };
        writeln!(f, "{listen}")?;
        write!(f, "✨ 'nova' para criar outra história")
    }
}

/// One of the three screens, ready to print.
pub enum ScreenView<'a> {
    Selection(SelectionView<'a>),
    Loading(LoadingView),
    Story(StoryView<'a>),
}

impl<'a> ScreenView<'a> {
    pub fn for_app(app: &'a StoryApp, audio: AudioControl) -> Self {
        match (app.screen(), app.result()) {
            (Screen::Result, Some(result)) => ScreenView::Story(StoryView { result, audio }),
            (Screen::Loading, _) => ScreenView::Loading(LoadingView),
            _ => ScreenView::Selection(SelectionView {
                selection: app.selection(),
                error: app.error(),
                can_submit: app.can_submit(),
            }),
        }
    }
}

impl fmt::Display for ScreenView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScreenView::Selection(view) => fmt::Display::fmt(view, f),
            ScreenView::Loading(view) => fmt::Display::fmt(view, f),
            ScreenView::Story(view) => fmt::Display::fmt(view, f),
        }
    }
}
