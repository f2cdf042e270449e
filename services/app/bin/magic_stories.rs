//! Main Entrypoint for the Magic Stories terminal app
//!
//! This binary is responsible for:
//! 1. Parsing command-line flags and loading configuration from the environment.
//! 2. Initializing logging on stderr, keeping stdout for the screens.
//! 3. Building the story backend (Gemini or offline).
//! 4. Running the event loop until the user quits.

use anyhow::Context;
use clap::Parser;
use gemini_content::GeminiClient;
use magic_stories_app::{
    config::{BackendKind, Config},
    input::spawn_stdin_reader,
    output::CpalBackend,
    runtime::Runtime,
};
use magic_stories_core::{
    backend::{GeminiBackend, OfflineStoryBackend, StoryBackend},
    generation::StoryGenerator,
};
use std::{path::PathBuf, sync::Arc};
use tracing::info;

/// Create illustrated, narrated bedtime stories from three picks.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Never open an audio output device.
    #[arg(long)]
    no_audio: bool,

    /// Load environment variables from this file before reading them.
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let args = Args::parse();
    if let Some(path) = &args.env_file {
        dotenvy::from_path(path)
            .with_context(|| format!("Failed to load env file {}", path.display()))?;
    }
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!("Configuration loaded. Initializing story backend...");

    // --- 3. Initialize the Story Backend ---
    let backend: Arc<dyn StoryBackend> = match config.backend {
        BackendKind::Gemini => {
            let api_key = config
                .api_key
                .clone()
                .context("GEMINI_API_KEY must be set for the 'gemini' backend")?;
            let client = GeminiClient::new(api_key, &config.base_url, config.request_timeout)
                .context("Failed to build Gemini client")?;
            info!(
                base_url = %config.base_url,
                text_model = %config.models.text,
                image_model = %config.models.image,
                tts_model = %config.models.speech,
                voice = %config.voice,
                "Using Gemini backend."
            );
            Arc::new(GeminiBackend::new(
                client,
                config.models.clone(),
                config.voice.clone(),
            ))
        }
        BackendKind::Offline => {
            info!("Using offline backend.");
            Arc::new(OfflineStoryBackend::default())
        }
    };

    // --- 4. Run ---
    let audio = (!args.no_audio).then_some(CpalBackend);
    if audio.is_none() {
        info!("Audio output disabled.");
    }
    let (runtime, events) = Runtime::new(StoryGenerator::new(backend), audio, std::io::stdout());
    runtime.run(spawn_stdin_reader(), events).await?;

    info!("Goodbye.");
    Ok(())
}
