// Declare the modules
pub mod api;
pub mod attachments;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod persona;
pub mod simple;
pub mod state;
pub mod storage;
pub mod transfer;
pub mod ui;

use crate::api::{LLMApiProvider, OpenAICompatibleProvider};
use crate::models::ChatConfig;
use crate::state::{AppState, ChatEvents};
use crate::storage::StorageManager;
use crate::ui::{pro::TerminalEvents, Screen, Terminal};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "routerchat", version, about = "Chat with OpenRouter-compatible models from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub screen: Option<ScreenCommand>,

    /// Where the chat database lives.
    #[arg(long, env = "ROUTERCHAT_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Overrides the stored base URL.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Overrides the stored model.
    #[arg(long, global = true)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ScreenCommand {
    /// Set up a connection, then chat without streaming
    Simple,
    /// Multiple chats, attachments, personas and streaming
    Pro,
}

impl From<ScreenCommand> for Screen {
    fn from(command: ScreenCommand) -> Self {
        match command {
            ScreenCommand::Simple => Screen::Simple,
            ScreenCommand::Pro => Screen::Pro,
        }
    }
}

impl Cli {
    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|dir| dir.join("routerchat"))
                .unwrap_or_else(|| PathBuf::from(".routerchat"))
        })
    }

    /// Command-line overrides win over the stored configuration.
    fn apply_overrides(&self, config: &mut ChatConfig) -> bool {
        let mut changed = false;
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
            changed = true;
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
            changed = true;
        }
        changed
    }
}

pub fn run() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
    runtime.block_on(run_cli(cli))
}

async fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let data_dir = cli.data_dir();
    let storage = StorageManager::new(&data_dir)
        .await
        .with_context(|| format!("Failed to open storage in {}", data_dir.display()))?;

    let mut config = storage.load_config().await?;
    if cli.apply_overrides(&mut config) {
        storage.save_config(&config).await?;
    }

    let mut terminal = Terminal::new();
    let screen = match cli.screen {
        Some(command) => Screen::from(command),
        None => match ui::choose_screen(&mut terminal).await? {
            Some(screen) => screen,
            None => return Ok(()),
        },
    };

    // Create the API provider instance
    let api_provider: Arc<dyn LLMApiProvider> = Arc::new(OpenAICompatibleProvider::new());
    match screen {
        Screen::Simple => ui::simple::run(&storage, api_provider.as_ref(), &mut terminal).await,
        Screen::Pro => {
            let events: Arc<dyn ChatEvents> = Arc::new(TerminalEvents);
            let app_state = AppState::load(storage, api_provider, events).await?;
            ui::pro::run(app_state, &mut terminal).await
        }
    }
}
