use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use assetbot::speech::SpeechRecognizer;
use assetbot::tui::{self, EventHandler};
use assetbot::{handler, logging, ui};
use assetbot::{App, CommandRecognizer, Config, Dispatcher, HttpBackend, SpeechBridge};

#[derive(Parser)]
#[command(name = "assetbot")]
#[command(version)]
#[command(about = "Chat with the company asset assistant", long_about = None)]
struct Cli {
    /// Use this config file instead of the default location
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        question: String,
    },
    /// Write the default config file if missing and print its path
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::get_config_path()?,
    };
    let config = Config::load_from(&config_path)?;

    logging::init(&config.log_path()?)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        backend = %config.backend_url,
        "starting assetbot"
    );

    match cli.command {
        None => run_chat(&config).await,
        Some(Commands::Ask { question }) => ask_once(&config, &question).await,
        Some(Commands::Config) => write_default_config(&config_path),
    }
}

fn dispatcher_for(config: &Config) -> Dispatcher {
    let backend = HttpBackend::new(&config.backend_url);
    Dispatcher::new(Arc::new(backend)).with_timeout(config.request_timeout())
}

fn speech_for(config: &Config) -> SpeechBridge {
    let recognizer = config
        .speech_command
        .as_deref()
        .and_then(CommandRecognizer::from_command)
        .map(|r| Box::new(r) as Box<dyn SpeechRecognizer>);

    if recognizer.is_none() {
        tracing::info!("no speech command configured; microphone disabled");
    }
    SpeechBridge::new(recognizer)
}

async fn run_chat(config: &Config) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init().context("Failed to initialize terminal")?;

    let mut events = EventHandler::new();
    let mut app = App::new(
        dispatcher_for(config),
        speech_for(config),
        events.sender(),
        config.backend_url.clone(),
    );

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    app.shutdown();
    tui::restore()?;
    tracing::info!(turns = app.conversation.len(), "chat closed");
    result
}

async fn run_loop(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}

async fn ask_once(config: &Config, question: &str) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        return Ok(());
    }

    let turn = dispatcher_for(config).ask(question).await;
    println!("{}", turn.text());
    Ok(())
}

fn write_default_config(path: &std::path::Path) -> Result<()> {
    if path.exists() {
        println!("Config already exists: {}", path.display());
    } else {
        Config::new().save_to(path)?;
        println!("Wrote default config: {}", path.display());
    }
    Ok(())
}
