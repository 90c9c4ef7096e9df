use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    backend::DEFAULT_MEMORY_LIMIT, ChatSessionController, HttpNpcBackend, SelectOutcome,
    SessionEvent, SubmitOutcome,
};
use shared::domain::{CharacterId, TurnState};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod repl;

use config::load_settings;
use repl::{
    describe_outcome, describe_rejection, format_characters, format_memory, format_message,
    format_status, parse_command, Command, HELP_TEXT,
};

#[derive(Parser, Debug)]
#[command(about = "Talk to NPCs through the character inference backend")]
struct Args {
    /// Backend base url, e.g. http://localhost:8000/api
    #[arg(long)]
    api_base: Option<String>,
    /// Settings file (defaults to ./npc_chat.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Character to talk to first instead of the first one listed
    #[arg(long)]
    character: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (mut settings, settings_error) =
        load_settings(args.config.as_deref(), |key| std::env::var(key).ok());
    if let Some(api_base) = &args.api_base {
        settings.api_base = config::normalize_api_base(api_base);
    }
    if let Some(timeout_secs) = args.timeout_secs {
        settings.request_timeout_secs = timeout_secs;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    if let Some(err) = settings_error {
        warn!("{err:#}");
    }

    let backend = HttpNpcBackend::new(&settings.api_base, settings.request_timeout())
        .with_context(|| format!("failed to set up backend client for {}", settings.api_base))?;
    let controller =
        ChatSessionController::new_with_turn_timeout(Arc::new(backend), settings.turn_timeout());
    info!(api_base = %settings.api_base, "starting npc chat");

    let renderer = tokio::spawn(render_events(controller.subscribe_events()));

    match controller.backend_health().await {
        Ok(health) => info!(status = %health.status, service = %health.service, "backend reachable"),
        Err(err) => warn!("backend health check failed: {err}"),
    }
    let (_, status) = tokio::join!(controller.refresh_characters(), controller.fetch_status());
    if let Some(status) = status {
        println!("{}", format_status(&status));
    }
    if let Some(character) = args.character {
        if controller.select_character(&CharacterId::from(character.as_str())).await
            == SelectOutcome::UnknownCharacter
        {
            println!("unknown character '{character}'");
        }
    }
    println!("{}", format_characters(&controller.snapshot().await));
    println!("session {} - /help for commands", controller.session_id());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match parse_command(&line) {
            Command::Say(text) => {
                // Input typed while a reply is pending is rejected by the controller.
                let controller = controller.clone();
                tokio::spawn(async move {
                    match controller.submit(&text).await {
                        SubmitOutcome::Ignored(rejection) => {
                            println!("({})", describe_rejection(rejection));
                        }
                        SubmitOutcome::Completed(outcome) => {
                            if let Some(note) = describe_outcome(&outcome) {
                                println!("({note})");
                            }
                        }
                    }
                });
            }
            Command::Characters => {
                if !controller.refresh_characters().await {
                    println!("(could not refresh characters; showing cached list)");
                }
                println!("{}", format_characters(&controller.snapshot().await));
            }
            Command::Select(id) => match controller.select_character(&id).await {
                SelectOutcome::Selected(_) | SelectOutcome::Unchanged => {}
                SelectOutcome::UnknownCharacter => println!("(unknown character '{id}')"),
            },
            Command::Reset => {
                controller.reset().await;
            }
            Command::Status => match controller.fetch_status().await {
                Some(status) => println!("{}", format_status(&status)),
                None => println!("(status unavailable)"),
            },
            Command::Memory(limit) => {
                match controller
                    .fetch_remote_memory(limit.unwrap_or(DEFAULT_MEMORY_LIMIT))
                    .await
                {
                    Ok(memories) => println!("{}", format_memory(&memories)),
                    Err(err) => println!("(could not load memory: {err})"),
                }
            }
            Command::History => {
                for message in controller.messages().await {
                    println!("{}", format_message(&message));
                }
            }
            Command::Help => println!("{HELP_TEXT}"),
            Command::Quit => break,
            Command::Unknown(raw) => println!("(unknown command '{raw}', try /help)"),
        }
    }

    renderer.abort();
    Ok(())
}

async fn render_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::MessageAppended(message)) => {
                if !message.is_from_player() {
                    println!("{}", format_message(&message));
                }
            }
            Ok(SessionEvent::TurnStateChanged(TurnState::Awaiting)) => println!("(sending...)"),
            Ok(SessionEvent::SelectionChanged(Some(id))) => println!("(now talking to {id})"),
            Ok(SessionEvent::LogCleared) => println!("(conversation cleared)"),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "transcript renderer lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
