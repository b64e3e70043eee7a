/// Jukebox Bot - console front end
///
/// Reads chat lines from stdin as `<user> <channel> <message>` and prints the
/// replies. Lines of the form `hotkey <key>` simulate a global key press.
use anyhow::Context;
use clap::{Parser, Subcommand};
use jukebox_bot::{App, BotConfig, CommandContext, HotkeyAction, HotkeyDispatcher};
use jukebox_core::{ChannelId, UserId};
use std::io::BufRead;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "jukebox-bot")]
#[command(about = "Voice-channel music bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot
    Run {
        /// Configuration file path
        #[arg(short, long, env = "JUKEBOX_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Load and validate configuration, then print it
    CheckConfig {
        /// Configuration file path
        #[arg(short, long, env = "JUKEBOX_CONFIG")]
        config: Option<PathBuf>,
    },
}

/// One stdin line destined for the command surface
struct ChatLine {
    ctx: CommandContext,
    text: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "jukebox_bot=info,jukebox_playback=info,jukebox_storage=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let config = load_config(config.as_deref())?;
            run(config).await?;
        }
        Commands::CheckConfig { config } => {
            let config = load_config(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<BotConfig> {
    let config = BotConfig::load(path).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run(config: BotConfig) -> anyhow::Result<()> {
    let mut app = App::start(config).await?;
    info!(
        library = app.resolver().library_size(),
        sessions = app.services().registry.len(),
        "Jukebox ready"
    );

    if let Some(mut announcements) = app.take_announcements() {
        tokio::spawn(async move {
            while let Some(message) = announcements.recv().await {
                println!("{}", message);
            }
        });
    }

    let (line_tx, mut lines) = mpsc::unbounded_channel();
    spawn_stdin_reader(line_tx, app.hotkeys());

    let surface = app.surface();
    let shutdown = std::sync::Arc::clone(&app.services().shutdown);

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(ChatLine { ctx, text }) = line else {
                    info!("Input closed");
                    break;
                };
                let surface = std::sync::Arc::clone(&surface);
                tokio::spawn(async move {
                    if let Some(reply) = surface.handle_line(ctx, &text).await {
                        println!("[{:?}] {}", reply.code, reply.message);
                    }
                });
            }
            () = shutdown.notified() => break,
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for ctrl-c")?;
                break;
            }
        }
    }

    app.shutdown().await?;
    Ok(())
}

/// Read stdin on a plain thread; hotkeys are dispatched right here
fn spawn_stdin_reader(lines: mpsc::UnboundedSender<ChatLine>, hotkeys: HotkeyDispatcher) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(key) = line.strip_prefix("hotkey ") {
                let key = key.trim();
                let action = hotkeys
                    .action_for_key(key)
                    .or_else(|| key.parse::<HotkeyAction>().ok());
                match action {
                    Some(action) => {
                        hotkeys.press(action);
                    }
                    None => warn!(key, "No hotkey bound"),
                }
                continue;
            }

            match parse_chat_line(line) {
                Some(chat) => {
                    if lines.send(chat).is_err() {
                        break;
                    }
                }
                None => warn!(line, "Expected `<user> <channel> <message>`"),
            }
        }
    });
}

fn parse_chat_line(line: &str) -> Option<ChatLine> {
    let mut parts = line.splitn(3, char::is_whitespace);
    let user: UserId = parts.next()?.parse().ok()?;
    let channel: ChannelId = parts.next()?.parse().ok()?;
    let text = parts.next()?.trim().to_string();
    Some(ChatLine {
        ctx: CommandContext { user, channel },
        text,
    })
}
