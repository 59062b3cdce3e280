mod config;
mod error;
mod logging;
mod routes;
mod server;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use mcp::ToolEndpoint;
use runtime::TurnRequest;
use storage::{HistoryStore, MessageRecord, Role, SessionId};

use config::{Config, DEFAULT_CONFIG_FILE};
use error::{Error, Result};

#[derive(Parser)]
#[command(name = "advisor")]
#[command(about = "Requirements advisor chat broker", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Start an interactive chat session in the terminal
    Chat {
        /// Provider key (claude, openai, gemini)
        #[arg(short, long, default_value = "claude")]
        provider: String,
    },
    /// Connect to the tool endpoint and list its tools
    Tools,
    /// List stored sessions
    Sessions {
        /// Show only the last N sessions
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show the messages of a session
    History {
        /// Session ID (prefix match supported)
        #[arg(short, long)]
        session: String,
    },
    /// Delete sessions idle for longer than the retention period
    Cleanup {
        /// Retention in days (defaults to storage.session_ttl_days)
        #[arg(short, long)]
        days: Option<u32>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    logging::init(&config.logging)?;

    match cli.command {
        Some(Commands::Serve) | None => server::run(&config).await,
        Some(Commands::Chat { provider }) => cmd_chat(&config, &provider).await,
        Some(Commands::Tools) => cmd_tools(&config).await,
        Some(Commands::Sessions { limit }) => cmd_sessions(&config, limit),
        Some(Commands::History { session }) => cmd_history(&config, &session),
        Some(Commands::Cleanup { days }) => cmd_cleanup(&config, days),
    }
}

async fn cmd_chat(config: &Config, provider: &str) -> Result<()> {
    println!("advisor v{}", env!("CARGO_PKG_VERSION"));

    let advisor = server::build_advisor(config)?;
    let model = advisor
        .invoker()
        .resolve(provider)?
        .model
        .clone();
    let connected = server::connect_tools(&advisor, config).await;

    let session_id = SessionId::new();
    println!("Session stored at: {}", config.storage.path.display());
    println!("Session ID: {session_id}");
    println!("Model: {provider} ({model})");
    println!(
        "Tools: {}",
        if connected {
            config.endpoint.url.as_str()
        } else {
            "unavailable"
        }
    );
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        let turn = TurnRequest {
            message: input.to_string(),
            session_id: Some(session_id.clone()),
            provider: provider.to_string(),
            history: Vec::new(),
        };
        match advisor.handle_turn(turn).await {
            Ok(outcome) => {
                println!("\n{}\n", outcome.response);
                if !outcome.tools_used.is_empty() {
                    println!("[tools: {}]\n", outcome.tools_used.join(", "));
                }
            }
            Err(e) => {
                eprintln!("Error: {e}\n");
            }
        }
    }

    advisor.tools().disconnect().await;
    println!("\nSession ended.");
    Ok(())
}

async fn cmd_tools(config: &Config) -> Result<()> {
    let endpoint = ToolEndpoint::open(&config.endpoint_config()).await?;
    let tools = endpoint.list_tools().await;

    if tools.is_empty() {
        println!("No tools advertised by {}", config.endpoint.url);
    } else {
        println!("{:<36}  DESCRIPTION", "TOOL");
        println!("{}", "-".repeat(80));
        for tool in &tools {
            let description = tool.description.as_deref().unwrap_or("");
            println!("{:<36}  {}", tool.name, truncate(description, 60));
        }
    }

    endpoint.disconnect().await;
    Ok(())
}

fn cmd_sessions(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    let sessions = store.list_sessions()?;

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<16}  {:<16}  MSGS",
        "SESSION ID", "STARTED", "LAST ACTIVE"
    );
    println!("{}", "-".repeat(80));

    for summary in sessions.into_iter().take(limit) {
        let started = Local
            .from_utc_datetime(&summary.created_at.naive_utc())
            .format("%Y-%m-%d %H:%M");
        let active = Local
            .from_utc_datetime(&summary.last_activity.naive_utc())
            .format("%Y-%m-%d %H:%M");
        println!(
            "{:<36}  {:<16}  {:<16}  {}",
            summary.id, started, active, summary.message_count
        );
    }

    Ok(())
}

fn cmd_history(config: &Config, session_prefix: &str) -> Result<()> {
    let store = open_store(config)?;

    // Find session by prefix
    let sessions = store.list_sessions()?;
    let matching: Vec<_> = sessions
        .iter()
        .filter(|s| s.id.as_str().starts_with(session_prefix))
        .collect();

    let session_id = match matching.as_slice() {
        [] => {
            return Err(Error::SessionNotFound {
                prefix: session_prefix.to_string(),
            });
        }
        [only] => only.id.clone(),
        _ => {
            return Err(Error::AmbiguousSession {
                prefix: session_prefix.to_string(),
                matches: matching.iter().map(|s| s.id.to_string()).collect(),
            });
        }
    };

    let messages = store.history(&session_id)?;

    if messages.is_empty() {
        println!("No messages found for session {session_id}");
        return Ok(());
    }

    println!("Session: {session_id}\n");

    for message in &messages {
        print_message(message);
    }

    Ok(())
}

fn cmd_cleanup(config: &Config, days: Option<u32>) -> Result<()> {
    let store = open_store(config)?;
    let days = days.unwrap_or(config.storage.session_ttl_days);
    let removed = store.cleanup_expired(days)?;
    println!("Removed {removed} session(s) idle for more than {days} day(s).");
    Ok(())
}

fn print_message(message: &MessageRecord) {
    let time = Local
        .from_utc_datetime(&message.created_at.naive_utc())
        .format("%H:%M:%S");
    let role = match message.role {
        Role::User => "USER",
        Role::Assistant => "ASSISTANT",
    };
    println!("[{time}] {role}: {}", truncate(&message.content, 200));
}

// Truncate long text for display
fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn open_store(config: &Config) -> Result<HistoryStore> {
    let path = &config.storage.path;
    if !path.exists() {
        return Err(Error::DatabaseNotFound { path: path.clone() });
    }
    Ok(HistoryStore::open(path)?)
}
