//! chatterm CLI: terminal chat widget for streaming chat endpoints

use std::error::Error;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chatterm_engine::{
    ChatConfig, ChatController, ChatSession, HttpChatTransport, Role, ENDPOINT_ENV,
};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// Chat with a streaming chat endpoint from the terminal
#[derive(Parser)]
#[command(name = "chatterm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/chatterm/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chat endpoint URL, overrides config and environment
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Log file used while the TUI owns the terminal
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat widget (default when no command specified)
    Tui,

    /// Send one message and print the streamed reply
    Send {
        /// Message text
        text: String,
    },

    /// Print the effective configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default config file
    Init,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult {
    let interactive = matches!(cli.command, None | Some(Commands::Tui));
    init_logging(interactive, cli.log_file.as_deref())?;

    match cli.command {
        None | Some(Commands::Tui) => {
            let config = resolve_config(&cli)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cmd_tui(config))
        }
        Some(Commands::Send { ref text }) => {
            let config = resolve_config(&cli)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cmd_send(config, text))
        }
        Some(Commands::Config { json }) => cmd_config(&resolve_config(&cli)?, json),
        Some(Commands::Init) => cmd_init(cli.config.as_deref()),
    }
}

/// Install the fmt subscriber: a log file for the TUI, stderr otherwise.
fn init_logging(interactive: bool, log_file: Option<&Path>) -> CliResult {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatterm=info"));

    if !interactive {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
        return Ok(());
    }

    let Some(path) = log_file.map(Path::to_path_buf).or_else(default_log_path) else {
        // Nowhere to write; logging to the terminal would corrupt the UI
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn default_log_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("chatterm").join("chatterm.log"))
}

/// Defaults, then the config file, then the environment, then flags.
fn resolve_config(cli: &Cli) -> CliResult<ChatConfig> {
    let mut config = match &cli.config {
        // An explicitly named file must exist
        Some(path) => ChatConfig::load(path)?,
        None => match ChatConfig::default_path() {
            Some(path) => ChatConfig::load_or_default(&path)?,
            None => ChatConfig::default(),
        },
    };
    config.apply_env()?;
    if let Some(endpoint) = &cli.endpoint {
        config.set_endpoint(endpoint)?;
    }
    config.validate()?;
    Ok(config)
}

async fn cmd_tui(config: ChatConfig) -> CliResult {
    let transport = Arc::new(HttpChatTransport::new(&config)?);
    info!(endpoint = %transport.url(), "opening chat");
    let session: Arc<dyn ChatController> = Arc::new(ChatSession::new(transport));
    chatterm_tui::run_tui(session, config.ui).await?;
    Ok(())
}

async fn cmd_send(config: ChatConfig, text: &str) -> CliResult {
    let transport = Arc::new(HttpChatTransport::new(&config)?);
    info!(endpoint = %transport.url(), "sending message");
    let session = ChatSession::new(transport);
    let mut changes = session.subscribe();
    let mut handle = session.submit(text);
    let mut printed = 0;

    loop {
        tokio::select! {
            result = &mut handle => {
                result?;
                print_reply(&session, &mut printed)?;
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                print_reply(&session, &mut printed)?;
            }
        }
    }

    if printed > 0 {
        println!();
    }
    match session.error() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Print the part of the assistant reply not yet written to stdout.
fn print_reply(session: &ChatSession, printed: &mut usize) -> CliResult {
    let messages = session.messages();
    let Some(reply) = messages.last().filter(|m| m.role == Role::Assistant) else {
        return Ok(());
    };
    let text = reply.text();
    if let Some(fresh) = text.get(*printed..) {
        if !fresh.is_empty() {
            let mut stdout = io::stdout().lock();
            stdout.write_all(fresh.as_bytes())?;
            stdout.flush()?;
            *printed = text.len();
        }
    }
    Ok(())
}

fn cmd_config(config: &ChatConfig, json: bool) -> CliResult {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("Endpoint:  {}", config.endpoint());
    if std::env::var(ENDPOINT_ENV).is_ok() {
        println!("           (from {ENDPOINT_ENV})");
    }
    if config.headers.is_empty() {
        println!("Headers:   none");
    } else {
        let names: Vec<&str> = config.headers.keys().map(String::as_str).collect();
        println!("Headers:   {}", names.join(", "));
    }
    println!("Timeout:   {}s", config.request_timeout_secs);
    println!(
        "Input:     {}-{} rows",
        config.ui.min_input_rows, config.ui.max_input_rows
    );
    println!("Theme:     {:?}", config.ui.theme);
    Ok(())
}

fn cmd_init(path: Option<&Path>) -> CliResult {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => ChatConfig::default_path().ok_or("no config directory on this system")?,
    };

    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    ChatConfig::default().save(&path)?;
    println!("Created {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_send() {
        let cli = Cli::parse_from(["chatterm", "--endpoint", "http://h:1/chat", "send", "hi"]);
        assert_eq!(cli.endpoint.as_deref(), Some("http://h:1/chat"));
        assert!(matches!(cli.command, Some(Commands::Send { ref text }) if text == "hi"));
    }

    #[test]
    fn test_cli_defaults_to_tui() {
        let cli = Cli::parse_from(["chatterm"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_endpoint_flag_overrides_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let file_config = ChatConfig {
            base_url: "http://from-file:1".into(),
            ..ChatConfig::default()
        };
        file_config.save(&path).unwrap();

        let cli = Cli::parse_from([
            "chatterm",
            "--config",
            path.to_str().unwrap(),
            "--endpoint",
            "http://from-flag:2/v1/chat",
            "config",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.endpoint(), "http://from-flag:2/v1/chat");
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let cli = Cli::parse_from(["chatterm", "--config", "/nonexistent/chatterm.json", "config"]);
        assert!(resolve_config(&cli).is_err());
    }
}
