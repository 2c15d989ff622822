//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use sourcechat_core::{ChatReply, ChatRequest, Orchestrator, WELCOME_NOTICE, chat_turn};
use sourcechat_shared::{AppConfig, SessionState, init_config, load_config, validate_api_key};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::session;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SourceChat: answers grounded in your PDFs and web pages.
#[derive(Parser)]
#[command(
    name = "sourcechat",
    version,
    about = "Ask questions grounded in a PDF, a web page, or general knowledge.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Sources and output options shared by `ask` and `chat`.
#[derive(Args, Debug, Clone)]
pub(crate) struct SourceArgs {
    /// PDF document to ground answers in.
    #[arg(long)]
    pub pdf: Option<PathBuf>,

    /// Web page to ground answers in (scheme optional).
    #[arg(long)]
    pub url: Option<String>,

    /// Speak answers aloud (defaults to `speech.enabled`).
    #[arg(long, conflicts_with = "no_speak")]
    pub speak: bool,

    /// Never speak answers.
    #[arg(long)]
    pub no_speak: bool,

    /// JSON file holding the conversation; loaded before and saved after.
    #[arg(long)]
    pub session: Option<PathBuf>,
}

impl SourceArgs {
    fn speak(&self, config: &AppConfig) -> bool {
        if self.no_speak {
            false
        } else {
            self.speak || config.speech.enabled
        }
    }

    fn document(&self) -> Option<String> {
        self.pdf.as_ref().map(|p| p.to_string_lossy().into_owned())
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Ask a single question.
    Ask {
        /// Question text. May be omitted when a PDF or URL is given.
        #[arg(default_value = "")]
        question: String,

        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Start an interactive conversation.
    Chat {
        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

const LOG_TARGETS: &[&str] = &[
    "sourcechat_cli",
    "sourcechat_core",
    "sourcechat_sources",
    "sourcechat_shared",
];

/// Initialize tracing based on CLI flags. Logs go to stderr so answers on
/// stdout stay clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ask { question, sources } => cmd_ask(&question, &sources).await,
        Command::Chat { sources } => cmd_chat(&sources).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn build_orchestrator() -> Result<(AppConfig, Orchestrator)> {
    let config = load_config()?;
    validate_api_key(&config)?;
    let orchestrator = Orchestrator::from_config(&config)?;
    Ok((config, orchestrator))
}

fn load_session(path: Option<&Path>) -> Result<SessionState> {
    match path {
        Some(path) => session::load(path),
        None => Ok(SessionState::new()),
    }
}

fn save_session(path: Option<&Path>, state: &SessionState) -> Result<()> {
    match path {
        Some(path) => session::save(path, state),
        None => Ok(()),
    }
}

fn check_pdf(sources: &SourceArgs) -> Result<()> {
    match &sources.pdf {
        Some(pdf) if !pdf.is_file() => Err(eyre!("PDF not found: {}", pdf.display())),
        _ => Ok(()),
    }
}

async fn cmd_ask(question: &str, sources: &SourceArgs) -> Result<()> {
    check_pdf(sources)?;
    let (config, orchestrator) = build_orchestrator()?;
    let mut state = load_session(sources.session.as_deref())?;

    info!(
        has_pdf = sources.pdf.is_some(),
        has_url = sources.url.is_some(),
        history_len = state.history.len(),
        "asking question"
    );

    let request = ChatRequest {
        input: question.to_string(),
        document: sources.document(),
        url: sources.url.clone(),
        speak: sources.speak(&config),
    };

    let reply = answer_with_spinner(&orchestrator, &mut state, request).await?;
    print_reply(&reply);

    save_session(sources.session.as_deref(), &state)
}

async fn cmd_chat(sources: &SourceArgs) -> Result<()> {
    check_pdf(sources)?;
    let (config, orchestrator) = build_orchestrator()?;
    let mut state = load_session(sources.session.as_deref())?;
    let speak = sources.speak(&config);

    println!("{WELCOME_NOTICE}");
    if let Some(pdf) = &sources.pdf {
        println!("  PDF: {}", pdf.display());
    }
    if let Some(url) = &sources.url {
        println!("  URL: {url}");
    }
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                state.clear();
                save_session(sources.session.as_deref(), &state)?;
                println!("Conversation cleared.\n");
                continue;
            }
            _ => {}
        }

        let request = ChatRequest {
            input: line,
            document: sources.document(),
            url: sources.url.clone(),
            speak,
        };

        let reply = answer_with_spinner(&orchestrator, &mut state, request).await?;
        print_reply(&reply);
        println!();

        save_session(sources.session.as_deref(), &state)?;
    }

    Ok(())
}

async fn answer_with_spinner(
    orchestrator: &Orchestrator,
    state: &mut SessionState,
    request: ChatRequest,
) -> Result<ChatReply> {
    let spinner = spinner("Thinking...")?;
    let reply = chat_turn(orchestrator, state, request).await;
    spinner.finish_and_clear();
    Ok(reply)
}

fn print_reply(reply: &ChatReply) {
    match reply {
        ChatReply::Prompted(text) => println!("{text}"),
        ChatReply::Answered { text, audio_path } => {
            println!("{text}");
            if let Some(path) = audio_path {
                println!("\n  Audio: {}", path.display());
            }
        }
    }
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    Ok(spinner)
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_parses_sources_and_flags() {
        let cli = Cli::parse_from([
            "sourcechat",
            "-vv",
            "ask",
            "What is X?",
            "--pdf",
            "book.pdf",
            "--url",
            "example.com",
            "--speak",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Ask { question, sources } => {
                assert_eq!(question, "What is X?");
                assert_eq!(sources.document().as_deref(), Some("book.pdf"));
                assert_eq!(sources.url.as_deref(), Some("example.com"));
                assert!(sources.speak);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn speech_follows_config_unless_overridden() {
        let mut config = AppConfig::default();
        let base = SourceArgs {
            pdf: None,
            url: None,
            speak: false,
            no_speak: false,
            session: None,
        };

        config.speech.enabled = true;
        assert!(base.speak(&config));
        assert!(
            !SourceArgs {
                no_speak: true,
                ..base.clone()
            }
            .speak(&config)
        );

        config.speech.enabled = false;
        assert!(!base.speak(&config));
        assert!(
            SourceArgs {
                speak: true,
                ..base.clone()
            }
            .speak(&config)
        );
    }

    #[test]
    fn speak_and_no_speak_conflict() {
        let result = Cli::try_parse_from(["sourcechat", "chat", "--speak", "--no-speak"]);
        assert!(result.is_err());
    }
}
