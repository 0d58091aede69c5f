mod chat;
mod llm;
mod routes;
mod state;

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use chat::client::{
    AiResponseClient, ClientError, DEFAULT_RELAY_CONNECT_TIMEOUT_SECS, DEFAULT_RELAY_TIMEOUT_SECS, HttpRelay,
    RelayTimeouts,
};
use chat::linkage::ResponseLinkage;
use chat::storage::JsonFileStorage;
use chat::store::MessageStore;
use chat::types::{ConversationSummary, LOCAL_USER, NewConversation};
use chat::view::{ConversationView, SendOutcome, SendPhase, ViewError};
use llm::types::LlmError;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("LLM configuration: {0}")]
    Llm(#[from] LlmError),
    #[error(transparent)]
    View(#[from] ViewError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("relay health check failed: {0}")]
    Health(String),
}

#[derive(Parser, Debug)]
#[command(name = "chatrelay", about = "AI chat relay server and terminal chat client")]
struct Cli {
    /// Relay origin used by the client commands.
    #[arg(long, env = "CHATRELAY_URL", default_value = "http://127.0.0.1:3000", global = true)]
    relay_url: String,

    /// File holding the persisted conversation list.
    #[arg(long, env = "CHATRELAY_STATE", default_value = "chats.json", global = true)]
    state: PathBuf,

    /// Seconds to wait for the relay to answer one message.
    #[arg(long, env = "CHATRELAY_TIMEOUT_SECS", default_value_t = DEFAULT_RELAY_TIMEOUT_SECS, global = true)]
    relay_timeout_secs: u64,

    /// Seconds to wait for a connection to the relay.
    #[arg(
        long,
        env = "CHATRELAY_CONNECT_TIMEOUT_SECS",
        default_value_t = DEFAULT_RELAY_CONNECT_TIMEOUT_SECS,
        global = true
    )]
    relay_connect_timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay endpoint.
    Serve {
        #[arg(long, env = "PORT", default_value_t = 3000)]
        port: u16,
    },
    /// Check that the relay is up.
    Ping,
    /// List conversations, optionally filtered.
    List {
        #[arg(long)]
        query: Option<String>,
    },
    /// Create a conversation.
    New {
        name: String,
        /// Back the conversation with the AI assistant.
        #[arg(long)]
        ai: bool,
        /// Model for an AI conversation.
        #[arg(long, requires = "ai")]
        model: Option<String>,
        /// Avatar reference (URL or data URI).
        #[arg(long)]
        avatar: Option<String>,
    },
    /// Send one message.
    Send {
        name: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Interactive chat session.
    Chat {
        /// Conversation to open; defaults to the initial selection.
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let default_filter = if matches!(cli.command, Command::Serve { .. }) { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_writer(std::io::stderr)
        .init();

    let timeouts = RelayTimeouts { request_secs: cli.relay_timeout_secs, connect_secs: cli.relay_connect_timeout_secs };
    match cli.command {
        Command::Serve { port } => run_serve(port).await,
        Command::Ping => run_ping(&cli.relay_url).await,
        Command::List { query } => {
            let view = build_view(&cli.relay_url, timeouts, cli.state)?;
            print_summaries(&view.search(query.as_deref().unwrap_or("")));
            Ok(())
        }
        Command::New { name, ai, model, avatar } => {
            let view = build_view(&cli.relay_url, timeouts, cli.state)?;
            let mut new =
                if ai { NewConversation::ai(name, model.as_deref()) } else { NewConversation::private(name) };
            if let Some(avatar) = avatar {
                new = new.with_avatar(avatar);
            }
            view.create(new)?;
            println!("created {}", view.selected());
            Ok(())
        }
        Command::Send { name, text } => {
            let view = build_view(&cli.relay_url, timeouts, cli.state)?;
            let outcome = view.send_to(&name, &text.join(" ")).await?;
            print_outcome(&name, &outcome);
            Ok(())
        }
        Command::Chat { name } => {
            let view = build_view(&cli.relay_url, timeouts, cli.state)?;
            if let Some(name) = name {
                view.select(&name)?;
            }
            run_chat(&view).await
        }
    }
}

async fn run_serve(port: u16) -> Result<(), CliError> {
    let llm = llm::LlmClient::from_env()?;
    tracing::info!(model = llm.model(), "LLM client initialized");
    let default_model = llm.model().to_string();
    let state = state::AppState::new(Arc::new(llm), default_model);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "chatrelay listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let response = reqwest::get(url)
        .await
        .map_err(|e| CliError::Health(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::Health(format!("HTTP {}", status.as_u16())));
    }
    println!("ok");
    Ok(())
}

/// Construct the client-side services and load persisted conversations.
fn build_view(relay_url: &str, timeouts: RelayTimeouts, state_path: PathBuf) -> Result<ConversationView, CliError> {
    let transport = HttpRelay::new(relay_url, timeouts)?;
    let client = AiResponseClient::new(Arc::new(transport), Arc::new(ResponseLinkage::new()));
    let store = MessageStore::new(Box::new(JsonFileStorage::new(state_path)));
    let view = ConversationView::new(store, client).with_phase_listener(|name, phase| {
        if phase == SendPhase::AwaitingReply {
            eprintln!("{name} is typing...");
        }
    });
    view.load()?;
    Ok(view)
}

fn print_summaries(summaries: &[ConversationSummary]) {
    for s in summaries {
        let marker = if s.ai { " [ai]" } else { "" };
        println!("{:<16}{marker:<6}{:>6}  {}", s.name, s.last_time, s.last_message);
    }
}

fn print_outcome(name: &str, outcome: &SendOutcome) {
    match outcome {
        SendOutcome::Delivered => {}
        SendOutcome::Replied(text) => println!("{name}: {text}"),
        SendOutcome::FallbackShown { .. } => {
            println!("{name}: {}", chat::view::FALLBACK_REPLY);
        }
    }
}

fn print_history(view: &ConversationView) {
    let name = view.selected();
    let Some(conversation) = view.conversation(&name) else {
        return;
    };
    println!("--- {name} ---");
    for m in &conversation.messages {
        let who = if m.username == LOCAL_USER { "you" } else { m.username.as_str() };
        println!("[{}] {who}: {}", m.time, m.message);
    }
}

/// One line typed into the interactive session.
#[derive(Debug, PartialEq, Eq)]
enum ChatLine<'a> {
    Blank,
    Quit,
    List(&'a str),
    Switch(&'a str),
    Reset { all: bool },
    Unknown(&'a str),
    Say(&'a str),
}

fn parse_chat_line(line: &str) -> ChatLine<'_> {
    let line = line.trim();
    if line.is_empty() {
        return ChatLine::Blank;
    }
    if !line.starts_with('/') {
        return ChatLine::Say(line);
    }
    let (command, arg) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(c, a)| (c, a.trim()));
    match (command, arg) {
        ("/quit", _) => ChatLine::Quit,
        ("/list", query) => ChatLine::List(query),
        ("/switch", name) => ChatLine::Switch(name),
        ("/reset", "") => ChatLine::Reset { all: false },
        ("/reset", "all") => ChatLine::Reset { all: true },
        _ => ChatLine::Unknown(line),
    }
}

/// Interactive loop. Lines starting with `/` are commands; anything else is sent.
async fn run_chat(view: &ConversationView) -> Result<(), CliError> {
    print_history(view);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        match parse_chat_line(&line) {
            ChatLine::Blank => {}
            ChatLine::Quit => return Ok(()),
            ChatLine::List(query) => print_summaries(&view.search(query)),
            ChatLine::Switch(name) => match view.select(name) {
                Ok(()) => print_history(view),
                Err(e) => eprintln!("{e}"),
            },
            ChatLine::Reset { all: true } => {
                view.client().linkage().clear_all();
                println!("AI context reset for every conversation");
            }
            ChatLine::Reset { all: false } => {
                view.client().linkage().clear(&view.selected());
                println!("AI context reset");
            }
            ChatLine::Unknown(input) => {
                eprintln!("unknown command {input:?}; try /switch NAME, /list [QUERY], /reset [all] or /quit");
            }
            ChatLine::Say(text) => {
                let name = view.selected();
                match view.send_to(&name, text).await {
                    Ok(outcome) => print_outcome(&name, &outcome),
                    Err(e) => eprintln!("{e}"),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

#[cfg(test)]
#[path = "relay_e2e_test.rs"]
mod relay_e2e_tests;
