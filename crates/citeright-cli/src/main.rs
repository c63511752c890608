use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use citeright_core::cache::ReferenceFilter;
use citeright_core::config_file;
use citeright_core::model::Metadata;
use citeright_core::{
    Config, Credentials, Orchestrator, ReferenceDraft, ReferenceId, ReferenceType, Request,
};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

mod output;

use output::ColorMode;

/// CiteRight - save, format and sync legal references from the command line
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Backend origin (overrides CITERIGHT_BASE_URL and the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Path to the local session/reference store
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session
    Login {
        email: String,

        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show whether a usable session is stored
    Status,

    /// Show the signed-in user's profile
    Whoami,

    /// Format and save a reference
    Save(ReferenceArgs),

    /// List cached references, newest first
    List {
        /// Only show references of this type
        #[arg(long = "type")]
        kind: Option<ReferenceType>,

        /// Case-insensitive search over title and citation
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Replace the local cache with the server's reference list
    Sync,

    /// Delete a reference remotely and from the cache
    Delete { id: String },

    /// Format a reference without saving it
    Format(ReferenceArgs),

    /// Answer JSON requests read line by line from stdin
    Serve,
}

#[derive(Args, Debug)]
struct ReferenceArgs {
    title: String,

    #[arg(long = "type", default_value = "web")]
    kind: ReferenceType,

    #[arg(long)]
    url: Option<String>,

    #[arg(long)]
    author: Option<String>,

    /// Journal, reporter or publisher
    #[arg(long)]
    publication: Option<String>,

    #[arg(long)]
    date: Option<String>,

    #[arg(long)]
    notes: Option<String>,
}

impl ReferenceArgs {
    fn into_draft(self) -> ReferenceDraft {
        ReferenceDraft {
            kind: self.kind,
            title: self.title.clone(),
            source_url: self.url.clone(),
            notes: self.notes,
            metadata: Metadata {
                author: self.author,
                title: Some(self.title),
                publication: self.publication,
                date: self.date,
                url: self.url,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // Logs go to stderr; stdout carries command output and `serve` replies.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    tracing::debug!(?config, "resolved configuration");

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let orch = Orchestrator::from_config(&config, cancel.clone())?;
    let color = ColorMode(!cli.no_color);
    let mut out = std::io::stdout();

    match cli.command {
        Command::Serve => serve(&orch, cancel).await,
        Command::Status => {
            // Read before `checkAuth`, which may refresh an expired session.
            output::print_session_state(&mut out, orch.session_state(), color)?;
            let response = orch.handle(Request::CheckAuth).await;
            output::print_response(&mut out, &response, color)?;
            if !response.is_success() {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::List { kind, search } => {
            let filter = ReferenceFilter { kind, term: search };
            match orch.search_references(&filter).await {
                Ok(references) => output::print_references(&mut out, &references, color)?,
                Err(e) => anyhow::bail!("Could not list references: {e}"),
            }
            Ok(())
        }
        command => {
            let request = build_request(command)?;
            let response = orch.handle(request).await;
            output::print_response(&mut out, &response, color)?;
            if !response.is_success() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Resolve configuration: CLI flags > env vars > config file > defaults.
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::from_file(&config_file::load_config());

    if let Some(url) = cli
        .base_url
        .clone()
        .or_else(|| std::env::var("CITERIGHT_BASE_URL").ok())
    {
        config.base_url = url;
    }
    if let Some(path) = cli
        .store
        .clone()
        .or_else(|| std::env::var("CITERIGHT_STORE").ok().map(PathBuf::from))
    {
        config.store_path = Some(path);
    }
    let env_timeout = match std::env::var("CITERIGHT_TIMEOUT") {
        Ok(v) => Some(
            v.trim()
                .parse::<u64>()
                .with_context(|| format!("CITERIGHT_TIMEOUT must be whole seconds, got {v:?}"))?,
        ),
        Err(_) => None,
    };
    if let Some(secs) = cli.timeout.or(env_timeout) {
        config.request_timeout_secs = Some(secs);
    }
    Ok(config)
}

fn build_request(command: Command) -> anyhow::Result<Request> {
    Ok(match command {
        Command::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => read_password()?,
            };
            Request::Login {
                credentials: Credentials { email, password },
            }
        }
        Command::Logout => Request::Logout,
        Command::Whoami => Request::GetUserInfo,
        Command::Save(args) => Request::SaveReference {
            reference: args.into_draft(),
        },
        Command::Sync => Request::SyncReferences,
        Command::Delete { id } => Request::DeleteReference {
            reference_id: ReferenceId::new(id),
        },
        Command::Format(args) => Request::FormatCitation {
            reference: args.into_draft(),
        },
        Command::Status | Command::List { .. } | Command::Serve => {
            anyhow::bail!("command is not a single request")
        }
    })
}

fn read_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// JSON-lines message host: one request per line in, one reply per line
/// out, in order. Blank lines are skipped.
async fn serve(orch: &Orchestrator, cancel: CancellationToken) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    tracing::info!(server_url = orch.server_url(), "serving requests on stdin");

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let reply = orch.handle_json(&line).await;
        let mut encoded = serde_json::to_string(&reply)?;
        encoded.push('\n');
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.flush().await?;
    }
    tracing::info!("stdin closed, shutting down");
    Ok(())
}
