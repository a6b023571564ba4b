use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use agent_api::{AgentApiConfig, HttpTransport};
use agent_cli::config::{self, FileConfig, Overrides};
use agent_cli::render::render_agent_turns;
use agent_cli::review::review_interrupt;
use agent_cli::signals::InterruptGuard;
use agent_stream::{ChatSession, SessionConfig, StreamOutcome};
use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agent-stream")]
#[command(about = "Stream a conversation with a remote agent", long_about = None)]
struct Cli {
    /// Message to send. Read from stdin when omitted.
    prompt: Vec<String>,

    /// JSON file with base_url, model, max_iterations and timeout_sec.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    max_iterations: Option<u32>,

    #[arg(long)]
    timeout_sec: Option<u64>,

    /// Thread to continue. Its stored history is loaded first.
    #[arg(long)]
    thread: Option<String>,

    /// Approve every paused action without prompting, when allowed.
    #[arg(long)]
    approve_all: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let file = cli.config.as_deref().map(FileConfig::load).transpose()?;
    let overrides = Overrides {
        base_url: cli.base_url.clone(),
        model: cli.model.clone(),
        max_iterations: cli.max_iterations,
        timeout_sec: cli.timeout_sec,
    };
    let api_config = config::resolve(
        AgentApiConfig::from_env().context("invalid AGENT_STREAM_* environment")?,
        file.as_ref(),
        &overrides,
    )?;

    let transport = HttpTransport::new(api_config).context("failed to build HTTP transport")?;
    let session = Arc::new(ChatSession::new(Arc::new(transport), SessionConfig::default()));
    let _interrupt_guard = InterruptGuard::install(Arc::clone(&session))?;

    if let Some(thread) = &cli.thread {
        let loaded = session
            .load_history(thread)
            .with_context(|| format!("failed to load thread '{thread}'"))?;
        tracing::info!(thread = %thread, messages = loaded, "continuing thread");
    }

    let prompt = prompt_text(&cli)?;
    let stdout = io::stdout();
    let stdin = io::stdin();

    let mut printed = session.state().messages.len();
    let mut outcome = session.submit(prompt.as_str())?;
    loop {
        let state = session.state();
        let fresh = &state.messages[printed.min(state.messages.len())..];
        render_agent_turns(fresh, &mut stdout.lock())?;
        printed = state.messages.len();

        match outcome {
            StreamOutcome::Interrupted => {
                let Some(view) = session.interrupt_view() else {
                    break;
                };
                let command = review_interrupt(
                    view,
                    cli.approve_all,
                    &mut stdin.lock(),
                    &mut stdout.lock(),
                )?;
                let Some(command) = command else {
                    eprintln!("Review abandoned; the agent remains paused.");
                    break;
                };
                outcome = session.resume(command)?;
            }
            StreamOutcome::Failed { error } => bail!("agent reported an error: {error}"),
            StreamOutcome::Cancelled => {
                eprintln!("Stopped.");
                break;
            }
            StreamOutcome::Completed | StreamOutcome::Ignored => break,
        }
    }

    stdout.lock().flush()?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(config::LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn prompt_text(cli: &Cli) -> Result<String> {
    let prompt = if cli.prompt.is_empty() {
        let mut text = String::new();
        io::stdin().lock().read_to_string(&mut text)?;
        text
    } else {
        cli.prompt.join(" ")
    };

    let prompt = prompt.trim().to_string();
    if prompt.is_empty() {
        bail!("nothing to send; pass a prompt or pipe one on stdin");
    }
    Ok(prompt)
}
