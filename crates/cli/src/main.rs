use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flightdesk_agents::{run_guided, BookingAgent, GuidedOutcome};
use flightdesk_core::{is_exit_command, SessionContext, DEFAULT_OFFER_LIMIT};
use flightdesk_gateway::{
    BackendConfig, BridgeTransport, HttpBackend, McpCommand, ToolBridge, ToolClient,
    DEFAULT_BACKEND_URL, DEFAULT_TOOLS_URL,
};
use flightdesk_observability::{init_tracing, AppMetrics};
use flightdesk_oracle::{
    ConfiguredOracle, LanguageOracle, OracleConfig, OracleKind, DEFAULT_OLLAMA_MODEL,
    DEFAULT_OLLAMA_URL, DEFAULT_OPENAI_MODEL,
};

#[derive(Debug, Parser)]
#[command(name = "flightdesk")]
#[command(about = "Flightdesk flight booking assistant")]
struct Cli {
    #[arg(long, env = "FLIGHTDESK_BACKEND_URL", default_value = DEFAULT_BACKEND_URL)]
    backend_url: String,

    #[arg(long, env = "FLIGHTDESK_TOOLS_URL", default_value = DEFAULT_TOOLS_URL)]
    tools_url: String,

    /// Guided mode talks to this MCP server over stdio instead of the tool
    /// service, e.g. `flightdesk-mcp`
    #[arg(long, env = "FLIGHTDESK_MCP_COMMAND")]
    mcp_command: Option<String>,

    #[arg(long, env = "FLIGHTDESK_HTTP_TIMEOUT_SECONDS", default_value_t = 10)]
    http_timeout_seconds: u64,

    /// ollama, openai or offline
    #[arg(long, env = "FLIGHTDESK_ORACLE", default_value = "offline")]
    oracle: String,

    #[arg(long, env = "FLIGHTDESK_OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    #[arg(long, env = "FLIGHTDESK_OLLAMA_MODEL", default_value = DEFAULT_OLLAMA_MODEL)]
    ollama_model: String,

    #[arg(long, env = "FLIGHTDESK_OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "FLIGHTDESK_OPENAI_MODEL", default_value = DEFAULT_OPENAI_MODEL)]
    openai_model: String,

    #[arg(long, env = "FLIGHTDESK_USER_ID", default_value_t = 1)]
    user_id: u64,

    #[arg(long, env = "FLIGHTDESK_OFFER_LIMIT", default_value_t = DEFAULT_OFFER_LIMIT)]
    offer_limit: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Free-text assistant
    Chat,
    /// Step-by-step booking through the tool service
    Guided,
    /// List the tools the tool service exposes
    Tools,
    /// Look a booking up by its reference
    Booking { reference: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("flightdesk", "warn");
    let cli = Cli::parse();
    let metrics = AppMetrics::shared();

    match &cli.command {
        Command::Chat => run_chat(&cli, Arc::clone(&metrics)).await?,
        Command::Guided => run_guided_blocking(&cli).await?,
        Command::Tools => {
            let client = ToolClient::new(&cli.tools_url, cli.http_timeout())?;
            let tools = client
                .list_tools()
                .await
                .with_context(|| format!("failed listing tools from {}", cli.tools_url))?;
            for tool in tools {
                println!("{:<26} {}", tool.name, tool.description);
            }
        }
        Command::Booking { reference } => {
            let backend = HttpBackend::new(&cli.backend_config())?;
            let booking = backend
                .booking_by_reference(reference)
                .await
                .with_context(|| format!("failed fetching booking {reference}"))?;
            println!("{}", serde_json::to_string_pretty(&booking)?);
        }
    }

    tracing::info!(metrics = ?metrics.snapshot(), "flightdesk exiting");
    Ok(())
}

impl Cli {
    fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds.max(1))
    }

    fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            base_url: self.backend_url.clone(),
            timeout: self.http_timeout(),
        }
    }

    fn oracle_config(&self) -> Result<OracleConfig> {
        let kind = OracleKind::parse(&self.oracle)
            .with_context(|| format!("unknown oracle '{}'", self.oracle))?;

        Ok(OracleConfig {
            kind,
            ollama_url: self.ollama_url.clone(),
            ollama_model: self.ollama_model.clone(),
            openai_api_key: self.openai_api_key.clone(),
            openai_model: self.openai_model.clone(),
            ..OracleConfig::default()
        })
    }
}

async fn run_chat(cli: &Cli, metrics: Arc<AppMetrics>) -> Result<()> {
    let backend = HttpBackend::new(&cli.backend_config())?;
    let oracle = ConfiguredOracle::from_config(&cli.oracle_config()?)?;
    let oracle_name = oracle.name();
    let agent = BookingAgent::new(Arc::new(backend), Arc::new(oracle), metrics)
        .with_user_id(cli.user_id)
        .with_offer_limit(cli.offer_limit);
    let mut session = SessionContext::new();

    tracing::info!(session_id = %session.session_id(), oracle = oracle_name, "chat session started");
    println!("Flight Booking Assistant ({oracle_name}). Type 'exit' to quit.\n");

    loop {
        print!("You: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if is_exit_command(message) {
            println!("Goodbye!");
            break;
        }
        if message.is_empty() {
            continue;
        }

        let reply = agent.handle_turn(&mut session, message).await;
        println!("Assistant: {}\n", reply.text);
    }

    Ok(())
}

/// The MCP server inherits the backend settings through its environment.
fn guided_transport(cli: &Cli) -> Result<(BridgeTransport, String)> {
    let Some(command_line) = cli.mcp_command.as_deref() else {
        let client = ToolClient::new(&cli.tools_url, cli.http_timeout())?;
        return Ok((client.into(), cli.tools_url.clone()));
    };

    let mut words = command_line.split_whitespace();
    let program = words.next().context("--mcp-command is empty")?;
    let command = words
        .fold(McpCommand::new(program), McpCommand::arg)
        .env("FLIGHTDESK_BACKEND_URL", cli.backend_url.as_str())
        .env(
            "FLIGHTDESK_HTTP_TIMEOUT_SECONDS",
            cli.http_timeout_seconds.to_string(),
        );
    Ok((command.into(), command_line.to_string()))
}

/// The wizard and its bridge are synchronous, so they get a blocking thread.
async fn run_guided_blocking(cli: &Cli) -> Result<()> {
    let (transport, target) = guided_transport(cli)?;
    let user_id = cli.user_id;

    let outcome = tokio::task::spawn_blocking(move || -> Result<GuidedOutcome> {
        let bridge = ToolBridge::start(transport)
            .with_context(|| format!("could not reach the tools at {target}"))?;

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let outcome = run_guided(&bridge, user_id, stdin.lock(), &mut stdout);
        bridge.close();
        outcome
    })
    .await
    .context("guided wizard thread failed")??;

    tracing::info!(outcome = ?outcome, "guided session finished");
    Ok(())
}
