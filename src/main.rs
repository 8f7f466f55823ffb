//! A2A Orchestrator - buyer/supplier workflow coordination over remote agents.

use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use a2a_orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorMcpServer, Role, WorkflowKind};

/// A2A Orchestrator - coordinates remote business agents.
#[derive(Parser, Debug)]
#[command(name = "a2a-orchestrator")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Which side of the supply chain to orchestrate.
    #[arg(long, value_enum, env = "ORCHESTRATOR_ROLE", default_value = "buyer")]
    role: Role,

    /// Remote agent base URL (repeatable). Defaults to the role's *_AGENT_URL variables.
    #[arg(long = "agent-url")]
    agent_urls: Vec<String>,

    /// Deadline for each remote agent call, in seconds.
    #[arg(long, env = "A2A_REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    request_timeout_secs: u64,

    /// Deadline for agent card discovery, in seconds.
    #[arg(long, env = "A2A_DISCOVERY_TIMEOUT_SECS", default_value_t = 30)]
    discovery_timeout_secs: u64,

    /// Agent card path relative to each base URL.
    #[arg(long, env = "A2A_CARD_PATH", default_value = a2a_orchestrator::a2a::AGENT_CARD_PATH)]
    card_path: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON.
    #[arg(long, default_value = "false")]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the orchestrator tools over MCP on stdio (default).
    Serve,
    /// List the discovered remote agents.
    Agents,
    /// Send one task to a named agent.
    Send {
        /// Agent name as published on its card.
        agent: String,
        /// Task text.
        task: String,
    },
    /// Run a predefined workflow and print its report.
    Workflow {
        /// buyer, supplier, or order-monitoring.
        kind: String,
        /// The overall request.
        request: String,
        /// Print the run as JSON instead of a readable report.
        #[arg(long)]
        json: bool,
    },
}

impl Args {
    fn config(&self) -> OrchestratorConfig {
        let agent_urls = if self.agent_urls.is_empty() {
            self.role.agent_urls_from_env()
        } else {
            self.agent_urls.clone()
        };
        OrchestratorConfig {
            role: self.role,
            agent_urls,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            discovery_timeout: Duration::from_secs(self.discovery_timeout_secs),
            card_path: self.card_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    // Logs go to stderr; stdout carries the MCP protocol
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = args.config();
    info!(role = ?config.role, agents = ?config.agent_urls, "A2A orchestrator starting");

    let orchestrator = Orchestrator::connect(config)
        .await
        .context("failed to start orchestrator")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let server = OrchestratorMcpServer::new(orchestrator);
            server.run_stdio().await?;
        }
        Command::Agents => {
            let agents = orchestrator.list_remote_agents().await;
            println!("{}", serde_json::to_string_pretty(&agents)?);
        }
        Command::Send { agent, task } => {
            match orchestrator.send_message(&agent, &task).await? {
                Some(task) => println!("{}", serde_json::to_string_pretty(&task)?),
                None => println!("{} returned no result", agent),
            }
        }
        Command::Workflow {
            kind,
            request,
            json,
        } => {
            let Some(kind) = WorkflowKind::parse(&kind) else {
                bail!("unknown workflow: {}", kind);
            };
            if !orchestrator.available_workflows().contains(&kind) {
                bail!(
                    "{:?} workflow is not available to the {:?} role",
                    kind,
                    orchestrator.role()
                );
            }
            let run = orchestrator.execute_predefined(kind, &request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&run)?);
            } else {
                println!("{}", run.report());
            }
        }
    }

    Ok(())
}
