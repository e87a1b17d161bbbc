//! AgentDesk CLI - serve a desk page or run agents from the terminal

mod web;

use agentdesk_core::prelude::*;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use web::{AppState, Backend};

#[derive(Parser)]
#[command(name = "agentdesk")]
#[command(about = "Groq-backed web, news, finance and data agents", long_about = None)]
#[command(version)]
struct Cli {
    /// Extra configuration file, layered below `AGENTDESK_*` overrides
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a desk page
    Serve {
        /// Desk to serve (market or research)
        #[arg(short, long, default_value = "research")]
        desk: Desk,
        /// Bind address (overrides configuration)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one query against an agent and print the result
    Run {
        #[arg(short, long, default_value = "research")]
        desk: Desk,
        /// Agent label or slug (e.g. "finance" or "Both (Team)")
        #[arg(short, long)]
        agent: String,
        /// Query text
        #[arg(required = true, trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// List the agents a desk offers
    Agents {
        #[arg(short, long, default_value = "research")]
        desk: Desk,
    },
    /// Print summary statistics of a CSV file
    Summarize {
        /// CSV file path
        path: PathBuf,
    },
    /// Version information
    Version,
}

fn load_config(path: Option<&PathBuf>) -> Result<DeskConfig> {
    Ok(DeskConfig::load_with(path.map(PathBuf::as_path))?)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("agentdesk {}", env!("CARGO_PKG_VERSION"));
            println!("agentdesk-core {}", agentdesk_core::VERSION);
        }
        Commands::Agents { desk } => {
            println!("{}", desk.title());
            for choice in desk.choices() {
                println!("  {:<10} {}", choice.slug(), choice.label());
            }
        }
        Commands::Summarize { path } => {
            let (summary, table) = summarize_csv(&path);
            println!("{}", summary);
            if let Some(table) = table {
                println!("\n{} rows, {} columns", table.len(), table.headers().len());
            }
        }
        Commands::Run { desk, agent, query } => {
            let choice = desk.parse_choice(&agent)?;
            let config = load_config(cli.config.as_ref())?;
            let credentials = Credentials::load()?;
            let registry = AgentRegistry::build(&config, &credentials)?;

            let mut runner = QueryRunner::new();
            let rendered = runner
                .submit(registry.runnable(choice).as_ref(), &query.join(" "))
                .await;
            println!("{}", rendered.to_plain_text());
            if matches!(rendered, Rendered::Error(_)) {
                std::process::exit(1);
            }
        }
        Commands::Serve { desk, host, port } => {
            let mut config = load_config(cli.config.as_ref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let backend = match Credentials::load()
                .and_then(|credentials| AgentRegistry::build(&config, &credentials))
            {
                Ok(registry) => Backend::Ready(Arc::new(registry)),
                Err(e) => {
                    tracing::error!(error = %e, "Agents unavailable; serving the page with a banner");
                    Backend::Unconfigured(e.to_string())
                }
            };

            let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
                .parse()
                .with_context(|| {
                    format!(
                        "invalid bind address {}:{}",
                        config.server.host, config.server.port
                    )
                })?;
            let state = Arc::new(
                AppState::new(desk, backend, config.upload.clone())
                    .with_session_ttl(config.server.session_ttl),
            );
            web::serve(state, addr).await?;
        }
    }

    Ok(())
}
