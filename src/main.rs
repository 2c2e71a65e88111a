//! # Open Data Harness CLI (`odh`)
//!
//! ## Usage
//!
//! ```bash
//! odh --config ./config/odh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `odh serve http` | HTTP tool API plus MCP Streamable HTTP at `/mcp` |
//! | `odh serve stdio` | MCP over stdin/stdout |
//! | `odh datasets` | Show which datasets are configured |
//! | `odh tools list` | List the tools the server would register |
//! | `odh call <tool> --param k=v` | Run one tool and print its result |
//! | `odh completions <shell>` | Print a shell completion script |
//!
//! ## Examples
//!
//! ```bash
//! odh call search_building_permits --param address="65 Commonwealth Ave"
//! odh call summarize_crime_offenses --param district=B2 --param top_n=5
//! RUST_LOG=debug odh serve http
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use opendata_harness::ckan::CkanClient;
use opendata_harness::config::{self, Config};
use opendata_harness::params::{params_from_pairs, validate_params};
use opendata_harness::traits::{self, ToolContext, ToolRegistry};
use opendata_harness::{datasets, mcp, server};

/// Open Data Harness: complete, reconciled answers from paginated CKAN
/// open-data tables, served as MCP tools.
#[derive(Parser)]
#[command(
    name = "odh",
    about = "Open Data Harness: MCP tools over paginated CKAN open-data tables",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/odh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a tool server.
    Serve {
        #[command(subcommand)]
        transport: ServeTransport,
    },

    /// Show which datasets are configured and how they page.
    Datasets,

    /// Inspect registered tools.
    Tools {
        #[command(subcommand)]
        action: ToolsAction,
    },

    /// Call a tool once and print its text result.
    Call {
        /// Tool name, e.g. `search_building_permits`.
        tool: String,
        /// Tool parameters as `key=value` pairs.
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },

    /// Print a shell completion script to stdout.
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ServeTransport {
    /// HTTP tool API on `[server].bind`, with MCP at `/mcp`.
    Http,
    /// MCP JSON-RPC over stdin/stdout.
    Stdio,
}

#[derive(Subcommand)]
enum ToolsAction {
    /// List the tools registered for the configured datasets.
    List,
}

/// Parse a `key=value` pair for `--param` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Logs go to stderr so `serve stdio` keeps stdout for JSON-RPC.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Listing commands work without a config file.
fn load_or_minimal(path: &Path) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        warn!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

fn tool_context(cfg: Config) -> Result<ToolContext> {
    let datastore = Arc::new(CkanClient::new(&cfg.datastore)?);
    Ok(ToolContext::new(Arc::new(cfg), datastore))
}

async fn call_tool(cfg: Config, name: &str, pairs: &[(String, String)]) -> Result<()> {
    let registry = ToolRegistry::from_config(&cfg);
    let tool = registry
        .find(name)
        .with_context(|| format!("no tool registered with name: {}", name))?;

    let schema = tool.parameters_schema();
    let params = validate_params(&schema, &params_from_pairs(&schema, pairs)?)?;

    let ctx = tool_context(cfg)?;
    let text = tool.execute(params, &ctx).await?;
    println!("{}", text);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "odh", &mut std::io::stdout());
        }
        Commands::Datasets => {
            let cfg = load_or_minimal(&cli.config)?;
            datasets::list_datasets(&cfg)?;
        }
        Commands::Tools {
            action: ToolsAction::List,
        } => {
            let cfg = load_or_minimal(&cli.config)?;
            traits::list_tools(&cfg)?;
        }
        Commands::Call { tool, params } => {
            let cfg = config::load_config(&cli.config)?;
            call_tool(cfg, &tool, &params).await?;
        }
        Commands::Serve { transport } => {
            let cfg = config::load_config(&cli.config)?;
            match transport {
                ServeTransport::Http => server::run_server(&cfg).await?,
                ServeTransport::Stdio => {
                    let tools = Arc::new(ToolRegistry::from_config(&cfg));
                    let ctx = tool_context(cfg)?;
                    mcp::serve_stdio(tools, ctx).await?;
                }
            }
        }
    }

    Ok(())
}
