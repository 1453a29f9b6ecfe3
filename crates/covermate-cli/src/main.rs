#![deny(unsafe_code)]

//! covermate CLI: serve tools over HTTP or stdio, or call one directly.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use covermate_config::AppConfig;
use covermate_core::Server;
use covermate_core::http::HttpClient;

/// covermate: run Maven tests and read JaCoCo coverage from tool-calling agents.
#[derive(Parser, Debug)]
#[command(name = "covermate", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "covermate.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API.
    Serve,

    /// Speak the JSON-RPC tool protocol on stdin/stdout.
    Mcp,

    /// Invoke one tool in-process and print its result as JSON.
    Call {
        /// Tool name, e.g. `calc`.
        tool: String,

        /// Tool arguments as a JSON object.
        #[arg(long)]
        args: Option<String>,
    },

    /// List available tools.
    Tools,

    /// Check whether a server is answering on the configured address.
    Status,

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config is read before logging exists so its level can take part.
    let (config, found) = load_config(&cli.config).await?;
    init_tracing(cli.verbose, &config.logging.level);
    if !found {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Serve => cmd_serve(config).await?,
        Commands::Mcp => cmd_mcp(config).await?,
        Commands::Call { tool, args } => cmd_call(config, &tool, args.as_deref()).await?,
        Commands::Tools => cmd_tools(config)?,
        Commands::Status => cmd_status(&config).await?,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    Ok(())
}

/// Logs go to stderr; stdout belongs to tool output and the stdio protocol.
fn init_tracing(verbose: u8, configured: &str) {
    let filter = match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_serve(config: AppConfig) -> Result<()> {
    let server = Server::new(config)?;
    server.run().await?;
    Ok(())
}

async fn cmd_mcp(config: AppConfig) -> Result<()> {
    let server = Server::new(config)?;
    server.run_stdio().await?;
    Ok(())
}

async fn cmd_call(config: AppConfig, tool: &str, args: Option<&str>) -> Result<()> {
    let args = parse_args(args)?;
    let server = Server::new(config)?;
    let result = server
        .registry()
        .call(tool, args)
        .await
        .with_context(|| format!("tool `{tool}` failed"))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn cmd_tools(config: AppConfig) -> Result<()> {
    let server = Server::new(config)?;
    for def in server.registry().definitions() {
        println!("{:<24} {}", def.name, def.description);
    }
    Ok(())
}

async fn cmd_status(config: &AppConfig) -> Result<()> {
    let client = HttpClient::from_config(config);
    let health = client
        .health()
        .await
        .with_context(|| format!("no healthy server at {}", client.base_url()))?;
    println!(
        "covermate at {}: {}",
        client.base_url(),
        if health.ok { "ok" } else { "unhealthy" }
    );
    Ok(())
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(config).context("failed to render config")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

/// `--args` as JSON; absent means no arguments.
fn parse_args(raw: Option<&str>) -> Result<Value> {
    match raw {
        None => Ok(Value::Null),
        Some(raw) => serde_json::from_str(raw).context("--args must be valid JSON"),
    }
}

/// Load and validate config, falling back to defaults when the file is absent.
async fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        let config = AppConfig::load(path)
            .await
            .with_context(|| format!("invalid config at '{}'", path.display()))?;
        Ok((config, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}
