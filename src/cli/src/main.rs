//! Todolist CLI - inspect the todo store and its Secret mirror.
//!
//! Provides commands to list the durable map, show the mirror, and check
//! that the two agree.

mod client;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{check, list, mirror};
use output::OutputFormat;
use todolist_core::config::Config;

/// Todolist - reconciler inspection CLI
#[derive(Parser)]
#[command(
    name = "todolist",
    version,
    about = "Inspect the todolist store and its Secret mirror",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Agent configuration file (environment variables override it)
    #[arg(short, long, global = true, env = "TODOLIST_CONFIG")]
    config: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the todos held in the durable store
    List,

    /// Show the todos mirrored into the Secret
    Mirror,

    /// Compare the store with the mirror; exits non-zero on divergence
    Check,
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => {
            Config::from_file(path).with_context(|| format!("Failed to load config from {}", path))
        }
        None => Config::load().context("Failed to load config from environment"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color || cli.output == OutputFormat::Json {
        colored::control::set_override(false);
    }

    let format = cli.output;
    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => {
            let client = client::TodoClient::new(config);
            match cli.command {
                Commands::List => list::execute(&client, format).await,
                Commands::Mirror => mirror::execute(&client, format).await,
                Commands::Check => check::execute(&client, format).await,
            }
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
