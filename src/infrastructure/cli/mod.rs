//! The `vaultdex` command-line interface: a thin clap front end driving an
//! in-process `Core`.

pub mod collection;
pub mod job;
pub mod output;
pub mod query;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::Core;

#[derive(Parser, Debug)]
#[command(name = "vaultdex", version, about = "Semantic index control plane for Markdown vaults")]
pub struct Cli {
    /// Override the default platform data directory.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage collections.
    Collection {
        #[command(subcommand)]
        cmd: collection::CollectionCommands,
    },
    /// Manage jobs.
    Job {
        #[command(subcommand)]
        cmd: job::JobCommands,
    },
    /// Run semantic queries.
    Query {
        #[command(subcommand)]
        cmd: query::QueryCommands,
    },
}

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vaultdex=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    init_logging();

    let core = match cli.data_dir {
        Some(dir) => Core::new_with_data_dir(dir).await?,
        None => Core::new().await?,
    };

    match cli.command {
        Command::Collection { cmd } => collection::handle(&core, cmd).await,
        Command::Job { cmd } => job::handle(&core, cmd).await,
        Command::Query { cmd } => query::handle(&core, cmd).await,
    }
}
