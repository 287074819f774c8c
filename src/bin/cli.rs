//! vaultdex CLI
//!
//! Usage:
//!   vaultdex collection create my-notes /path/to/vault
//!   vaultdex collection list
//!   vaultdex job active
//!   vaultdex query search my-notes "what did I decide about the migration"

use clap::Parser;
use vaultdex::infrastructure::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::run(Cli::parse()).await
}
