//! `vaultdex collection ...` subcommands.

use std::path::PathBuf;

use clap::Subcommand;
use dialoguer::Confirm;

use crate::domain::collection::CollectionConfig;
use crate::Core;

use super::output::{print_collection_detail, print_collections};

#[derive(Subcommand, Clone, Debug)]
pub enum CollectionCommands {
    /// Register a new collection and enqueue its initial index job.
    Create {
        name: String,
        /// Path to the vault root; must contain a `.obsidian/` directory.
        path: PathBuf,
        #[arg(long, default_value = "default")]
        embedding_model: String,
        #[arg(long)]
        ignore: Vec<String>,
        #[arg(long, default_value_t = 1_000)]
        chunk_size: usize,
        #[arg(long, default_value_t = 100)]
        chunk_overlap: usize,
    },
    /// List all collections.
    List {
        #[arg(long, default_value_t = 0)]
        page: u64,
        #[arg(long, default_value_t = 50)]
        page_size: u64,
    },
    /// Show a single collection's detail.
    Get { name: String },
    /// Update a collection's config, scheduling a follow-up job if needed.
    UpdateConfig {
        name: String,
        #[arg(long)]
        embedding_model: Option<String>,
        #[arg(long)]
        ignore: Option<Vec<String>>,
        #[arg(long)]
        debounce_ms: Option<u64>,
        #[arg(long)]
        scan_interval_s: Option<u64>,
        #[arg(long)]
        chunk_size: Option<usize>,
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Issue a confirmation token for deleting a collection.
    DeleteRequest { name: String },
    /// Delete a collection using a previously issued confirmation token.
    Delete {
        name: String,
        #[arg(long)]
        token: String,
        #[arg(short, long)]
        yes: bool,
    },
}

pub async fn handle(core: &Core, cmd: CollectionCommands) -> anyhow::Result<()> {
    match cmd {
        CollectionCommands::Create { name, path, embedding_model, ignore, chunk_size, chunk_overlap } => {
            let config = CollectionConfig {
                embedding_model,
                ignore_patterns: ignore,
                chunk_size,
                chunk_overlap,
                ..CollectionConfig::default()
            };
            core.create_collection(name.clone(), path, config).await?;
            println!("created collection {name}, index job enqueued");
        }
        CollectionCommands::List { page, page_size } => {
            let (collections, total) = core.registry.list(page, page_size).await?;
            let mut rows = Vec::with_capacity(collections.len());
            for collection in collections {
                let active = core.queue.active_for_collection(&collection.name).await?;
                let status = collection.status(active.map(|j| j.payload.kind()));
                rows.push((collection, status));
            }
            print_collections(&rows);
            println!("{total} total");
        }
        CollectionCommands::Get { name } => {
            let collection = core.registry.get(&name).await?;
            let active = core.queue.active_for_collection(&name).await?;
            let status = collection.status(active.map(|j| j.payload.kind()));
            print_collection_detail(&collection, status);
        }
        CollectionCommands::UpdateConfig {
            name,
            embedding_model,
            ignore,
            debounce_ms,
            scan_interval_s,
            chunk_size,
            chunk_overlap,
        } => {
            let current = core.registry.get(&name).await?;
            let new_config = CollectionConfig {
                embedding_model: embedding_model.unwrap_or(current.config.embedding_model),
                ignore_patterns: ignore.unwrap_or(current.config.ignore_patterns),
                debounce_ms: debounce_ms.unwrap_or(current.config.debounce_ms),
                scan_interval_s: scan_interval_s.unwrap_or(current.config.scan_interval_s),
                chunk_size: chunk_size.unwrap_or(current.config.chunk_size),
                chunk_overlap: chunk_overlap.unwrap_or(current.config.chunk_overlap),
            };
            core.update_collection_config(&name, new_config).await?;
            println!("config updated");
        }
        CollectionCommands::DeleteRequest { name } => {
            let token = core.registry.issue_deletion_token(&name).await?;
            println!("confirmation token (valid 5 minutes): {}", token.token);
        }
        CollectionCommands::Delete { name, token, yes } => {
            if !yes && !Confirm::new().with_prompt(format!("permanently delete collection {name}?")).interact()? {
                println!("aborted");
                return Ok(());
            }
            let job_id = core.delete_collection(&name, &token).await?;
            println!("delete job {job_id} enqueued for collection {name}");
        }
    }
    Ok(())
}
