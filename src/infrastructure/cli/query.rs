//! `vaultdex query ...` subcommand.

use std::collections::HashMap;

use clap::Subcommand;

use crate::Core;

use super::output::new_table;

#[derive(Subcommand, Clone, Debug)]
pub enum QueryCommands {
    /// Semantic search within a collection.
    Search {
        collection: String,
        text: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 0.0)]
        threshold: f32,
        /// Repeatable `key=value` metadata filter.
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
        #[arg(long)]
        context: bool,
    },
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    s.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())).ok_or_else(|| format!("expected key=value, got {s:?}"))
}

pub async fn handle(core: &Core, cmd: QueryCommands) -> anyhow::Result<()> {
    match cmd {
        QueryCommands::Search { collection, text, limit, threshold, filters, context } => {
            let filters: HashMap<String, String> = filters.into_iter().collect();
            let response = core.query.search(&collection, &text, limit, threshold, filters, context).await?;

            let mut table = new_table(vec!["similarity", "path", "text"]);
            for result in &response.results {
                let preview: String = result.text.chars().take(80).collect();
                table.add_row(vec![format!("{:.3}", result.similarity), result.path.clone(), preview]);
            }
            println!("{table}");
            println!(
                "{} of {} matched in {}ms ({}/{} documents/chunks indexed)",
                response.results.len(),
                response.total_found,
                response.search_time_ms,
                response.vault_info.document_count,
                response.vault_info.chunk_count,
            );
        }
    }
    Ok(())
}
