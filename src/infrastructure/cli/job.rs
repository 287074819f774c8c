//! `vaultdex job ...` subcommands.

use clap::Subcommand;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use uuid::Uuid;

use crate::domain::job::JobId;
use crate::domain::job::JobStatus;
use crate::infrastructure::events::{job_topic, BusEvent};
use crate::Core;

use super::output::{new_table, print_job_detail, print_jobs};

#[derive(Subcommand, Clone, Debug)]
pub enum JobCommands {
    /// List jobs active against a collection.
    List { collection: String },
    /// List every currently active job across all collections.
    Active,
    /// Show a single job's detail.
    Get { id: String },
    /// Pause a queued or running job.
    Pause { id: String },
    /// Resume a paused job.
    Resume { id: String },
    /// Cancel a job cooperatively (checked at the next batch boundary).
    Cancel { id: String },
    /// Show dispatcher/worker-pool occupancy.
    Stats,
    /// Follow a job's progress live on the `job:<id>` topic until it
    /// reaches a terminal status.
    Watch { id: String },
}

fn parse_id(id: &str) -> anyhow::Result<JobId> {
    Ok(JobId(Uuid::parse_str(id)?))
}

pub async fn handle(core: &Core, cmd: JobCommands) -> anyhow::Result<()> {
    match cmd {
        JobCommands::List { collection } => {
            let jobs = core.queue.list_for_collection(&collection).await?;
            print_jobs(&jobs);
        }
        JobCommands::Active => {
            let jobs = core.queue.list_active().await?;
            print_jobs(&jobs);
        }
        JobCommands::Get { id } => {
            let job = core.queue.get(parse_id(&id)?).await?;
            print_job_detail(&job);
        }
        JobCommands::Pause { id } => {
            core.queue.pause(parse_id(&id)?).await?;
            println!("pause requested");
        }
        JobCommands::Resume { id } => {
            core.queue.resume(parse_id(&id)?).await?;
            println!("resumed");
        }
        JobCommands::Cancel { id } => {
            core.queue.cancel(parse_id(&id)?).await?;
            println!("cancel requested");
        }
        JobCommands::Stats => {
            let stats = core.queue.stats().await?;
            let mut table = new_table(vec![
                "running",
                "queued",
                "pending",
                "paused",
                "failed",
                "completed",
                "available_slots",
                "max_concurrent",
            ]);
            table.add_row(vec![
                stats.running.to_string(),
                stats.queued.to_string(),
                stats.pending.to_string(),
                stats.paused.to_string(),
                stats.failed.to_string(),
                stats.completed.to_string(),
                stats.available_slots.to_string(),
                stats.max_concurrent.to_string(),
            ]);
            println!("{table}");
        }
        JobCommands::Watch { id } => watch(core, parse_id(&id)?).await?,
    }
    Ok(())
}

async fn watch(core: &Core, id: JobId) -> anyhow::Result<()> {
    let mut sub = core.events.subscribe(&job_topic(id)).await;

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_prefix(format!("job {}", id.to_string().bright_yellow()));

    loop {
        let Some(event) = sub.rx.recv().await else {
            bar.abandon_with_message("subscription closed".to_string());
            break;
        };
        match event {
            BusEvent::ProgressUpdate { progress, .. } => {
                bar.set_position(progress.percent.round() as u64);
                if let Some(file) = &progress.current_file {
                    bar.set_message(file.clone());
                }
            }
            BusEvent::StatusChange { status, .. } => {
                bar.set_message(status.to_string());
                if matches!(
                    status,
                    JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
                ) {
                    bar.finish_with_message(format!("{status}"));
                    break;
                }
            }
            BusEvent::Error { message, .. } => {
                bar.abandon_with_message(message.bright_red().to_string());
                break;
            }
            _ => {}
        }
    }
    Ok(())
}
