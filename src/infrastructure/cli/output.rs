//! Small table/printing helpers shared by every CLI domain.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use owo_colors::OwoColorize;

use crate::domain::collection::{Collection, DerivedStatus, HealthStatus};
use crate::domain::job::{Job, JobStatus};

pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED).set_header(header);
    table
}

fn status_colored(status: DerivedStatus) -> String {
    let text = status.to_string_snake();
    match status {
        DerivedStatus::Active => text.green().to_string(),
        DerivedStatus::Error => text.red().to_string(),
        DerivedStatus::Indexing | DerivedStatus::Reindexing | DerivedStatus::Updating => text.yellow().to_string(),
        DerivedStatus::Deleting => text.red().to_string(),
        DerivedStatus::Paused => text.bright_black().to_string(),
        DerivedStatus::Created => text.cyan().to_string(),
    }
}

fn health_colored(health: HealthStatus) -> String {
    match health {
        HealthStatus::Healthy => "healthy".green().to_string(),
        HealthStatus::Warning => "warning".yellow().to_string(),
        HealthStatus::Error => "error".red().to_string(),
        HealthStatus::Empty => "empty".bright_black().to_string(),
        HealthStatus::Unknown => "unknown".bright_black().to_string(),
    }
}

fn job_status_colored(status: JobStatus) -> String {
    let text = format!("{status}");
    match status {
        JobStatus::Completed => text.green().to_string(),
        JobStatus::Failed => text.red().to_string(),
        JobStatus::Cancelled => text.bright_black().to_string(),
        JobStatus::Running => text.yellow().to_string(),
        JobStatus::Paused => text.bright_black().to_string(),
        JobStatus::Pending | JobStatus::Queued => text.cyan().to_string(),
    }
}

pub fn print_collections(rows: &[(Collection, DerivedStatus)]) {
    let mut table = new_table(vec!["name", "status", "health", "documents", "chunks", "path"]);
    for (collection, status) in rows {
        table.add_row(vec![
            collection.name.clone(),
            status_colored(*status),
            health_colored(collection.health_status),
            collection.document_count.to_string(),
            collection.chunk_count.to_string(),
            collection.source_path.display().to_string(),
        ]);
    }
    println!("{table}");
}

pub fn print_collection_detail(collection: &Collection, status: DerivedStatus) {
    println!("{}: {}", "name".bold(), collection.name);
    println!("{}: {}", "status".bold(), status_colored(status));
    println!("{}: {}", "health".bold(), health_colored(collection.health_status));
    println!("{}: {}", "source".bold(), collection.source_path.display());
    println!("{}: {}", "documents".bold(), collection.document_count);
    println!("{}: {}", "chunks".bold(), collection.chunk_count);
    println!("{}: {} bytes", "size".bold(), collection.size_bytes());
    println!("{}: {}", "embedding_model".bold(), collection.config.embedding_model);
    println!(
        "{}: {} / {}",
        "chunk_size/overlap".bold(),
        collection.config.chunk_size,
        collection.config.chunk_overlap
    );
    if let Some(err) = &collection.last_error {
        println!("{}: {}", "last_error".bold().red(), err);
    }
}

pub fn print_jobs(jobs: &[Job]) {
    let mut table = new_table(vec!["id", "kind", "status", "progress", "retries"]);
    for job in jobs {
        table.add_row(vec![
            job.id.to_string(),
            job.payload.kind().to_string(),
            job_status_colored(job.status),
            format!("{:.0}%", job.progress.percent),
            format!("{}/{}", job.retry_count, job.max_retries),
        ]);
    }
    println!("{table}");
}

pub fn print_job_detail(job: &Job) {
    println!("{}: {}", "id".bold(), job.id);
    println!("{}: {}", "kind".bold(), job.payload.kind());
    println!("{}: {}", "status".bold(), job_status_colored(job.status));
    println!("{}: {:.1}%", "progress".bold(), job.progress.percent);
    println!(
        "{}: {}/{} files",
        "files".bold(),
        job.progress.files_processed,
        job.progress.total_files
    );
    if let Some(current) = &job.progress.current_file {
        println!("{}: {}", "current_file".bold(), current);
    }
    println!("{}: {}/{}", "retries".bold(), job.retry_count, job.max_retries);
    if let Some(err) = &job.progress.last_error {
        println!("{}: {}", "last_error".bold().red(), err);
    }
}

/// `DerivedStatus` round-trips through serde as snake_case; reuse that
/// instead of hand-maintaining a second string table.
trait SnakeDisplay {
    fn to_string_snake(&self) -> String;
}

impl SnakeDisplay for DerivedStatus {
    fn to_string_snake(&self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string())
    }
}
