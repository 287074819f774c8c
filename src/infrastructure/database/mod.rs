//! Persistence layer: two sqlite databases under the data directory,
//! `collections.db` and `jobs.db`, opened and migrated independently.

pub mod entities;
pub mod migration;

use std::path::Path;
use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use migration::{CollectionsMigrator, JobsMigrator};

async fn connect(path: &Path) -> Result<DatabaseConnection, DbErr> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DbErr::Custom(format!("failed to create directory: {e}")))?;
    }

    let mut opt = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
    opt.max_connections(10)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    let conn = Database::connect(opt).await?;
    for pragma in [
        "PRAGMA journal_mode=WAL",
        "PRAGMA synchronous=NORMAL",
        "PRAGMA foreign_keys=ON",
    ] {
        let _ = conn
            .execute(Statement::from_string(sea_orm::DatabaseBackend::Sqlite, pragma))
            .await;
    }
    Ok(conn)
}

/// Open (creating if needed) and migrate `collections.db`.
pub async fn open_collections_db(path: &Path) -> Result<DatabaseConnection, DbErr> {
    let conn = connect(path).await?;
    CollectionsMigrator::up(&conn, None).await?;
    info!("collections.db ready at {:?}", path);
    Ok(conn)
}

/// Open (creating if needed) and migrate `jobs.db`.
pub async fn open_jobs_db(path: &Path) -> Result<DatabaseConnection, DbErr> {
    let conn = connect(path).await?;
    JobsMigrator::up(&conn, None).await?;
    info!("jobs.db ready at {:?}", path);
    Ok(conn)
}
