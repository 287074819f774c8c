//! sea-orm entity backing the `jobs` table in `jobs.db`.
//!
//! Mirrors `idx_jobs_status`, `idx_jobs_collection`, and
//! `idx_jobs_priority ON jobs(priority DESC, created_at ASC)` used by the
//! dispatcher's next-job query.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub collection: String,
    pub payload_json: String,
    pub priority: i32,
    pub status: String,
    pub progress_json: String,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_attempt_at: ChronoDateTimeUtc,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
