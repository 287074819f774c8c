pub use sea_orm_migration::prelude::*;

mod m20260101_000001_create_collections;
mod m20260101_000002_create_jobs;

pub struct CollectionsMigrator;

#[async_trait::async_trait]
impl MigratorTrait for CollectionsMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260101_000001_create_collections::Migration)]
    }
}

pub struct JobsMigrator;

#[async_trait::async_trait]
impl MigratorTrait for JobsMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260101_000002_create_jobs::Migration)]
    }
}
