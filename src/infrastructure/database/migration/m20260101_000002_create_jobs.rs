use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Jobs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Jobs::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Jobs::Collection).string().not_null())
                    .col(ColumnDef::new(Jobs::PayloadJson).string().not_null())
                    .col(ColumnDef::new(Jobs::Priority).integer().not_null().default(0))
                    .col(ColumnDef::new(Jobs::Status).string().not_null())
                    .col(ColumnDef::new(Jobs::ProgressJson).string().not_null())
                    .col(ColumnDef::new(Jobs::RetryCount).integer().not_null().default(0))
                    .col(ColumnDef::new(Jobs::MaxRetries).integer().not_null().default(3))
                    .col(ColumnDef::new(Jobs::NextAttemptAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Jobs::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Jobs::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_status")
                    .table(Jobs::Table)
                    .col(Jobs::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_collection")
                    .table(Jobs::Table)
                    .col(Jobs::Collection)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_priority")
                    .table(Jobs::Table)
                    .col((Jobs::Priority, IndexOrder::Desc))
                    .col((Jobs::CreatedAt, IndexOrder::Asc))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Jobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Jobs {
    Table,
    Id,
    Collection,
    PayloadJson,
    Priority,
    Status,
    ProgressJson,
    RetryCount,
    MaxRetries,
    NextAttemptAt,
    CreatedAt,
    UpdatedAt,
}
