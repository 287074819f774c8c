use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Collections::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Collections::Name).string().not_null().primary_key())
                    .col(ColumnDef::new(Collections::SourcePath).string().not_null())
                    .col(ColumnDef::new(Collections::ConfigJson).string().not_null())
                    .col(ColumnDef::new(Collections::DocumentCount).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Collections::ChunkCount).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Collections::StoredStatus).string().not_null())
                    .col(ColumnDef::new(Collections::HealthStatus).string().not_null())
                    .col(ColumnDef::new(Collections::LastError).string().null())
                    .col(ColumnDef::new(Collections::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Collections::UpdatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Collections::LastIndexedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_collections_updated_at")
                    .table(Collections::Table)
                    .col(Collections::UpdatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Collections::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Collections {
    Table,
    Name,
    SourcePath,
    ConfigJson,
    DocumentCount,
    ChunkCount,
    StoredStatus,
    HealthStatus,
    LastError,
    CreatedAt,
    UpdatedAt,
    LastIndexedAt,
}
