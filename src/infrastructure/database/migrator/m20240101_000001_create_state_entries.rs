//! Create state_entries table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StateEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StateEntries::Key)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StateEntries::Value).text().not_null())
                    .col(
                        ColumnDef::new(StateEntries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StateEntries::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum StateEntries {
    Table,
    Key,
    Value,
    UpdatedAt,
}
