//! Create request table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Request::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Request::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Request::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Request::CategoryId).string_len(32).not_null())
                    .col(ColumnDef::new(Request::InstitutionId).string_len(32))
                    .col(ColumnDef::new(Request::Title).string_len(128).not_null())
                    .col(ColumnDef::new(Request::Description).text().not_null())
                    .col(ColumnDef::new(Request::Region).string_len(128).not_null())
                    .col(ColumnDef::new(Request::City).string_len(128).not_null())
                    .col(
                        ColumnDef::new(Request::Status)
                            .string_len(32)
                            .not_null()
                            .default("open"),
                    )
                    .col(
                        ColumnDef::new(Request::OffersCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Request::EnteredInProgressAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Request::PendingCompletionAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Request::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Request::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Request::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_request_user")
                            .from(Request::Table, Request::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_request_category")
                            .from(Request::Table, Request::CategoryId)
                            .to(Category::Table, Category::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_request_institution")
                            .from(Request::Table, Request::InstitutionId)
                            .to(Institution::Table, Institution::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (status, updated_at) (for the stale-state scans)
        manager
            .create_index(
                Index::create()
                    .name("idx_request_status_updated_at")
                    .table(Request::Table)
                    .col(Request::Status)
                    .col(Request::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        // Index: (status, pending_completion_at) (for auto-complete)
        manager
            .create_index(
                Index::create()
                    .name("idx_request_status_pending_completion_at")
                    .table(Request::Table)
                    .col(Request::Status)
                    .col(Request::PendingCompletionAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_request_user_id")
                    .table(Request::Table)
                    .col(Request::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_request_category_id")
                    .table(Request::Table)
                    .col(Request::CategoryId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Request::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Request {
    Table,
    Id,
    UserId,
    CategoryId,
    InstitutionId,
    Title,
    Description,
    Region,
    City,
    Status,
    OffersCount,
    EnteredInProgressAt,
    PendingCompletionAt,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

#[derive(Iden)]
enum Category {
    Table,
    Id,
}

#[derive(Iden)]
enum Institution {
    Table,
    Id,
}
