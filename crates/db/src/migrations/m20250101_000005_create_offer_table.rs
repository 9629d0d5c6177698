//! Create offer table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Offer::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Offer::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Offer::RequestId).string_len(32).not_null())
                    .col(ColumnDef::new(Offer::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Offer::Message).text().not_null())
                    .col(
                        ColumnDef::new(Offer::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Offer::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Offer::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_offer_request")
                            .from(Offer::Table, Offer::RequestId)
                            .to(Request::Table, Request::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_offer_user")
                            .from(Offer::Table, Offer::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (request_id, status) (for competing offers and the accepted one)
        manager
            .create_index(
                Index::create()
                    .name("idx_offer_request_status")
                    .table(Offer::Table)
                    .col(Offer::RequestId)
                    .col(Offer::Status)
                    .to_owned(),
            )
            .await?;

        // Index: (user_id, status) (for mastery counts)
        manager
            .create_index(
                Index::create()
                    .name("idx_offer_user_status")
                    .table(Offer::Table)
                    .col(Offer::UserId)
                    .col(Offer::Status)
                    .to_owned(),
            )
            .await?;

        // At most one pending offer per (user, request). The schema builder
        // has no partial index support, so this one is raw SQL.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_offer_unique_pending \
                 ON offer (user_id, request_id) WHERE status = 'pending'",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Offer::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Offer {
    Table,
    Id,
    RequestId,
    UserId,
    Message,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Request {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
