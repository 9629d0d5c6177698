//! Create admin message table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AdminMessage::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AdminMessage::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AdminMessage::SenderId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(AdminMessage::RecipientId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AdminMessage::MemberId).string_len(32).not_null())
                    .col(ColumnDef::new(AdminMessage::Body).text().not_null())
                    .col(ColumnDef::new(AdminMessage::ReadAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(AdminMessage::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_admin_message_sender")
                            .from(AdminMessage::Table, AdminMessage::SenderId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_admin_message_recipient")
                            .from(AdminMessage::Table, AdminMessage::RecipientId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_admin_message_member")
                            .from(AdminMessage::Table, AdminMessage::MemberId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (recipient_id, read_at) (for unread count)
        manager
            .create_index(
                Index::create()
                    .name("idx_admin_message_recipient_read_at")
                    .table(AdminMessage::Table)
                    .col(AdminMessage::RecipientId)
                    .col(AdminMessage::ReadAt)
                    .to_owned(),
            )
            .await?;

        // Index: (member_id, id) (for threads)
        manager
            .create_index(
                Index::create()
                    .name("idx_admin_message_member_id")
                    .table(AdminMessage::Table)
                    .col(AdminMessage::MemberId)
                    .col(AdminMessage::Id)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AdminMessage::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AdminMessage {
    Table,
    Id,
    SenderId,
    RecipientId,
    MemberId,
    Body,
    ReadAt,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
