//! Create notification table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // notifiable_id has no foreign key: the target may be deleted
        // while its notifications live on.
        manager
            .create_table(
                Table::create()
                    .table(Notification::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notification::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Notification::RecipientId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Notification::ActorId).string_len(32))
                    .col(ColumnDef::new(Notification::Action).string_len(48).not_null())
                    .col(
                        ColumnDef::new(Notification::NotifiableType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Notification::NotifiableId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Notification::ReadAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Notification::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_recipient")
                            .from(Notification::Table, Notification::RecipientId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_actor")
                            .from(Notification::Table, Notification::ActorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (recipient_id, read_at) (for unread count)
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_recipient_read_at")
                    .table(Notification::Table)
                    .col(Notification::RecipientId)
                    .col(Notification::ReadAt)
                    .to_owned(),
            )
            .await?;

        // Index: (notifiable_type, notifiable_id) (for de-duplication windows)
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_notifiable")
                    .table(Notification::Table)
                    .col(Notification::NotifiableType)
                    .col(Notification::NotifiableId)
                    .to_owned(),
            )
            .await?;

        // Index: read_at (for cleanup)
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_read_at")
                    .table(Notification::Table)
                    .col(Notification::ReadAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notification::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Notification {
    Table,
    Id,
    RecipientId,
    ActorId,
    Action,
    NotifiableType,
    NotifiableId,
    ReadAt,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
