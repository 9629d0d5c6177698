//! Create institution and institution member tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Institution::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Institution::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Institution::Name).string_len(256).not_null())
                    .col(
                        ColumnDef::new(Institution::InstitutionType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Institution::Address).string_len(512).not_null())
                    .col(ColumnDef::new(Institution::City).string_len(128).not_null())
                    .col(ColumnDef::new(Institution::Region).string_len(128).not_null())
                    .col(ColumnDef::new(Institution::Phone).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Institution::DirectorName)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Institution::Description).text())
                    .col(
                        ColumnDef::new(Institution::Verified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Institution::VerifiedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Institution::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Institution::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_institution_verified")
                    .table(Institution::Table)
                    .col(Institution::Verified)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InstitutionMember::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InstitutionMember::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(InstitutionMember::InstitutionId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InstitutionMember::UserId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InstitutionMember::Role)
                            .string_len(16)
                            .not_null()
                            .default("member"),
                    )
                    .col(ColumnDef::new(InstitutionMember::Position).string_len(128))
                    .col(
                        ColumnDef::new(InstitutionMember::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_institution_member_institution")
                            .from(InstitutionMember::Table, InstitutionMember::InstitutionId)
                            .to(Institution::Table, Institution::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_institution_member_user")
                            .from(InstitutionMember::Table, InstitutionMember::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One membership per (user, institution)
        manager
            .create_index(
                Index::create()
                    .name("idx_institution_member_user_institution")
                    .table(InstitutionMember::Table)
                    .col(InstitutionMember::UserId)
                    .col(InstitutionMember::InstitutionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InstitutionMember::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Institution::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Institution {
    Table,
    Id,
    Name,
    InstitutionType,
    Address,
    City,
    Region,
    Phone,
    DirectorName,
    Description,
    Verified,
    VerifiedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum InstitutionMember {
    Table,
    Id,
    InstitutionId,
    UserId,
    Role,
    Position,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
