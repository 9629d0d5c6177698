//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_user_table;
mod m20250101_000002_create_category_table;
mod m20250101_000003_create_institution_tables;
mod m20250101_000004_create_request_table;
mod m20250101_000005_create_offer_table;
mod m20250101_000006_create_conversation_tables;
mod m20250101_000007_create_notification_table;
mod m20250101_000008_create_badge_tables;
mod m20250101_000009_create_report_table;
mod m20250101_000010_create_review_table;
mod m20250101_000011_create_admin_message_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_user_table::Migration),
            Box::new(m20250101_000002_create_category_table::Migration),
            Box::new(m20250101_000003_create_institution_tables::Migration),
            Box::new(m20250101_000004_create_request_table::Migration),
            Box::new(m20250101_000005_create_offer_table::Migration),
            Box::new(m20250101_000006_create_conversation_tables::Migration),
            Box::new(m20250101_000007_create_notification_table::Migration),
            Box::new(m20250101_000008_create_badge_tables::Migration),
            Box::new(m20250101_000009_create_report_table::Migration),
            Box::new(m20250101_000010_create_review_table::Migration),
            Box::new(m20250101_000011_create_admin_message_table::Migration),
        ]
    }
}
