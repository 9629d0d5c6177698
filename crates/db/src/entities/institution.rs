//! Institution entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of sponsoring organisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum InstitutionType {
    #[sea_orm(string_value = "care_home")]
    CareHome,
    #[sea_orm(string_value = "orphanage")]
    Orphanage,
    #[sea_orm(string_value = "hospital")]
    Hospital,
    #[sea_orm(string_value = "school")]
    School,
    #[sea_orm(string_value = "other")]
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "institution")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub name: String,

    pub institution_type: InstitutionType,

    pub address: String,

    pub city: String,

    pub region: String,

    pub phone: String,

    pub director_name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(default_value = false)]
    pub verified: bool,

    #[sea_orm(nullable)]
    pub verified_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::institution_member::Entity")]
    Members,

    #[sea_orm(has_many = "super::request::Entity")]
    Requests,
}

impl Related<super::institution_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
