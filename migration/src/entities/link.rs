//! Link entity: the primary shareable page owned by a user.
//!
//! `view_count` and `click_count` are the denormalized counters maintained
//! by the ingestion path. They are only ever mutated through atomic
//! `col = col + n` updates.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub active: bool,
    pub view_count: i64,
    pub click_count: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
