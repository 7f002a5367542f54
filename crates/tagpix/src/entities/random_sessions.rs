use sea_orm::entity::prelude::*;

/// Sticky random-selection memo, keyed by a client/request fingerprint.
/// At most one live row per fingerprint; expired rows are overwritten in
/// place by the selection engine.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "random_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub fingerprint: String,
    pub chosen_index: i64,
    pub expires_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
