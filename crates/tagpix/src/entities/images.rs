use sea_orm::entity::prelude::*;

/// A stored image. `removed_at` marks soft deletion; removed rows are kept
/// for hash dedupe but excluded from selection and counting.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "images")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub partition_id: i32,
    pub file_name: String,
    pub title: String,
    #[sea_orm(unique)]
    pub content_hash: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub removed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::partitions::Entity",
        from = "Column::PartitionId",
        to = "super::partitions::Column::Id"
    )]
    Partitions,
    #[sea_orm(has_many = "super::image_tags::Entity")]
    ImageTags,
}

impl Related<super::partitions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Partitions.def()
    }
}

impl Related<super::image_tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ImageTags.def()
    }
}

impl Related<super::tags::Entity> for Entity {
    fn to() -> RelationDef {
        super::image_tags::Relation::Tags.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::image_tags::Relation::Images.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
