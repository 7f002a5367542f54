//! SeaORM-based Tag repository implementation.

use sea_orm::sea_query::{Expr, IntoCondition};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{image_tags, images, prelude::Tags, tags};
use crate::errors::RepositoryError;
use crate::models::TagUsage;

/// SeaORM-based repository for Tag read operations.
#[derive(Clone)]
pub struct TagSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl TagSeaOrmRepository {
    /// Create a new repository instance
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// All tags with the number of live images carrying each one.
    ///
    /// Removed images are excluded from the counts through the join
    /// condition, so tags whose images were all soft-deleted still appear
    /// with a count of zero.
    pub async fn list_with_usage(&self) -> Result<Vec<TagUsage>, RepositoryError> {
        let rows: Vec<(String, i64)> = Tags::find()
            .select_only()
            .column(tags::Column::Title)
            .column_as(images::Column::Id.count(), "count")
            .join(JoinType::LeftJoin, tags::Relation::ImageTags.def())
            .join(
                JoinType::LeftJoin,
                image_tags::Relation::Images.def().on_condition(|_left, right| {
                    Expr::col((right, images::Column::RemovedAt))
                        .is_null()
                        .into_condition()
                }),
            )
            .group_by(tags::Column::Id)
            .group_by(tags::Column::Title)
            .order_by_asc(tags::Column::Title)
            .into_tuple()
            .all(&*self.connection)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(title, count)| TagUsage { title, count })
            .collect())
    }

    /// Tag titles attached to one image
    pub async fn titles_for_image(&self, image_id: &Uuid) -> Result<Vec<String>, RepositoryError> {
        let models = Tags::find()
            .join(JoinType::InnerJoin, tags::Relation::ImageTags.def())
            .filter(image_tags::Column::ImageId.eq(*image_id))
            .order_by_asc(tags::Column::Title)
            .all(&*self.connection)
            .await?;

        Ok(models.into_iter().map(|m| m.title).collect())
    }
}
