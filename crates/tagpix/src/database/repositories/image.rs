//! SeaORM-based Image repository implementation.

use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Select,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{image_tags, images, prelude::Images, tags};
use crate::errors::RepositoryError;
use crate::models::Image;

/// SeaORM-based repository for Image read operations.
///
/// The candidate queries implement the delivery selection semantics: only
/// live (non-removed) images participate, a non-empty tag filter matches
/// images carrying *every* requested tag, and results are ordered by
/// creation time so rotation indices stay stable as the catalog grows.
#[derive(Clone)]
pub struct ImageSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl ImageSeaOrmRepository {
    /// Create a new repository instance
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Find an image by ID, removed or not
    pub async fn find_by_id(&self, id: &Uuid) -> Result<Option<Image>, RepositoryError> {
        let model = Images::find_by_id(*id).one(&*self.connection).await?;
        Ok(model.map(model_to_domain))
    }

    /// Find a live (non-removed) image by ID
    pub async fn find_active(&self, id: &Uuid) -> Result<Option<Image>, RepositoryError> {
        let model = Images::find_by_id(*id)
            .filter(images::Column::RemovedAt.is_null())
            .one(&*self.connection)
            .await?;
        Ok(model.map(model_to_domain))
    }

    /// Number of delivery candidates for a match-all tag filter
    pub async fn count_candidates(&self, tag_filter: &[String]) -> Result<u64, RepositoryError> {
        let count = candidate_query(tag_filter)
            .count(&*self.connection)
            .await?;
        Ok(count)
    }

    /// The candidate at a zero-based offset within the stable candidate
    /// ordering
    pub async fn candidate_at(
        &self,
        tag_filter: &[String],
        offset: u64,
    ) -> Result<Option<Image>, RepositoryError> {
        let model = candidate_query(tag_filter)
            .offset(offset)
            .one(&*self.connection)
            .await?;
        Ok(model.map(model_to_domain))
    }
}

/// Build the candidate selection query shared by counting and fetching.
///
/// Match-all semantics: join against the requested tags and keep only
/// images whose distinct-tag count equals the filter cardinality.
fn candidate_query(tag_filter: &[String]) -> Select<Images> {
    let mut query = Images::find().filter(images::Column::RemovedAt.is_null());

    if !tag_filter.is_empty() {
        query = query
            .join(JoinType::InnerJoin, images::Relation::ImageTags.def())
            .join(JoinType::InnerJoin, image_tags::Relation::Tags.def())
            .filter(tags::Column::Title.is_in(tag_filter.iter().cloned()))
            .group_by(images::Column::Id)
            .having(
                Expr::expr(Func::count_distinct(Expr::col((
                    tags::Entity,
                    tags::Column::Title,
                ))))
                .eq(tag_filter.len() as i64),
            );
    }

    query
        .order_by_asc(images::Column::CreatedAt)
        .order_by_asc(images::Column::Id)
}

/// Convert SeaORM model to domain model
pub(crate) fn model_to_domain(model: images::Model) -> Image {
    Image {
        id: model.id,
        partition_id: model.partition_id,
        file_name: model.file_name,
        title: model.title,
        content_hash: model.content_hash,
        created_at: model.created_at,
        updated_at: model.updated_at,
        removed_at: model.removed_at,
    }
}
