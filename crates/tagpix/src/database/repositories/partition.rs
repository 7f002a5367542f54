//! SeaORM-based Partition repository implementation.

use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;

use crate::entities::{partitions, prelude::Partitions};
use crate::errors::RepositoryError;
use crate::models::Partition;

/// SeaORM-based repository for Partition read operations.
#[derive(Clone)]
pub struct PartitionSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl PartitionSeaOrmRepository {
    /// Create a new repository instance
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Find a partition by its ordinal id
    pub async fn find_by_id(&self, id: i32) -> Result<Option<Partition>, RepositoryError> {
        let model = Partitions::find_by_id(id).one(&*self.connection).await?;
        Ok(model.map(model_to_domain))
    }

    /// Find a partition by id or fail with a record-not-found error
    pub async fn require(&self, id: i32) -> Result<Partition, RepositoryError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::RecordNotFound {
                table: "partitions".to_string(),
                field: "id".to_string(),
                value: id.to_string(),
            })
    }
}

/// Convert SeaORM model to domain model
pub(crate) fn model_to_domain(model: partitions::Model) -> Partition {
    Partition {
        id: model.id,
        folder_name: model.folder_name,
        created_at: model.created_at,
    }
}
