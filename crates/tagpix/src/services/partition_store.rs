//! Bounded-capacity partition allocation for uploaded files.

use chrono::Utc;
use sandboxed_file_store::FileStore;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::info;

use crate::database::repositories::partition::model_to_domain;
use crate::entities::{images, partitions, prelude::Images, prelude::Partitions};
use crate::errors::UploadError;
use crate::models::Partition;

/// Allocates the partition that receives the next uploaded image.
///
/// Partitions are append-only: once the newest one holds `partition_size`
/// live images a fresh one is created, never split or rebalanced. The
/// read-count-then-create sequence runs on the caller's transaction, so
/// concurrent uploads contend on the same rows instead of both creating
/// partition N+1.
#[derive(Clone)]
pub struct PartitionStore {
    upload_store: FileStore,
    partition_size: u32,
}

impl PartitionStore {
    pub fn new(upload_store: FileStore, partition_size: u32) -> Self {
        Self {
            upload_store,
            partition_size,
        }
    }

    /// The partition to receive the next upload, creating one if the
    /// newest is full or none exists yet.
    pub async fn assign<C: ConnectionTrait>(&self, conn: &C) -> Result<Partition, UploadError> {
        let newest = Partitions::find()
            .order_by_desc(partitions::Column::Id)
            .one(conn)
            .await?;

        if let Some(ref partition) = newest {
            let live = Images::find()
                .filter(images::Column::PartitionId.eq(partition.id))
                .filter(images::Column::RemovedAt.is_null())
                .count(conn)
                .await?;
            if live < u64::from(self.partition_size) {
                return Ok(model_to_domain(partition.clone()));
            }
        }

        let next_id = newest.map(|p| p.id + 1).unwrap_or(1);
        let folder_name = Self::folder_name(next_id);

        let model = partitions::ActiveModel {
            id: Set(next_id),
            folder_name: Set(folder_name.clone()),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;

        // The backing directory must exist before the upload lands in it;
        // failure aborts the whole upload transaction.
        self.upload_store
            .create_dir_all(&folder_name)
            .await
            .map_err(|source| UploadError::Allocation {
                path: folder_name.clone(),
                source,
            })?;

        info!("Created partition {} ({})", next_id, folder_name);
        Ok(model_to_domain(model))
    }

    /// Folder name derived from the partition ordinal.
    fn folder_name(id: i32) -> String {
        format!("{id:04}")
    }
}
