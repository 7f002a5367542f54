//! Upload ingestion and image mutations.
//!
//! `store` runs the whole multi-step upload inside one database
//! transaction: dedupe by content hash, partition assignment, JPEG
//! normalization, file write, metadata insert, and tagging. A failure at
//! any step rolls the transaction back; the file is only written right
//! before commit and is removed again if the commit itself fails, so the
//! store never ends up with a row without a file or a file without a row.

use chrono::Utc;
use image::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use sandboxed_file_store::FileStore;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::entities::{image_tags, images, prelude::Images, prelude::Tags, tags};
use crate::errors::{AppError, UploadError};
use crate::models::Image;
use crate::services::partition_store::PartitionStore;
use crate::services::tagger::VisualTagger;

/// An upload received from a client.
#[derive(Debug, Clone)]
pub struct NewUpload {
    /// Original client-side filename, kept as the display title
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// User-supplied tags, merged with the automatic visual tags
    pub tags: Vec<String>,
}

/// A successfully stored upload.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub image: Image,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateDirection {
    Right,
    Left,
}

impl RotateDirection {
    /// Parse the wire codes `R` and `L` (case-insensitive).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "R" => Some(Self::Right),
            "L" => Some(Self::Left),
            _ => None,
        }
    }
}

/// Orchestrates uploads and image mutations.
#[derive(Clone)]
pub struct ImageService {
    database: Database,
    partitions: PartitionStore,
    upload_store: FileStore,
    tagger: VisualTagger,
    jpeg_quality: u8,
}

impl ImageService {
    pub fn new(
        database: Database,
        upload_store: FileStore,
        partition_size: u32,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            database,
            partitions: PartitionStore::new(upload_store.clone(), partition_size),
            upload_store,
            tagger: VisualTagger::new(),
            jpeg_quality,
        }
    }

    /// Ingest one upload.
    pub async fn store(&self, upload: NewUpload) -> Result<StoredImage, UploadError> {
        let content_hash = hex::encode(Sha256::digest(&upload.bytes));
        let normalized = self.normalize_to_jpeg(&upload.bytes)?;

        let classification =
            self.tagger
                .classify(&normalized)
                .map_err(|e| UploadError::Processing {
                    message: e.to_string(),
                })?;

        let txn = self.database.connection.begin().await?;

        if Images::find()
            .filter(images::Column::ContentHash.eq(&content_hash))
            .one(&txn)
            .await?
            .is_some()
        {
            return Err(UploadError::Duplicate { hash: content_hash });
        }

        let partition = self.partitions.assign(&txn).await?;

        let id = Uuid::new_v4();
        let file_name = format!("{}.jpg", id.simple());
        let relative_path = format!("{}/{}", partition.folder_name, file_name);
        let now = Utc::now();

        let model = images::ActiveModel {
            id: Set(id),
            partition_id: Set(partition.id),
            file_name: Set(file_name),
            title: Set(upload.file_name.clone()),
            content_hash: Set(content_hash),
            created_at: Set(now),
            updated_at: Set(now),
            removed_at: Set(None),
        }
        .insert(&txn)
        .await?;

        let titles = merge_tag_titles(&upload.tags, &classification.tags());
        for title in &titles {
            let tag_id = ensure_tag(&txn, title).await?;
            link_tag(&txn, id, tag_id).await?;
        }

        self.upload_store
            .write_atomic(&relative_path, &normalized)
            .await?;

        if let Err(e) = txn.commit().await {
            // Keep store and filesystem consistent: without the row the
            // file must go too.
            if let Err(cleanup) = self.upload_store.remove_file(&relative_path).await {
                warn!("failed to remove {relative_path} after rollback: {cleanup}");
            }
            return Err(e.into());
        }

        info!(
            "stored image {} in partition {} with {} tags",
            id,
            partition.folder_name,
            titles.len()
        );

        Ok(StoredImage {
            image: crate::database::repositories::image::model_to_domain(model),
            tags: titles,
        })
    }

    /// Rotate the stored JPEG 90 degrees in place and bump `updated_at`.
    /// The mtime change invalidates every derived render of this image.
    pub async fn rotate(&self, id: Uuid, direction: RotateDirection) -> Result<(), AppError> {
        let (model, relative_path) = self.require_active_with_path(&id).await?;

        let bytes = self
            .upload_store
            .read(&relative_path)
            .await
            .map_err(|e| AppError::internal(format!("file missing on disk: {e}")))?;
        let decoded =
            image::load_from_memory(&bytes).map_err(|e| crate::errors::DeliveryError::Processing {
                path: relative_path.clone(),
                message: e.to_string(),
            })?;

        let rotated = match direction {
            RotateDirection::Right => decoded.rotate90(),
            RotateDirection::Left => decoded.rotate270(),
        };

        let mut out = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut out);
        let encoder = JpegEncoder::new_with_quality(&mut cursor, self.jpeg_quality);
        rotated.to_rgb8().write_with_encoder(encoder).map_err(|e| {
            crate::errors::DeliveryError::Processing {
                path: relative_path.clone(),
                message: e.to_string(),
            }
        })?;

        self.upload_store
            .write_atomic(&relative_path, &out)
            .await
            .map_err(|e| AppError::internal(e.to_string()))?;

        let mut active: images::ActiveModel = model.into();
        active.updated_at = Set(Utc::now());
        active.update(&*self.database.connection).await?;

        Ok(())
    }

    /// Soft-delete an image. The row stays for hash dedupe but disappears
    /// from every selection and count.
    pub async fn soft_delete(&self, id: Uuid) -> Result<(), AppError> {
        let model = self.require_active(&id).await?;

        let now = Utc::now();
        let mut active: images::ActiveModel = model.into();
        active.removed_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&*self.database.connection).await?;

        Ok(())
    }

    /// Idempotently attach a tag to a live image.
    pub async fn add_tag(&self, id: Uuid, title: &str) -> Result<(), AppError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::validation("tag cannot be empty"));
        }

        self.require_active(&id).await?;

        let txn = self.database.connection.begin().await?;
        let tag_id = ensure_tag(&txn, title).await?;
        link_tag(&txn, id, tag_id).await?;
        txn.commit().await?;

        Ok(())
    }

    async fn require_active(&self, id: &Uuid) -> Result<images::Model, AppError> {
        Images::find_by_id(*id)
            .filter(images::Column::RemovedAt.is_null())
            .one(&*self.database.connection)
            .await?
            .ok_or_else(|| AppError::not_found("image", id.to_string()))
    }

    async fn require_active_with_path(
        &self,
        id: &Uuid,
    ) -> Result<(images::Model, String), AppError> {
        let pair = Images::find_by_id(*id)
            .filter(images::Column::RemovedAt.is_null())
            .find_also_related(crate::entities::prelude::Partitions)
            .one(&*self.database.connection)
            .await?;

        match pair {
            Some((model, Some(partition))) => {
                let relative_path = format!("{}/{}", partition.folder_name, model.file_name);
                Ok((model, relative_path))
            }
            _ => Err(AppError::not_found("image", id.to_string())),
        }
    }

    /// Normalize an upload to JPEG. JPEG input is stored byte-identical so
    /// `original` delivery round-trips exactly; PNG is re-encoded at the
    /// configured quality; everything else is rejected.
    fn normalize_to_jpeg(&self, bytes: &[u8]) -> Result<Vec<u8>, UploadError> {
        let format = image::guess_format(bytes).map_err(|_| UploadError::UnsupportedFormat {
            detected: "unknown".to_string(),
        })?;

        match format {
            ImageFormat::Jpeg => Ok(bytes.to_vec()),
            ImageFormat::Png => {
                let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)
                    .map_err(|e| UploadError::Processing {
                        message: e.to_string(),
                    })?;
                let mut out = Vec::new();
                let mut cursor = std::io::Cursor::new(&mut out);
                let encoder = JpegEncoder::new_with_quality(&mut cursor, self.jpeg_quality);
                decoded
                    .to_rgb8()
                    .write_with_encoder(encoder)
                    .map_err(|e| UploadError::Processing {
                        message: e.to_string(),
                    })?;
                Ok(out)
            }
            other => Err(UploadError::UnsupportedFormat {
                detected: format!("{other:?}"),
            }),
        }
    }
}

/// User tags first (trimmed, empties dropped), then the automatic tags,
/// deduplicated keeping the first occurrence.
fn merge_tag_titles(user_tags: &[String], auto_tags: &[&str]) -> Vec<String> {
    let mut titles = Vec::new();
    for title in user_tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .chain(auto_tags.iter().map(|t| t.to_string()))
    {
        if !titles.contains(&title) {
            titles.push(title);
        }
    }
    titles
}

/// Find or create the tag row for a title.
async fn ensure_tag<C: ConnectionTrait>(conn: &C, title: &str) -> Result<i32, sea_orm::DbErr> {
    if let Some(tag) = Tags::find()
        .filter(tags::Column::Title.eq(title))
        .one(conn)
        .await?
    {
        return Ok(tag.id);
    }

    let model = tags::ActiveModel {
        title: Set(title.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(model.id)
}

/// Attach a tag to an image; an existing pair is left untouched.
async fn link_tag<C: ConnectionTrait>(
    conn: &C,
    image_id: Uuid,
    tag_id: i32,
) -> Result<(), sea_orm::DbErr> {
    let link = image_tags::ActiveModel {
        image_id: Set(image_id),
        tag_id: Set(tag_id),
    };
    crate::entities::prelude::ImageTags::insert(link)
        .on_conflict(
            OnConflict::columns([image_tags::Column::ImageId, image_tags::Column::TagId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
    Ok(())
}
