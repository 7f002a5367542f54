//! Shared fixtures for unit tests: an in-memory database with the full
//! schema applied, plus seed helpers for rows and encoded images.

use chrono::{Duration, TimeZone, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database as SeaOrmDatabase,
    DatabaseBackend, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::database::Database;
use crate::entities::{image_tags, images, partitions, tags, prelude::Tags};

/// Fresh in-memory SQLite database with migrations applied.
///
/// The pool is pinned to a single connection: every pooled connection to
/// `sqlite::memory:` would otherwise get its own empty database.
pub async fn in_memory_database() -> Database {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(std::time::Duration::from_secs(3600));

    let connection = SeaOrmDatabase::connect(options).await.unwrap();
    let database = Database::from_connection(connection, DatabaseBackend::Sqlite);
    database.migrate().await.unwrap();
    database
}

/// Insert a partition row directly.
pub async fn seed_partition<C: ConnectionTrait>(conn: &C, id: i32) {
    partitions::ActiveModel {
        id: Set(id),
        folder_name: Set(format!("{id:04}")),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
    .unwrap();
}

/// Insert an image row. `seq` spaces creation times one second apart so
/// tests get a deterministic candidate ordering.
pub async fn seed_image<C: ConnectionTrait>(conn: &C, partition_id: i32, seq: i64) -> Uuid {
    let id = Uuid::new_v4();
    let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(seq);
    images::ActiveModel {
        id: Set(id),
        partition_id: Set(partition_id),
        file_name: Set(format!("{}.jpg", id.simple())),
        title: Set(format!("image-{seq}.jpg")),
        content_hash: Set(id.simple().to_string()),
        created_at: Set(created_at),
        updated_at: Set(created_at),
        removed_at: Set(None),
    }
    .insert(conn)
    .await
    .unwrap();
    id
}

/// Soft-delete an image row.
pub async fn mark_removed<C: ConnectionTrait>(conn: &C, image_id: Uuid) {
    let model = images::Entity::find_by_id(image_id)
        .one(conn)
        .await
        .unwrap()
        .unwrap();
    let now = Utc::now();
    let mut active: images::ActiveModel = model.into();
    active.removed_at = Set(Some(now));
    active.updated_at = Set(now);
    active.update(conn).await.unwrap();
}

/// Attach a tag (created on first use) to an image.
pub async fn tag_image<C: ConnectionTrait>(conn: &C, image_id: Uuid, title: &str) {
    let tag_id = match Tags::find()
        .filter(tags::Column::Title.eq(title))
        .one(conn)
        .await
        .unwrap()
    {
        Some(tag) => tag.id,
        None => {
            tags::ActiveModel {
                title: Set(title.to_string()),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(conn)
            .await
            .unwrap()
            .id
        }
    };

    image_tags::ActiveModel {
        image_id: Set(image_id),
        tag_id: Set(tag_id),
    }
    .insert(conn)
    .await
    .unwrap();
}

/// Solid-color PNG bytes.
pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut bytes = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Png,
    )
    .unwrap();
    bytes
}

/// Solid-color JPEG bytes.
pub fn jpeg_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut bytes = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Jpeg,
    )
    .unwrap();
    bytes
}
