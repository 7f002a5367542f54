//! Domain models shared across repositories, services, and the web layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored image as seen by the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: Uuid,
    pub partition_id: i32,
    pub file_name: String,
    pub title: String,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub removed_at: Option<DateTime<Utc>>,
}

impl Image {
    /// Path of the backing file relative to the upload root.
    pub fn relative_path(&self, partition_folder: &str) -> String {
        format!("{}/{}", partition_folder, self.file_name)
    }
}

/// A capacity-bounded storage bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub id: i32,
    pub folder_name: String,
    pub created_at: DateTime<Utc>,
}

/// A tag title together with the number of live images carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagUsage {
    pub title: String,
    pub count: i64,
}
