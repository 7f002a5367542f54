//! Derived render artifacts with mtime-keyed invalidation.
//!
//! A resized render is cached on disk under a key hashed from the source
//! path, the size label, and the source's modification time. Mutating the
//! source (rotation) bumps its mtime and therefore derives a fresh key;
//! stale artifacts are simply never addressed again. `original` requests
//! bypass the cache entirely and stream the source bytes.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use sandboxed_file_store::FileStore;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

use crate::errors::DeliveryError;

/// Requested render size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeSpec {
    /// Serve the stored file untouched
    Original,
    /// Cover-crop to exactly this many pixels
    Exact { width: u32, height: u32 },
}

impl SizeSpec {
    /// Stable label used in cache keys and session fingerprints.
    pub fn label(&self) -> String {
        match self {
            SizeSpec::Original => "orig".to_string(),
            SizeSpec::Exact { width, height } => format!("{width}x{height}"),
        }
    }
}

/// Bytes ready to send plus the metadata conditional responses need.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub bytes: Bytes,
    pub last_modified: DateTime<Utc>,
    /// Content hash of exactly the bytes being sent
    pub etag: String,
}

/// Produces and reuses resized JPEG artifacts.
#[derive(Clone)]
pub struct RenderCache {
    cache_store: FileStore,
    jpeg_quality: u8,
}

impl RenderCache {
    pub fn new(cache_store: FileStore, jpeg_quality: u8) -> Self {
        Self {
            cache_store,
            jpeg_quality,
        }
    }

    /// Resolve a source file and requested size to sendable bytes.
    ///
    /// The caller has already checked that `source` exists (a missing
    /// source is a soft not-found handled with the fallback image).
    pub async fn resolve(&self, source: &Path, size: &SizeSpec) -> Result<Rendered, DeliveryError> {
        let source_modified = file_modified(source).await?;

        match size {
            SizeSpec::Original => {
                let bytes = tokio::fs::read(source).await.map_err(|e| cache_io(source, e))?;
                Ok(Rendered {
                    etag: content_etag(&bytes),
                    last_modified: source_modified,
                    bytes: bytes.into(),
                })
            }
            SizeSpec::Exact { width, height } => {
                // Microsecond precision: a rotation within the same second
                // must still derive a fresh key.
                let key = cache_key(source, &size.label(), source_modified.timestamp_micros());
                let artifact = format!("{key}.jpg");

                let exists = self
                    .cache_store
                    .exists(&artifact)
                    .await
                    .map_err(|e| cache_io(source, std::io::Error::other(e)))?;
                if exists {
                    debug!("render cache hit: {artifact}");
                    let bytes = self
                        .cache_store
                        .read(&artifact)
                        .await
                        .map_err(|e| cache_io(source, std::io::Error::other(e)))?;
                    let meta = self
                        .cache_store
                        .metadata(&artifact)
                        .await
                        .map_err(|e| cache_io(source, std::io::Error::other(e)))?;
                    let last_modified = meta
                        .modified()
                        .map(DateTime::<Utc>::from)
                        .unwrap_or(source_modified);
                    return Ok(Rendered {
                        etag: content_etag(&bytes),
                        last_modified,
                        bytes: bytes.into(),
                    });
                }

                debug!("render cache miss: {artifact} ({width}x{height})");
                let rendered = self.render(source, *width, *height)?;
                self.cache_store
                    .write_atomic(&artifact, &rendered)
                    .await
                    .map_err(|e| cache_io(source, std::io::Error::other(e)))?;

                let last_modified = match self.cache_store.metadata(&artifact).await {
                    Ok(meta) => meta
                        .modified()
                        .map(DateTime::<Utc>::from)
                        .unwrap_or_else(|_| Utc::now()),
                    Err(_) => Utc::now(),
                };

                Ok(Rendered {
                    etag: content_etag(&rendered),
                    last_modified,
                    bytes: rendered.into(),
                })
            }
        }
    }

    /// Cover-crop the source to the exact target size and encode as JPEG.
    fn render(&self, source: &Path, width: u32, height: u32) -> Result<Vec<u8>, DeliveryError> {
        let decoded = image::open(source).map_err(|e| DeliveryError::Processing {
            path: source.display().to_string(),
            message: e.to_string(),
        })?;

        // resize_to_fill fills the target and crops the overflow centered,
        // never letterboxing.
        let resized = decoded.resize_to_fill(width, height, FilterType::Lanczos3);

        let mut out = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut out);
        let encoder = JpegEncoder::new_with_quality(&mut cursor, self.jpeg_quality);
        resized
            .to_rgb8()
            .write_with_encoder(encoder)
            .map_err(|e| DeliveryError::Processing {
                path: source.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(out)
    }
}

/// Cache key for a (source, size label, source mtime) triple.
pub(crate) fn cache_key(source: &Path, size_label: &str, mtime_micros: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.display().to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(size_label.as_bytes());
    hasher.update(b"|");
    hasher.update(mtime_micros.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash of the bytes actually sent, used as the ETag value.
pub(crate) fn content_etag(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

async fn file_modified(path: &Path) -> Result<DateTime<Utc>, DeliveryError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| cache_io(path, e))?;
    let modified = meta.modified().map_err(|e| cache_io(path, e))?;
    Ok(DateTime::<Utc>::from(modified))
}

fn cache_io(path: &Path, error: std::io::Error) -> DeliveryError {
    DeliveryError::CacheIo {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::jpeg_bytes;
    use std::time::{Duration, SystemTime};

    async fn cache_in_tempdir(quality: u8) -> (tempfile::TempDir, RenderCache) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::builder()
            .base_directory(dir.path().join("cache"))
            .build()
            .await
            .unwrap();
        (dir, RenderCache::new(store, quality))
    }

    fn write_source(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn cached_artifacts(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir.join("cache"))
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn original_mode_returns_source_bytes_untouched() {
        let (dir, cache) = cache_in_tempdir(90).await;
        let source_bytes = jpeg_bytes(10, 8, [200, 0, 0]);
        let source = write_source(dir.path(), "img.jpg", &source_bytes);

        let rendered = cache.resolve(&source, &SizeSpec::Original).await.unwrap();

        assert_eq!(rendered.bytes.as_ref(), source_bytes.as_slice());
        assert_eq!(rendered.etag, content_etag(&source_bytes));
        // Original mode never writes artifacts.
        assert!(cached_artifacts(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn repeated_renders_reuse_the_cached_artifact() {
        let (dir, cache) = cache_in_tempdir(90).await;
        let source = write_source(dir.path(), "img.jpg", &jpeg_bytes(100, 50, [0, 0, 200]));
        let size = SizeSpec::Exact {
            width: 40,
            height: 40,
        };

        let first = cache.resolve(&source, &size).await.unwrap();
        let second = cache.resolve(&source, &size).await.unwrap();

        assert_eq!(first.bytes, second.bytes);
        assert_eq!(first.etag, second.etag);
        assert_eq!(cached_artifacts(dir.path()).len(), 1);

        // The artifact fills the target exactly (cover crop, no letterbox).
        let decoded = image::load_from_memory(&first.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 40));
    }

    #[tokio::test]
    async fn source_mtime_change_derives_a_fresh_artifact() {
        let (dir, cache) = cache_in_tempdir(90).await;
        let source = write_source(dir.path(), "img.jpg", &jpeg_bytes(60, 60, [0, 200, 0]));
        let size = SizeSpec::Exact {
            width: 30,
            height: 30,
        };

        cache.resolve(&source, &size).await.unwrap();
        assert_eq!(cached_artifacts(dir.path()).len(), 1);

        // Simulate a rotation: same path, new modification time.
        let file = std::fs::OpenOptions::new().write(true).open(&source).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(30))
            .unwrap();
        drop(file);

        cache.resolve(&source, &size).await.unwrap();
        assert_eq!(cached_artifacts(dir.path()).len(), 2);
    }

    #[tokio::test]
    async fn corrupt_source_is_a_processing_error_and_writes_nothing() {
        let (dir, cache) = cache_in_tempdir(90).await;
        let source = write_source(dir.path(), "broken.jpg", b"definitely not a jpeg");

        let result = cache
            .resolve(
                &source,
                &SizeSpec::Exact {
                    width: 10,
                    height: 10,
                },
            )
            .await;

        assert!(matches!(result, Err(DeliveryError::Processing { .. })));
        assert!(cached_artifacts(dir.path()).is_empty());
    }

    #[test]
    fn cache_key_varies_with_every_component() {
        let base = cache_key(Path::new("/u/0001/a.jpg"), "300x300", 1_000);
        assert_ne!(base, cache_key(Path::new("/u/0001/b.jpg"), "300x300", 1_000));
        assert_ne!(base, cache_key(Path::new("/u/0001/a.jpg"), "301x300", 1_000));
        assert_ne!(base, cache_key(Path::new("/u/0001/a.jpg"), "300x300", 1_001));
        assert_eq!(base, cache_key(Path::new("/u/0001/a.jpg"), "300x300", 1_000));
    }

    #[test]
    fn size_labels() {
        assert_eq!(SizeSpec::Original.label(), "orig");
        assert_eq!(
            SizeSpec::Exact {
                width: 300,
                height: 200
            }
            .label(),
            "300x200"
        );
    }
}
