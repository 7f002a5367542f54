//! # Sandboxed File Store
//!
//! File storage confined to a base directory, with path validation and
//! atomic writes.
//!
//! All operations take paths relative to the store's base directory and
//! reject anything that would resolve outside of it (absolute paths,
//! `..` components, null bytes). Writes that must never be observed
//! half-finished go through [`FileStore::write_atomic`], which stages the
//! contents in a temporary file next to the destination and renames it
//! into place.
//!
//! ```rust
//! use sandboxed_file_store::FileStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileStore::builder()
//!     .base_directory("/var/lib/myapp/cache")
//!     .build()
//!     .await?;
//!
//! store.write_atomic("renders/abc123.jpg", b"jpeg bytes").await?;
//! let bytes = store.read("renders/abc123.jpg").await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod security;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{FileStore, FileStoreBuilder};
