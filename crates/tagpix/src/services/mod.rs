//! Service layer: the selection, partitioning, tagging, and render-caching
//! engines plus the upload/mutation orchestrator.

pub mod images;
pub mod partition_store;
pub mod render_cache;
pub mod selection;
pub mod tagger;

pub use images::{ImageService, NewUpload, RotateDirection, StoredImage};
pub use partition_store::PartitionStore;
pub use render_cache::{RenderCache, Rendered, SizeSpec};
pub use selection::{ClientIdentity, RandomSource, SelectionEngine, SelectionMode, ThreadRandom};
pub use tagger::{BackgroundColor, Classification, Orientation, ResolutionClass, VisualTagger};
