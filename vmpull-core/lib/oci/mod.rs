//! OCI registry client, content-addressed cache, and VM-image pull orchestration.

pub mod cache;
pub mod index;
pub mod materialize;
pub mod memory;
pub mod model;
pub mod pull;
pub mod reassemble;
pub mod reference;
pub mod registry;
pub mod scheduler;
pub mod singleflight;

pub use cache::CacheStore;
pub use index::list_cached_images;
pub use model::{CachedImage, ImageMetadata, Layer, Manifest};
pub use pull::pull;
pub use reference::ImageReference;
pub use registry::RegistryClient;
pub use scheduler::{DownloadScheduler, PartSource, Progress};
pub use singleflight::SingleFlight;
