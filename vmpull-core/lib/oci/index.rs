//! Lists the images currently present in the content-addressed cache.

use std::path::Path;

use tokio::fs;
use vmpull_utils::{digest_to_filename, short_id, GHCR_SUBDIR, METADATA_FILENAME};

use crate::{oci::model::{CachedImage, ImageMetadata}, VmPullResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Scans `<cache_root>/ghcr/<org>/*` for cache entries with a readable `metadata.json`, returning
/// one [`CachedImage`] per entry, sorted by `(repository, imageId)`.
///
/// Directories without a readable or parseable `metadata.json` are skipped and logged, not
/// treated as an error.
#[tracing::instrument]
pub async fn list_cached_images(cache_root: &Path) -> VmPullResult<Vec<CachedImage>> {
    let ghcr_root = cache_root.join(GHCR_SUBDIR);
    let mut images = Vec::new();

    let mut org_entries = match fs::read_dir(&ghcr_root).await {
        Ok(entries) => entries,
        Err(_) => return Ok(images),
    };

    while let Some(org_entry) = org_entries.next_entry().await? {
        if !org_entry.file_type().await?.is_dir() {
            continue;
        }
        let org_path = org_entry.path();

        let mut manifest_entries = fs::read_dir(&org_path).await?;
        while let Some(manifest_entry) = manifest_entries.next_entry().await? {
            if !manifest_entry.file_type().await?.is_dir() {
                continue;
            }

            let manifest_id = manifest_entry.file_name().to_string_lossy().into_owned();
            let metadata_path = manifest_entry.path().join(METADATA_FILENAME);

            let raw = match fs::read(&metadata_path).await {
                Ok(raw) => raw,
                Err(_) => {
                    tracing::debug!(%manifest_id, "skipping cache entry without metadata.json");
                    continue;
                }
            };

            let metadata: ImageMetadata = match serde_json::from_slice(&raw) {
                Ok(metadata) => metadata,
                Err(err) => {
                    tracing::debug!(%manifest_id, %err, "skipping cache entry with unparseable metadata.json");
                    continue;
                }
            };

            images.push(CachedImage {
                repository: metadata.image,
                image_id: short_id(&manifest_id),
                manifest_id,
            });
        }
    }

    images.sort_by(|a, b| (a.repository.as_str(), a.image_id.as_str()).cmp(&(b.repository.as_str(), b.image_id.as_str())));

    Ok(images)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
