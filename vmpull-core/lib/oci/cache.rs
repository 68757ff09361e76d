//! Content-addressed, manifest-digest-keyed cache store.
//!
//! Layout is `<root>/ghcr/<org>/<manifestId>/{manifest.json, metadata.json, <digest>}`.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use vmpull_utils::{
    digest_to_filename, GHCR_SUBDIR, MANIFEST_FILENAME, METADATA_FILENAME,
};

use crate::{
    oci::model::{ImageMetadata, Manifest},
    VmPullResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The on-disk, content-addressed cache of pulled images.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CacheStore {
    /// Creates a cache store rooted at `cache_root` (the directory configured via [`Settings`](crate::settings::Settings)).
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            root: cache_root.into(),
        }
    }

    /// The directory holding all GHCR cache entries for `org`.
    pub fn org_dir(&self, org: &str) -> PathBuf {
        self.root.join(GHCR_SUBDIR).join(org)
    }

    /// The directory for a single cached manifest.
    pub fn image_cache_dir(&self, org: &str, manifest_id: &str) -> PathBuf {
        self.org_dir(org).join(manifest_id)
    }

    /// Path to the cached `manifest.json`.
    pub fn manifest_path(&self, org: &str, manifest_id: &str) -> PathBuf {
        self.image_cache_dir(org, manifest_id).join(MANIFEST_FILENAME)
    }

    /// Path to the cached `metadata.json`.
    pub fn metadata_path(&self, org: &str, manifest_id: &str) -> PathBuf {
        self.image_cache_dir(org, manifest_id).join(METADATA_FILENAME)
    }

    /// Path to a cached layer's raw blob file.
    pub fn layer_path(&self, org: &str, manifest_id: &str, digest: &str) -> PathBuf {
        self.image_cache_dir(org, manifest_id)
            .join(digest_to_filename(digest))
    }

    /// True iff the on-disk manifest for `manifest_id` deserializes, its layers equal those of
    /// `manifest`, and every layer's file exists.
    #[tracing::instrument(skip(self, manifest))]
    pub async fn validate(&self, org: &str, manifest: &Manifest, manifest_id: &str) -> bool {
        let manifest_path = self.manifest_path(org, manifest_id);
        let raw = match fs::read(&manifest_path).await {
            Ok(raw) => raw,
            Err(_) => return false,
        };

        let cached: Manifest = match serde_json::from_slice(&raw) {
            Ok(cached) => cached,
            Err(_) => return false,
        };

        if cached.layers != manifest.layers {
            tracing::debug!(%manifest_id, "cached manifest layers differ from requested manifest");
            return false;
        }

        for layer in &manifest.layers {
            if !self.layer_path(org, manifest_id, &layer.digest).exists() {
                tracing::debug!(%manifest_id, digest = %layer.digest, "cached layer file missing");
                return false;
            }
        }

        true
    }

    /// Idempotently resets `manifest_id`'s directory: removes any existing contents, recreates
    /// it empty, then writes `manifest.json` and `metadata.json` before returning.
    #[tracing::instrument(skip(self, manifest))]
    pub async fn prepare(&self, org: &str, manifest_id: &str, manifest: &Manifest, image: &str) -> VmPullResult<()> {
        let dir = self.image_cache_dir(org, manifest_id);
        if dir.exists() {
            fs::remove_dir_all(&dir).await?;
        }
        fs::create_dir_all(&dir).await?;

        self.save_manifest(org, manifest_id, manifest).await?;
        self.save_metadata(
            org,
            manifest_id,
            &ImageMetadata {
                image: image.to_string(),
                manifest_id: manifest_id.to_string(),
                timestamp: Utc::now(),
            },
        )
        .await?;

        Ok(())
    }

    /// Overwrites `manifest.json` atomically.
    pub async fn save_manifest(
        &self,
        org: &str,
        manifest_id: &str,
        manifest: &Manifest,
    ) -> VmPullResult<()> {
        let path = self.manifest_path(org, manifest_id);
        write_json_atomically(&path, manifest).await
    }

    /// Overwrites `metadata.json` atomically.
    pub async fn save_metadata(
        &self,
        org: &str,
        manifest_id: &str,
        metadata: &ImageMetadata,
    ) -> VmPullResult<()> {
        let path = self.metadata_path(org, manifest_id);
        write_json_atomically(&path, metadata).await
    }

    /// Stores `source` into the cache as the file for `digest`, atomically.
    pub async fn store_layer(
        &self,
        org: &str,
        manifest_id: &str,
        digest: &str,
        source: &Path,
    ) -> VmPullResult<()> {
        let dest = self.layer_path(org, manifest_id, digest);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        if dest.exists() {
            fs::remove_file(&dest).await?;
        }
        fs::copy(source, &dest).await?;
        Ok(())
    }

    /// Removes every sibling cache directory under `<org>/` whose `metadata.json` names
    /// `repository` and whose directory name is not `current_manifest_id`. Directories without
    /// metadata are left untouched.
    #[tracing::instrument(skip(self))]
    pub async fn cleanup_old_versions(
        &self,
        org: &str,
        repository: &str,
        current_manifest_id: &str,
    ) -> VmPullResult<()> {
        let org_dir = self.org_dir(org);
        let mut entries = match fs::read_dir(&org_dir).await {
            Ok(entries) => entries,
            Err(_) => return Ok(()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == current_manifest_id {
                continue;
            }

            let metadata_path = entry.path().join(METADATA_FILENAME);
            let raw = match fs::read(&metadata_path).await {
                Ok(raw) => raw,
                Err(_) => continue,
            };

            let metadata: ImageMetadata = match serde_json::from_slice(&raw) {
                Ok(metadata) => metadata,
                Err(_) => continue,
            };

            if metadata.image == repository {
                tracing::info!(manifest_id = %name, %repository, "removing superseded cache entry");
                fs::remove_dir_all(entry.path()).await?;
            }
        }

        Ok(())
    }
}

async fn write_json_atomically<T: serde::Serialize>(path: &Path, value: &T) -> VmPullResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let temp_path = path.with_extension("json.tmp");
    let encoded = serde_json::to_vec_pretty(value)?;
    fs::write(&temp_path, encoded).await?;
    fs::rename(&temp_path, path).await?;
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
