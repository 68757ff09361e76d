//! `vmpull_utils::path` is a module containing path utilities for the vmpull project.

use std::path::{Path, PathBuf};

use crate::{VmPullUtilsError, VmPullUtilsResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The directory name for vmpull's global cache data.
pub const VMPULL_HOME_DIR: &str = ".vmpull";

/// The registry subdirectory under the cache home, per registry host.
///
/// Example: <VMPULL_HOME_DIR>/<GHCR_SUBDIR>/<org>/<manifestId>
pub const GHCR_SUBDIR: &str = "ghcr";

/// The manifest file name within a cached manifest-id directory.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// The metadata file name within a cached manifest-id directory.
pub const METADATA_FILENAME: &str = "metadata.json";

/// The staged disk image file name.
pub const DISK_IMAGE_FILENAME: &str = "disk.img";

/// The staged VM config file name.
pub const CONFIG_FILENAME: &str = "config.json";

/// The staged NVRAM blob file name.
pub const NVRAM_FILENAME: &str = "nvram.bin";

/// The default subdirectory (under the cache home) where named VM directories live
/// when no location override is configured.
pub const VMS_SUBDIR: &str = "vms";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Replaces every `:` in a digest (e.g. `sha256:abcd...`) with `_`, producing a filesystem-safe
/// name suitable for a cache directory or layer file.
pub fn digest_to_filename(digest: &str) -> String {
    digest.replace(':', "_")
}

/// Returns the first 12 hex characters following the algorithm prefix of a digest or a
/// filesystem-safe id produced by [`digest_to_filename`], e.g. `sha256:abcdef...` or
/// `sha256_abcdef...` -> `abcdef012345`. Falls back to the first 12 characters of the whole
/// string if there is no separator.
pub fn short_id(digest: &str) -> String {
    let hex = digest
        .split_once(':')
        .or_else(|| digest.split_once('_'))
        .map(|(_, h)| h)
        .unwrap_or(digest);
    hex.chars().take(12).collect()
}

/// Resolves the path to a file, checking both environment variable and default locations.
///
/// First checks the environment variable specified by `env_var`.
/// If that's not set, falls back to `default_path`.
/// Returns an error if the file is not found at the resolved location.
pub fn resolve_env_path(
    env_var: &str,
    default_path: impl AsRef<Path>,
) -> VmPullUtilsResult<PathBuf> {
    let (path, source) = std::env::var(env_var)
        .map(|p| (PathBuf::from(p), "environment variable"))
        .unwrap_or_else(|_| (default_path.as_ref().to_path_buf(), "default path"));

    if !path.exists() {
        return Err(VmPullUtilsError::FileNotFound(
            path.to_string_lossy().to_string(),
            source.to_string(),
        ));
    }

    Ok(path)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
