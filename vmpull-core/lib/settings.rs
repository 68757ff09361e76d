//! Runtime configuration: where cached images and VM directories live.

use std::path::PathBuf;

use vmpull_utils::get_cache_home_path;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Supplies the directory pulls are cached under.
///
/// An explicit collaborator rather than a free function so tests and alternate front ends can
/// point pulls at an arbitrary directory without touching process environment.
pub trait Settings: Send + Sync {
    /// The root directory for the content-addressed cache.
    fn cache_directory(&self) -> PathBuf;
}

/// Resolves the cache directory from the `VMPULL_CACHE_HOME` environment variable, falling back
/// to `~/.vmpull`.
#[derive(Debug, Default, Clone)]
pub struct EnvSettings;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Settings for EnvSettings {
    fn cache_directory(&self) -> PathBuf {
        get_cache_home_path()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
