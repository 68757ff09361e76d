//! Default values and constants used throughout the vmpull project.
//!
//! This module provides default configuration values, paths, and other constants
//! that are used by various components of the vmpull system.
//!
//! # Examples
//!
//! ```
//! use vmpull_utils::defaults::{DEFAULT_MAX_RETRIES, DEFAULT_CHUNK_SIZE};
//!
//! let retries = DEFAULT_MAX_RETRIES;
//! let chunk = DEFAULT_CHUNK_SIZE;
//! ```

use std::{path::PathBuf, sync::LazyLock};

use crate::VMPULL_HOME_DIR;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The path where all vmpull cache data is stored by default.
pub static DEFAULT_VMPULL_CACHE_HOME: LazyLock<PathBuf> =
    LazyLock::new(|| dirs::home_dir().unwrap().join(VMPULL_HOME_DIR));

/// The default registry domain.
pub const DEFAULT_REGISTRY_DOMAIN: &str = "ghcr.io";

/// The maximum number of blob download attempts before surfacing `LayerDownloadFailed`.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Seconds to sleep per retry attempt is `attempt * DEFAULT_RETRY_BACKOFF_SECS`.
pub const DEFAULT_RETRY_BACKOFF_SECS: u64 = 5;

/// Per-HTTP-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Per-blob resource timeout (covers the whole download, including retries).
pub const DEFAULT_RESOURCE_TIMEOUT_SECS: u64 = 3600;

/// Maximum number of layer downloads in flight at once, per pull.
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 5;

/// The default chunk size used by the reassembler and blob streaming, in bytes (512 KiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 512 * 1024;

/// The minimum chunk size the memory probe will ever return (512 KiB).
pub const MIN_CHUNK_SIZE: u64 = 512 * 1024;

/// The maximum chunk size the memory probe will ever return (2 MiB).
pub const MAX_CHUNK_SIZE: u64 = 2 * 1024 * 1024;

/// Free-memory threshold, in bytes, at or above which the memory probe considers itself able to
/// size chunks generously (1 GiB).
pub const CHUNK_SIZING_FREE_MEMORY_THRESHOLD: u64 = 1024 * 1024 * 1024;

/// Free-memory threshold, in bytes, below which the host is considered memory-constrained (2 GiB).
pub const MEMORY_CONSTRAINED_THRESHOLD: u64 = 2 * 1024 * 1024 * 1024;

/// How often (every N chunks) the reassembler requests an fsync while memory-constrained.
pub const FSYNC_EVERY_N_CHUNKS: u64 = 10;

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
