//! `vmpull_core::error` is a module containing error utilities for the vmpull project.

use std::{
    error::Error,
    fmt::{self, Display},
};

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a vmpull-core related operation.
pub type VmPullResult<T> = Result<T, VmPullError>;

/// An error that occurred during a pull, cache, or materialization operation.
#[derive(pretty_error_debug::Debug, Error)]
pub enum VmPullError {
    /// The image reference was not of the form `name:tag` with both non-empty.
    #[error("invalid image format: {0}")]
    InvalidImageFormat(String),

    /// The registry auth endpoint did not return a usable token.
    #[error("failed to fetch registry token for {0}")]
    TokenFetchFailed(String),

    /// The registry did not return a 200 or a `Docker-Content-Digest` header.
    #[error("failed to fetch manifest for {0}")]
    ManifestFetchFailed(String),

    /// All retries were exhausted downloading a blob.
    #[error("failed to download layer {0}")]
    LayerDownloadFailed(String),

    /// The manifest advertised a disk part that was never produced.
    #[error("missing disk image part {0}")]
    MissingPart(u32),

    /// The materializer could not create a directory.
    #[error("failed to create directory: {0}")]
    DirectoryCreationFailed(String),

    /// The materializer found a directory it was not expecting to exist.
    #[error("directory already exists: {0}")]
    DirectoryAlreadyExists(String),

    /// The VM-directory provider has no mapping for a named location.
    #[error("location not found: {0}")]
    LocationNotFound(String),

    /// Reserved for the optional gzip layer pipeline; not currently producible.
    #[error("failed to decompress: {0}")]
    DecompressionFailed(String),

    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the HTTP transport layer.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Custom error.
    #[error("Custom error: {0}")]
    Custom(#[from] AnyError),
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl VmPullError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> VmPullError {
        VmPullError::Custom(AnyError {
            error: error.into(),
        })
    }
}

impl AnyError {
    /// Downcasts the error to a `T`.
    pub fn downcast<T>(&self) -> Option<&T>
    where
        T: Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<T>()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates an `Ok` `VmPullResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> VmPullResult<T> {
    Result::Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl PartialEq for AnyError {
    fn eq(&self, other: &Self) -> bool {
        self.error.to_string() == other.error.to_string()
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}
