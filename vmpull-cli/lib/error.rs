//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

use thiserror::Error;

/// The result of a vmpull-cli related operation.
pub type VmPullCliResult<T> = Result<T, VmPullCliError>;

/// An error that occurred during a file system operation.
#[derive(pretty_error_debug::Debug, Error)]
pub enum VmPullCliError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Error returned from the vmpull-core crate
    #[error(transparent)]
    Core(#[from] vmpull_core::VmPullError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Not found
    #[error("not found: {0}")]
    NotFound(String),
}
