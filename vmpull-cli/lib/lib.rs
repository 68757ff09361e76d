//! `vmpull-cli` is the command line interface for pulling and listing cached VM images.

#![warn(missing_docs)]

pub mod args;
pub mod error;
pub mod handlers;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use args::*;
pub use error::*;
