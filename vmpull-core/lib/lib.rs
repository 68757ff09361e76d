//! `vmpull-core` pulls VM disk images from an OCI registry into a content-addressed cache and
//! materializes them as VM directories.

#![warn(missing_docs)]

pub mod error;
pub mod oci;
pub mod settings;
pub mod vmdir;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use error::*;
