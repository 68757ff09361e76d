//! `vmpull-utils` is a library containing general utilities for the vmpull project.

#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod defaults;
pub mod env;
pub mod error;
pub mod path;
pub mod term;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use defaults::*;
pub use env::*;
pub use error::*;
pub use path::*;
pub use term::*;
