//! Staging directories for untrusted extracted content.
//!
//! Every extraction request gets its own directory under a dedicated root.
//! Removal is idempotent and never fails loudly: a cleanup problem is logged
//! and reported as a [`Removal`] value rather than an error.

pub use error::{Error, Result};
pub use permissions::{is_executable, mark_read_only};
pub use staging::{Removal, StagingDir, StagingRoot, create_unique_dir, remove_staging_dir};

mod error;
mod permissions;
mod staging;
