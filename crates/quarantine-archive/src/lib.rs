//! Staged extraction of untrusted, possibly encrypted ZIP-family archives
//! for read-only analysis.
//!
//! # Architecture
//!
//! - `detect.rs` - Container sniffing
//! - `sanitize.rs` - Entry path sanitization (zip-slip prevention)
//! - `limits.rs` - Decompression-bomb ceilings
//! - `classify.rs` - Failure taxonomy mapping
//! - `materialize.rs` - Writing entries into staging, read-only
//! - `strategy/` - Standard, strong-cipher and native-tool decoders
//! - `orchestrator.rs` - Strategy chain and staging lifecycle
//! - `observer.rs` - Injected diagnostics
//! - `data/` - Shared types
//!
//! Extracted content is only ever read, never executed: staged files are
//! marked read-only and nothing here spawns anything but the extraction tool.

use std::path::Path;

pub use data::{
    AttemptRecord, ExtractOptions, ExtractedFile, ExtractionResult, Limits, NativeToolOptions, StrategyKind,
};
pub use data::options::OVERRIDE_ENV;
pub use detect::{ContainerKind, detect_container, sniff_file};
pub use error::{ExtractError, FailureKind, INSTALL_ADVICE, Result, StrategyError, StrategyResult};
pub use observer::{Event, Observer, RecordingObserver, TracingObserver};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, most_specific};
pub use quarantine_fs::{Removal, StagingDir, StagingRoot, remove_staging_dir};
pub use sanitize::{SanitizedPath, sanitize_entry_path};
pub use strategy::{AttemptContext, NativeToolDecoder, StandardDecoder, Strategy, StrongCipherDecoder};

pub mod classify;
pub mod data;
mod detect;
mod error;
pub mod limits;
mod materialize;
mod observer;
mod orchestrator;
mod sanitize;
pub mod strategy;

/// Extract with default limits, the system staging root and the native tool
/// found on this host.
pub fn extract(archive: &Path, password: Option<&str>) -> Result<ExtractionResult> {
    Orchestrator::new(ExtractOptions::default()).extract(archive, password)
}
