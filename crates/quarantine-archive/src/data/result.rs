use std::fmt;
use std::path::Path;

use quarantine_fs::{Removal, StagingDir};

use super::file::ExtractedFile;
use crate::detect::ContainerKind;
use crate::error::StrategyError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Standard,
    StrongCipher,
    NativeTool,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::StrongCipher => "strong-cipher",
            Self::NativeTool => "native-tool",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A failed strategy attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttemptRecord {
    pub strategy: StrategyKind,
    pub error: StrategyError,
}

/// Successful extraction: the decoded files and the staging directory that
/// holds their on-disk copies.
///
/// The caller owns the staging directory and must call [`cleanup`] once the
/// files have been consumed. Dropping the result removes it as well.
///
/// [`cleanup`]: ExtractionResult::cleanup
#[derive(Debug)]
pub struct ExtractionResult {
    files: Vec<ExtractedFile>,
    staging: StagingDir,
    strategy: StrategyKind,
    container: ContainerKind,
    attempts: Vec<AttemptRecord>,
}

impl ExtractionResult {
    pub(crate) fn new(
        files: Vec<ExtractedFile>,
        staging: StagingDir,
        strategy: StrategyKind,
        container: ContainerKind,
        attempts: Vec<AttemptRecord>,
    ) -> Self {
        Self {
            files,
            staging,
            strategy,
            container,
            attempts,
        }
    }

    pub fn files(&self) -> &[ExtractedFile] { &self.files }

    pub fn staging_directory(&self) -> &Path { self.staging.path() }

    /// The strategy that produced the files.
    pub fn strategy(&self) -> StrategyKind { self.strategy }

    pub fn container(&self) -> ContainerKind { self.container }

    /// Failed attempts that preceded the successful one.
    pub fn attempts(&self) -> &[AttemptRecord] { &self.attempts }

    /// Remove the staging directory. Idempotent.
    pub fn cleanup(&mut self) -> Removal { self.staging.cleanup() }

    pub fn into_parts(self) -> (Vec<ExtractedFile>, StagingDir) { (self.files, self.staging) }
}
