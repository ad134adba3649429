//! Extraction strategies, cheapest first.

use std::path::Path;

use crate::data::{ExtractedFile, Limits, StrategyKind};
use crate::detect::ContainerKind;
use crate::error::StrategyResult;
use crate::limits::Budget;
use crate::observer::Observer;

pub use native::NativeToolDecoder;
pub use standard::StandardDecoder;
pub use strong::StrongCipherDecoder;

mod listing;
mod native;
mod standard;
mod strong;
mod zip_common;

/// Shared, read-only state of one attempt.
#[derive(Clone, Copy)]
pub struct AttemptContext<'a> {
    pub limits: &'a Limits,
    pub observer: &'a dyn Observer,
}

impl AttemptContext<'_> {
    pub fn budget(&self) -> Budget { Budget::new(*self.limits) }
}

pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Whether this strategy can read the given container family at all.
    fn handles(&self, _container: ContainerKind) -> bool { true }

    /// Decode `archive` into `staging`.
    ///
    /// `staging` may already hold output of earlier attempts; implementations
    /// must neither rely on it being empty nor clear it.
    fn attempt(
        &self,
        archive: &Path,
        password: Option<&str>,
        staging: &Path,
        ctx: &AttemptContext<'_>,
    ) -> StrategyResult<Vec<ExtractedFile>>;
}
