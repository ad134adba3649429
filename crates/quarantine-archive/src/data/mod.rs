pub mod file;
pub mod options;
pub mod result;

pub use file::ExtractedFile;
pub use options::{ExtractOptions, Limits, NativeToolOptions};
pub use result::{AttemptRecord, ExtractionResult, StrategyKind};
