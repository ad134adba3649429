//! Extraction lifecycle events.
//!
//! An [`Observer`] is handed to the orchestrator and receives every
//! diagnostic event. Passwords are never passed to observers; only whether
//! one was supplied.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::data::StrategyKind;
use crate::detect::ContainerKind;
use crate::error::{FailureKind, StrategyError};

/// Receiver of extraction events. Every method defaults to a no-op.
pub trait Observer: Send + Sync {
    fn staging_allocated(&self, _path: &Path) {}

    fn container_detected(&self, _archive: &Path, _container: ContainerKind) {}

    fn attempt_started(&self, _strategy: StrategyKind, _archive: &Path, _password_supplied: bool) {}

    fn attempt_failed(&self, _strategy: StrategyKind, _error: &StrategyError) {}

    fn attempt_succeeded(&self, _strategy: StrategyKind, _files: usize) {}

    fn entry_staged(&self, _relative_path: &str, _size: u64) {}

    /// An entry was left out without failing the attempt.
    fn entry_skipped(&self, _entry: &str, _reason: &str) {}

    fn tool_resolved(&self, _path: &Path) {}

    fn extraction_failed(&self, _error: &StrategyError) {}

    fn cleanup_failed(&self, _path: &Path, _reason: &str) {}
}

/// Forwards events to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn staging_allocated(&self, path: &Path) {
        debug!(path = %path.display(), "staging directory ready");
    }

    fn container_detected(&self, archive: &Path, container: ContainerKind) {
        debug!(archive = %archive.display(), %container, "sniffed container");
    }

    fn attempt_started(&self, strategy: StrategyKind, archive: &Path, password_supplied: bool) {
        debug!(%strategy, archive = %archive.display(), password_supplied, "extraction attempt started");
    }

    fn attempt_failed(&self, strategy: StrategyKind, error: &StrategyError) {
        debug!(%strategy, kind = %error.kind(), %error, "extraction attempt failed");
    }

    fn attempt_succeeded(&self, strategy: StrategyKind, files: usize) {
        info!(%strategy, files, "archive extracted");
    }

    fn entry_staged(&self, relative_path: &str, size: u64) {
        debug!(entry = relative_path, size, "entry staged");
    }

    fn entry_skipped(&self, entry: &str, reason: &str) {
        warn!(entry, reason, "entry skipped");
    }

    fn tool_resolved(&self, path: &Path) {
        debug!(tool = %path.display(), "using native extraction tool");
    }

    fn extraction_failed(&self, error: &StrategyError) {
        warn!(kind = %error.kind(), %error, "extraction failed");
    }

    fn cleanup_failed(&self, path: &Path, reason: &str) {
        warn!(path = %path.display(), reason, "staging cleanup failed");
    }
}

/// Events captured by [`RecordingObserver`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    StagingAllocated(PathBuf),
    ContainerDetected(ContainerKind),
    AttemptStarted { strategy: StrategyKind, password_supplied: bool },
    AttemptFailed { strategy: StrategyKind, kind: FailureKind },
    AttemptSucceeded { strategy: StrategyKind, files: usize },
    EntryStaged { relative_path: String, size: u64 },
    EntrySkipped { entry: String, reason: String },
    ToolResolved(PathBuf),
    ExtractionFailed(FailureKind),
    CleanupFailed { path: PathBuf, reason: String },
}

/// Keeps every event in memory, for assertions.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn new() -> Self { Self::default() }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Strategies that were started, in order.
    pub fn started(&self) -> Vec<StrategyKind> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::AttemptStarted { strategy, .. } => Some(strategy),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Observer for RecordingObserver {
    fn staging_allocated(&self, path: &Path) { self.push(Event::StagingAllocated(path.to_path_buf())) }

    fn container_detected(&self, _archive: &Path, container: ContainerKind) {
        self.push(Event::ContainerDetected(container))
    }

    fn attempt_started(&self, strategy: StrategyKind, _archive: &Path, password_supplied: bool) {
        self.push(Event::AttemptStarted {
            strategy,
            password_supplied,
        })
    }

    fn attempt_failed(&self, strategy: StrategyKind, error: &StrategyError) {
        self.push(Event::AttemptFailed {
            strategy,
            kind: error.kind(),
        })
    }

    fn attempt_succeeded(&self, strategy: StrategyKind, files: usize) {
        self.push(Event::AttemptSucceeded { strategy, files })
    }

    fn entry_staged(&self, relative_path: &str, size: u64) {
        self.push(Event::EntryStaged {
            relative_path: relative_path.to_string(),
            size,
        })
    }

    fn entry_skipped(&self, entry: &str, reason: &str) {
        self.push(Event::EntrySkipped {
            entry: entry.to_string(),
            reason: reason.to_string(),
        })
    }

    fn tool_resolved(&self, path: &Path) { self.push(Event::ToolResolved(path.to_path_buf())) }

    fn extraction_failed(&self, error: &StrategyError) { self.push(Event::ExtractionFailed(error.kind())) }

    fn cleanup_failed(&self, path: &Path, reason: &str) {
        self.push(Event::CleanupFailed {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    impl Observer for Silent {}

    #[test]
    fn default_methods_are_noops() {
        let observer = Silent;
        observer.attempt_started(StrategyKind::Standard, Path::new("a.zip"), true);
        observer.extraction_failed(&StrategyError::PasswordRequired);
    }

    #[test]
    fn recording_observer_keeps_order() {
        let observer = RecordingObserver::new();
        observer.attempt_started(StrategyKind::Standard, Path::new("a.zip"), false);
        observer.attempt_failed(StrategyKind::Standard, &StrategyError::unsupported("aes"));
        observer.attempt_started(StrategyKind::StrongCipher, Path::new("a.zip"), false);

        assert_eq!(observer.started(), vec![StrategyKind::Standard, StrategyKind::StrongCipher]);
        assert_eq!(
            observer.events()[1],
            Event::AttemptFailed {
                strategy: StrategyKind::Standard,
                kind: FailureKind::UnsupportedEncryption,
            }
        );
    }
}
