use std::time::Duration;

use quarantine_fs::StagingRoot;
use quarantine_platform::{DEFAULT_MAX_OUTPUT, DEFAULT_TIMEOUT};

const MIB: u64 = 1024 * 1024;

/// Environment variable naming an explicit native tool binary.
pub const OVERRIDE_ENV: &str = "QUARANTINE_7Z_PATH";

/// Decompression-bomb ceilings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_entry_bytes: u64,
    pub max_total_bytes: u64,
    pub max_entries: usize,
    /// Largest archive the in-memory decoder will load.
    pub max_archive_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_entry_bytes: 256 * MIB,
            max_total_bytes: 1024 * MIB,
            max_entries: 10_000,
            max_archive_bytes: 512 * MIB,
        }
    }
}

impl Limits {
    pub fn max_entry_bytes(mut self, bytes: u64) -> Self {
        self.max_entry_bytes = bytes;
        self
    }

    pub fn max_total_bytes(mut self, bytes: u64) -> Self {
        self.max_total_bytes = bytes;
        self
    }

    pub fn max_entries(mut self, count: usize) -> Self {
        self.max_entries = count;
        self
    }

    pub fn max_archive_bytes(mut self, bytes: u64) -> Self {
        self.max_archive_bytes = bytes;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeToolOptions {
    pub timeout: Duration,
    /// Per-stream capture limit.
    pub max_output_bytes: usize,
    /// Capture limit for the listing read before extraction. A longer
    /// listing is refused as over the limits.
    pub max_listing_bytes: usize,
    pub override_env: String,
}

impl Default for NativeToolOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT,
            max_listing_bytes: 8 * MIB as usize,
            override_env: OVERRIDE_ENV.to_string(),
        }
    }
}

impl NativeToolOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    pub fn max_listing_bytes(mut self, bytes: usize) -> Self {
        self.max_listing_bytes = bytes;
        self
    }

    pub fn override_env(mut self, var: impl Into<String>) -> Self {
        self.override_env = var.into();
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExtractOptions {
    pub limits: Limits,
    pub native: NativeToolOptions,
    pub staging_root: StagingRoot,
}

impl ExtractOptions {
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn native(mut self, native: NativeToolOptions) -> Self {
        self.native = native;
        self
    }

    pub fn staging_root(mut self, root: StagingRoot) -> Self {
        self.staging_root = root;
        self
    }
}
