//! Running budget against [`Limits`] for one extraction attempt.

use std::io::{self, Read};

use crate::data::Limits;
use crate::error::{StrategyError, StrategyResult};

#[derive(Debug)]
pub struct Budget {
    limits: Limits,
    entries: usize,
    total_bytes: u64,
}

impl Budget {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            entries: 0,
            total_bytes: 0,
        }
    }

    /// Check an entry's declared size before decoding it, and count it.
    pub fn admit(&mut self, name: &str, declared: u64) -> StrategyResult<()> {
        if self.entries >= self.limits.max_entries {
            return Err(StrategyError::limit(format!(
                "more than {} entries",
                self.limits.max_entries
            )));
        }
        if declared > self.limits.max_entry_bytes {
            return Err(StrategyError::limit(format!(
                "entry '{name}' declares {declared} bytes, limit is {}",
                self.limits.max_entry_bytes
            )));
        }
        if self.total_bytes.saturating_add(declared) > self.limits.max_total_bytes {
            return Err(self.total_exceeded());
        }
        self.entries += 1;
        Ok(())
    }

    /// Bytes the next entry may decode to before it trips a limit.
    pub fn entry_allowance(&self) -> u64 {
        self.limits
            .max_entry_bytes
            .min(self.limits.max_total_bytes.saturating_sub(self.total_bytes))
    }

    /// Record the realized size of a decoded entry.
    pub fn commit(&mut self, name: &str, realized: u64) -> StrategyResult<()> {
        if realized > self.limits.max_entry_bytes {
            return Err(StrategyError::limit(format!(
                "entry '{name}' expands past {} bytes",
                self.limits.max_entry_bytes
            )));
        }
        self.total_bytes = self.total_bytes.saturating_add(realized);
        if self.total_bytes > self.limits.max_total_bytes {
            return Err(self.total_exceeded());
        }
        Ok(())
    }

    pub fn entries(&self) -> usize { self.entries }

    fn total_exceeded(&self) -> StrategyError {
        StrategyError::limit(format!(
            "decompressed content exceeds {} bytes",
            self.limits.max_total_bytes
        ))
    }
}

/// Read at most `allowance + 1` bytes, so an overrun is observable without
/// decoding the rest of the stream.
pub fn read_capped<R: Read>(reader: R, allowance: u64) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(allowance.saturating_add(1)).read_to_end(&mut buf)?;
    Ok(buf)
}
