use std::fs;
use std::io::Cursor;
use std::path::Path;

use super::zip_common::{AesPolicy, decode_zip};
use super::{AttemptContext, Strategy};
use crate::data::{ExtractedFile, StrategyKind};
use crate::detect::ContainerKind;
use crate::error::{StrategyError, StrategyResult};

/// AES-128/192/256 (WinZip AE-1/AE-2) entries, decoded from an in-memory
/// copy of the archive.
#[derive(Clone, Copy, Debug, Default)]
pub struct StrongCipherDecoder;

impl Strategy for StrongCipherDecoder {
    fn kind(&self) -> StrategyKind { StrategyKind::StrongCipher }

    fn handles(&self, container: ContainerKind) -> bool { container.is_zip_candidate() }

    fn attempt(
        &self,
        archive: &Path,
        password: Option<&str>,
        staging: &Path,
        ctx: &AttemptContext<'_>,
    ) -> StrategyResult<Vec<ExtractedFile>> {
        let unreadable = |e: std::io::Error| StrategyError::other(format!("cannot read '{}': {e}", archive.display()));

        let len = fs::metadata(archive).map_err(unreadable)?.len();
        if len > ctx.limits.max_archive_bytes {
            return Err(StrategyError::limit(format!(
                "archive is {len} bytes, in-memory limit is {}",
                ctx.limits.max_archive_bytes
            )));
        }

        let buffer = fs::read(archive).map_err(unreadable)?;
        decode_zip(Cursor::new(buffer), password, AesPolicy::Decrypt, staging, ctx)
    }
}
