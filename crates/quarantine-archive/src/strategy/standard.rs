use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::zip_common::{AesPolicy, decode_zip};
use super::{AttemptContext, Strategy};
use crate::data::{ExtractedFile, StrategyKind};
use crate::detect::ContainerKind;
use crate::error::{StrategyError, StrategyResult};

/// Unencrypted and ZipCrypto entries, streamed from disk.
///
/// Entries using AES or a compression method the `zip` crate lacks fail
/// with `UnsupportedEncryption` so the next strategy takes over.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardDecoder;

impl Strategy for StandardDecoder {
    fn kind(&self) -> StrategyKind { StrategyKind::Standard }

    fn handles(&self, container: ContainerKind) -> bool { container.is_zip_candidate() }

    fn attempt(
        &self,
        archive: &Path,
        password: Option<&str>,
        staging: &Path,
        ctx: &AttemptContext<'_>,
    ) -> StrategyResult<Vec<ExtractedFile>> {
        let file = File::open(archive)
            .map_err(|e| StrategyError::other(format!("cannot open '{}': {e}", archive.display())))?;
        decode_zip(BufReader::new(file), password, AesPolicy::Escalate, staging, ctx)
    }
}
