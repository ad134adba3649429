use std::io::{Read, Seek};
use std::path::Path;

use zip::ZipArchive;

use super::AttemptContext;
use crate::classify::{self, ReadContext};
use crate::data::ExtractedFile;
use crate::error::{StrategyError, StrategyResult};
use crate::limits::read_capped;
use crate::materialize::Materializer;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// How entries carrying the AES extra field are treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum AesPolicy {
    /// Refuse with `UnsupportedEncryption` so a stronger strategy takes over.
    Escalate,
    Decrypt,
}

/// Decode every entry of a ZIP archive through a [`Materializer`].
pub(super) fn decode_zip<R: Read + Seek>(
    reader: R,
    password: Option<&str>,
    aes: AesPolicy,
    staging: &Path,
    ctx: &AttemptContext<'_>,
) -> StrategyResult<Vec<ExtractedFile>> {
    let password_supplied = password.is_some();
    let mut archive = ZipArchive::new(reader).map_err(|e| classify::zip_error(e, password_supplied))?;
    let mut out = Materializer::new(staging, ctx.budget(), ctx.observer);

    for index in 0..archive.len() {
        let is_aes = archive
            .get_aes_verification_key_and_salt(index)
            .map_err(|e| classify::zip_error(e, password_supplied))?
            .is_some();
        if is_aes && aes == AesPolicy::Escalate {
            let name = archive.name_for_index(index).unwrap_or("?").to_string();
            return Err(StrategyError::unsupported(format!("entry '{name}' uses AES encryption")));
        }

        let opened = match password {
            Some(password) => archive.by_index_decrypt(index, password.as_bytes()),
            None => archive.by_index(index),
        };
        let mut entry = opened.map_err(|e| classify::zip_error(e, password_supplied))?;

        let name = entry.name().to_string();
        if entry.is_dir() {
            continue;
        }
        if entry.unix_mode().is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            ctx.observer.entry_skipped(&name, "symbolic link");
            continue;
        }

        let declared = entry.size();
        let read_ctx = ReadContext {
            password_supplied,
            legacy_cipher: entry.encrypted() && !is_aes,
        };
        let target = out.admit(&name, declared)?;
        let content = read_capped(&mut entry, out.allowance()).map_err(|e| classify::io_error(&e, read_ctx))?;
        out.accept(target, declared, content)?;
    }

    out.finish()
}
