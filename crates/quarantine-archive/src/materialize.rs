//! Writing decoded entries into a staging directory.
//!
//! In-process decoders collect every entry through a [`Materializer`] and
//! only touch the disk in [`Materializer::finish`], once the whole archive
//! decoded and its layout was checked. A decode failure therefore leaves
//! nothing behind; an I/O failure while writing may leave the entries
//! written before it, which later attempts never overwrite.
//! Output of the native tool is taken over with [`adopt_tree`].

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::classify::{self, ReadContext};
use crate::data::ExtractedFile;
use crate::error::{StrategyError, StrategyResult};
use crate::limits::{Budget, read_capped};
use crate::observer::Observer;
use crate::sanitize::{SanitizedPath, is_contained, sanitize_entry_path};

const DUPLICATE_TAG: &str = "dup";

struct Pending {
    path: SanitizedPath,
    content: Vec<u8>,
}

pub struct Materializer<'a> {
    staging: &'a Path,
    observer: &'a dyn Observer,
    budget: Budget,
    pending: Vec<Pending>,
}

impl<'a> Materializer<'a> {
    pub fn new(staging: &'a Path, budget: Budget, observer: &'a dyn Observer) -> Self {
        Self {
            staging,
            observer,
            budget,
            pending: Vec::new(),
        }
    }

    /// Validate an entry's name and declared size before it is decoded.
    pub fn admit(&mut self, name: &str, declared: u64) -> StrategyResult<SanitizedPath> {
        let path = sanitize_entry_path(name, self.staging)?;
        self.budget.admit(name, declared)?;
        Ok(path)
    }

    /// Bytes the admitted entry may decode to.
    pub fn allowance(&self) -> u64 { self.budget.entry_allowance() }

    /// Accept decoded content for an admitted entry.
    pub fn accept(&mut self, path: SanitizedPath, declared: u64, content: Vec<u8>) -> StrategyResult<()> {
        if content.is_empty() && declared > 0 {
            self.observer
                .entry_skipped(&path.relative, &format!("decoded to 0 bytes, {declared} expected"));
            return Ok(());
        }
        self.budget.commit(&path.relative, content.len() as u64)?;
        self.pending.push(Pending { path, content });
        Ok(())
    }

    /// Write every accepted entry and mark it read-only.
    pub fn finish(self) -> StrategyResult<Vec<ExtractedFile>> {
        check_layout(&self.pending)?;

        let mut taken: HashSet<PathBuf> = HashSet::new();
        let mut files = Vec::with_capacity(self.pending.len());

        for Pending { path, content } in self.pending {
            let SanitizedPath { relative, resolved } = disambiguate(path, &taken);
            taken.insert(resolved.clone());

            write_entry(&resolved, &content)?;
            self.observer.entry_staged(&relative, content.len() as u64);
            files.push(ExtractedFile::new(relative, resolved, content));
        }

        Ok(files)
    }
}

/// Reject a file entry that another entry uses as a directory, before
/// anything is written.
fn check_layout(pending: &[Pending]) -> StrategyResult<()> {
    let names: HashSet<&str> = pending.iter().map(|p| p.path.relative.as_str()).collect();
    for Pending { path, .. } in pending {
        let relative = path.relative.as_str();
        let parent = relative
            .match_indices('/')
            .map(|(i, _)| &relative[..i])
            .find(|ancestor| names.contains(ancestor));
        if let Some(parent) = parent {
            return Err(StrategyError::corrupt(format!(
                "entry '{relative}' is nested under file entry '{parent}'"
            )));
        }
    }
    Ok(())
}

/// Rebuild the file list from a directory a native tool extracted into,
/// enforcing the same limits and containment as in-process decoding.
pub fn adopt_tree(root: &Path, budget: Budget, observer: &dyn Observer) -> StrategyResult<Vec<ExtractedFile>> {
    let mut budget = budget;
    let mut files = Vec::new();

    let walker = WalkDir::new(root).follow_links(false).sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| StrategyError::other(format!("failed to walk tool output: {e}")))?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }

        let path = entry.path();
        let relative = relative_name(path, root)?;
        if file_type.is_symlink() {
            return Err(StrategyError::corrupt(format!("entry '{relative}' is a symbolic link")));
        }
        if !file_type.is_file() {
            return Err(StrategyError::corrupt(format!("entry '{relative}' is not a regular file")));
        }
        if !is_contained(path, root) {
            return Err(StrategyError::corrupt(format!("entry '{relative}' escapes the staging directory")));
        }

        let declared = entry
            .metadata()
            .map(|meta| meta.len())
            .map_err(|e| StrategyError::other(format!("failed to inspect '{relative}': {e}")))?;
        budget.admit(&relative, declared)?;

        let content = File::open(path)
            .and_then(|file| read_capped(file, budget.entry_allowance()))
            .map_err(|e| classify::io_error(&e, ReadContext::default()))?;
        budget.commit(&relative, content.len() as u64)?;

        quarantine_fs::mark_read_only(path)?;
        observer.entry_staged(&relative, content.len() as u64);
        files.push(ExtractedFile::new(relative, path.to_path_buf(), content));
    }

    Ok(files)
}

fn relative_name(path: &Path, root: &Path) -> StrategyResult<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| StrategyError::corrupt(format!("'{}' lies outside the tool output", path.display())))?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Give a name that is already staged a `.dupN` suffix instead of
/// overwriting it.
fn disambiguate(path: SanitizedPath, taken: &HashSet<PathBuf>) -> SanitizedPath {
    let occupied = |p: &Path| taken.contains(p) || fs::symlink_metadata(p).is_ok();
    if !occupied(&path.resolved) {
        return path;
    }
    let mut n = 1u32;
    loop {
        let suffix = format!(".{DUPLICATE_TAG}{n}");
        let mut resolved = path.resolved.clone().into_os_string();
        resolved.push(&suffix);
        let candidate = SanitizedPath {
            relative: format!("{}{suffix}", path.relative),
            resolved: PathBuf::from(resolved),
        };
        if !occupied(&candidate.resolved) {
            return candidate;
        }
        n += 1;
    }
}

fn write_entry(target: &Path, content: &[u8]) -> StrategyResult<()> {
    let failed = |e: io::Error| match e.kind() {
        io::ErrorKind::AlreadyExists | io::ErrorKind::NotADirectory => {
            StrategyError::corrupt(format!("'{}' conflicts with another entry: {e}", target.display()))
        }
        _ => StrategyError::other(format!("failed to stage '{}': {e}", target.display())),
    };

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(failed)?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .map_err(failed)?;
    file.write_all(content).map_err(failed)?;
    drop(file);
    quarantine_fs::mark_read_only(target)?;
    Ok(())
}
