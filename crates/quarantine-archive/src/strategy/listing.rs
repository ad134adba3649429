//! Parsing of `7z l -slt` technical listings.

/// Separator between the archive header block and the entry blocks.
const ENTRIES_START: &str = "----------";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(super) struct ListedEntry {
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
}

/// Entries of a technical listing, in listing order.
///
/// Blocks before the separator describe the archive itself and are ignored.
/// A missing or unparsable `Size` counts as zero.
pub(super) fn parse_slt(stdout: &str) -> Vec<ListedEntry> {
    let mut entries = Vec::new();
    let mut current: Option<ListedEntry> = None;

    let lines = stdout
        .lines()
        .map(str::trim_end)
        .skip_while(|line| *line != ENTRIES_START)
        .skip(1);

    for line in lines {
        if let Some(path) = line.strip_prefix("Path = ") {
            entries.extend(current.take());
            current = Some(ListedEntry {
                path: path.to_string(),
                ..ListedEntry::default()
            });
            continue;
        }
        let Some(entry) = current.as_mut() else {
            continue;
        };
        if let Some(size) = line.strip_prefix("Size = ") {
            entry.size = size.trim().parse().unwrap_or(0);
        } else if line == "Folder = +" || line.starts_with("Attributes = D") {
            entry.is_dir = true;
        }
    }

    entries.extend(current);
    entries
}
