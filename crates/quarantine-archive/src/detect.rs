use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const SNIFF_LEN: usize = 8;

/// Container family, sniffed from the leading bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// ZIP and ZIP-based formats (Office documents, JAR, APK, ...).
    Zip,
    SevenZip,
    Rar,
    Empty,
    /// No known signature. May still be a ZIP with a prefix, such as a
    /// self-extracting executable.
    Unknown,
}

impl ContainerKind {
    /// Whether the in-process ZIP decoders should try this container.
    pub fn is_zip_candidate(self) -> bool { matches!(self, Self::Zip | Self::Unknown) }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::SevenZip => "7z",
            Self::Rar => "rar",
            Self::Empty => "empty",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

pub fn detect_container(data: &[u8]) -> ContainerKind {
    match data {
        [] => ContainerKind::Empty,
        // local file header, empty archive, spanned archive marker
        [0x50, 0x4B, 0x03, 0x04, ..] | [0x50, 0x4B, 0x05, 0x06, ..] | [0x50, 0x4B, 0x07, 0x08, ..] => {
            ContainerKind::Zip
        }
        [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, ..] => ContainerKind::SevenZip,
        [0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, ..] => ContainerKind::Rar,
        _ => ContainerKind::Unknown,
    }
}

/// Sniff the container kind of a file on disk.
pub fn sniff_file(path: &Path) -> io::Result<ContainerKind> {
    let file = File::open(path)?;
    let mut header = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut header)?;
    Ok(detect_container(&header))
}
