use std::path::{Path, PathBuf};

/// One decoded archive entry, staged on disk and held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    name: String,
    relative_path: String,
    absolute_path: PathBuf,
    size_bytes: u64,
    content: Vec<u8>,
}

impl ExtractedFile {
    pub(crate) fn new(relative_path: String, absolute_path: PathBuf, content: Vec<u8>) -> Self {
        let name = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(relative_path.as_str())
            .to_string();
        Self {
            name,
            relative_path,
            absolute_path,
            size_bytes: content.len() as u64,
            content,
        }
    }

    /// Leaf name of the entry.
    pub fn name(&self) -> &str { &self.name }

    /// Archive-internal path with `/` separators.
    pub fn relative_path(&self) -> &str { &self.relative_path }

    /// Location of the staged copy.
    pub fn absolute_path(&self) -> &Path { &self.absolute_path }

    pub fn size_bytes(&self) -> u64 { self.size_bytes }

    pub fn content(&self) -> &[u8] { &self.content }

    pub fn into_content(self) -> Vec<u8> { self.content }
}

impl std::fmt::Debug for ExtractedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractedFile")
            .field("relative_path", &self.relative_path)
            .field("absolute_path", &self.absolute_path)
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}
