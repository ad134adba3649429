use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create directory '{path}': {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to allocate staging directory under '{root}': {source}")]
    Allocate { root: PathBuf, source: io::Error },

    #[error("failed to set permissions on '{path}': {source}")]
    Permissions { path: PathBuf, source: io::Error },

    #[error("could not find a free name under '{parent}' after {attempts} attempts")]
    NameExhausted { parent: PathBuf, attempts: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;
