use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn '{cmd}': {source}")]
    Spawn { cmd: String, source: std::io::Error },

    #[error("'{cmd}' did not finish within {}s and was killed", .after.as_secs())]
    TimedOut { cmd: String, after: Duration },

    #[error("failed waiting for '{cmd}': {source}")]
    Wait { cmd: String, source: std::io::Error },
}
