use std::fmt;

use crate::data::AttemptRecord;

/// Install hint attached to [`StrategyError::ToolUnavailable`].
pub const INSTALL_ADVICE: &str = "install 7-Zip (https://www.7-zip.org) or p7zip from your package manager, \
     or point QUARANTINE_7Z_PATH at a 7z executable";

/// Closed taxonomy of extraction failures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StrategyError {
    #[error("archive is password protected, please supply a password")]
    PasswordRequired,

    #[error("password incorrect, please re-enter it")]
    PasswordIncorrect,

    #[error("archive appears to be corrupted: {0}")]
    CorruptArchive(String),

    #[error("encryption format not supported: {0}")]
    UnsupportedEncryption(String),

    #[error("encryption format not supported and no extraction tool is available: {0}")]
    ToolUnavailable(String),

    #[error("archive exceeds extraction limits: {0}")]
    ResourceLimitExceeded(String),

    #[error("extraction failed: {0}")]
    Other(String),
}

/// Fieldless discriminant of [`StrategyError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    PasswordRequired,
    PasswordIncorrect,
    CorruptArchive,
    UnsupportedEncryption,
    ToolUnavailable,
    ResourceLimitExceeded,
    Other,
}

impl FailureKind {
    /// Specificity used to pick the error surfaced after every strategy failed.
    /// Higher wins.
    pub fn rank(self) -> u8 {
        match self {
            Self::ResourceLimitExceeded => 7,
            Self::PasswordIncorrect => 6,
            Self::PasswordRequired => 5,
            Self::ToolUnavailable => 4,
            Self::UnsupportedEncryption => 3,
            Self::CorruptArchive => 2,
            Self::Other => 1,
        }
    }

    /// Whether the next, more capable strategy should be tried.
    pub fn escalates(self) -> bool { matches!(self, Self::UnsupportedEncryption) }

    /// Whether repeating the same request could succeed.
    ///
    /// Password failures are retryable with a different password.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::PasswordRequired | Self::PasswordIncorrect)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PasswordRequired => "password-required",
            Self::PasswordIncorrect => "password-incorrect",
            Self::CorruptArchive => "corrupt-archive",
            Self::UnsupportedEncryption => "unsupported-encryption",
            Self::ToolUnavailable => "tool-unavailable",
            Self::ResourceLimitExceeded => "resource-limit-exceeded",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl StrategyError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::PasswordRequired => FailureKind::PasswordRequired,
            Self::PasswordIncorrect => FailureKind::PasswordIncorrect,
            Self::CorruptArchive(_) => FailureKind::CorruptArchive,
            Self::UnsupportedEncryption(_) => FailureKind::UnsupportedEncryption,
            Self::ToolUnavailable(_) => FailureKind::ToolUnavailable,
            Self::ResourceLimitExceeded(_) => FailureKind::ResourceLimitExceeded,
            Self::Other(_) => FailureKind::Other,
        }
    }

    pub fn corrupt(detail: impl Into<String>) -> Self { Self::CorruptArchive(detail.into()) }

    pub fn unsupported(detail: impl Into<String>) -> Self { Self::UnsupportedEncryption(detail.into()) }

    pub fn limit(detail: impl Into<String>) -> Self { Self::ResourceLimitExceeded(detail.into()) }

    pub fn other(detail: impl Into<String>) -> Self { Self::Other(detail.into()) }
}

impl From<quarantine_fs::Error> for StrategyError {
    fn from(e: quarantine_fs::Error) -> Self { Self::Other(format!("staging failed: {e}")) }
}

/// Terminal failure of an extraction request.
///
/// Carries the most specific failure plus every attempt that led to it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{error}")]
pub struct ExtractError {
    error: StrategyError,
    attempts: Vec<AttemptRecord>,
}

impl ExtractError {
    pub(crate) fn new(error: StrategyError, attempts: Vec<AttemptRecord>) -> Self {
        Self { error, attempts }
    }

    pub fn error(&self) -> &StrategyError { &self.error }

    pub fn kind(&self) -> FailureKind { self.error.kind() }

    pub fn attempts(&self) -> &[AttemptRecord] { &self.attempts }
}

impl From<StrategyError> for ExtractError {
    fn from(error: StrategyError) -> Self { Self::new(error, Vec::new()) }
}

pub type StrategyResult<T> = std::result::Result<T, StrategyError>;

pub type Result<T> = std::result::Result<T, ExtractError>;
