//! Mapping of decoder and tool failures onto [`StrategyError`].
//!
//! Structured signals are consulted first: `ZipError` variants, I/O error
//! kinds and documented exit codes. Lower-cased substring matching on
//! messages is the last resort. It depends on wording that neither the
//! `zip` crate nor 7-Zip promise to keep stable, so a rewording upstream
//! silently shifts a failure into a less specific category.

use std::io;

use zip::result::ZipError;

use crate::error::StrategyError;

/// What was being decoded when an I/O error surfaced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadContext {
    pub password_supplied: bool,
    /// Entry uses legacy ZipCrypto, whose header check lets about one wrong
    /// password in 256 through. Such a password then fails on CRC, or inside
    /// the inflater when the entry is compressed.
    pub legacy_cipher: bool,
}

pub fn zip_error(err: ZipError, password_supplied: bool) -> StrategyError {
    match err {
        ZipError::InvalidPassword => password_error(password_supplied),
        ZipError::UnsupportedArchive(msg) if msg == ZipError::PASSWORD_REQUIRED => password_error(password_supplied),
        ZipError::UnsupportedArchive(msg) => {
            if msg.to_ascii_lowercase().contains("password") {
                password_error(password_supplied)
            } else {
                StrategyError::unsupported(msg)
            }
        }
        ZipError::InvalidArchive(msg) => StrategyError::corrupt(msg.to_string()),
        ZipError::FileNotFound => StrategyError::corrupt("central directory references a missing entry"),
        ZipError::Io(e) => io_error(
            &e,
            ReadContext {
                password_supplied,
                legacy_cipher: false,
            },
        ),
        other => StrategyError::other(other.to_string()),
    }
}

pub fn io_error(err: &io::Error, ctx: ReadContext) -> StrategyError {
    let message = err.to_string().to_ascii_lowercase();
    let integrity = message.contains("checksum") || message.contains("crc");
    let malformed = matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput
    );

    // Garbage decrypted with a wrong ZipCrypto key is indistinguishable
    // from a damaged stream.
    if ctx.legacy_cipher && ctx.password_supplied && (integrity || malformed) {
        return StrategyError::PasswordIncorrect;
    }

    if err.kind() == io::ErrorKind::UnexpectedEof {
        return StrategyError::corrupt("archive data ends unexpectedly");
    }
    if integrity {
        return StrategyError::corrupt(format!("integrity check failed: {err}"));
    }
    if message.contains("authentication") || message.contains("hmac") {
        return StrategyError::corrupt(format!("encrypted entry failed authentication: {err}"));
    }
    if message.contains("unsupported") || message.contains("not supported") {
        return StrategyError::unsupported(err.to_string());
    }
    if matches!(err.kind(), io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput) {
        return StrategyError::corrupt(err.to_string());
    }
    StrategyError::other(err.to_string())
}

/// 7-Zip exit codes.
pub mod exit {
    pub const OK: i32 = 0;
    pub const WARNING: i32 = 1;
    pub const FATAL: i32 = 2;
    pub const COMMAND_LINE: i32 = 7;
    pub const OUT_OF_MEMORY: i32 = 8;
    pub const USER_STOP: i32 = 255;
}

/// Classify a finished native tool run. `None` means success.
pub fn tool_outcome(code: Option<i32>, diagnostics: &str, password_supplied: bool) -> Option<StrategyError> {
    let Some(code) = code else {
        return Some(StrategyError::other("extraction tool was terminated by a signal"));
    };
    match code {
        exit::OK | exit::WARNING => None,
        exit::OUT_OF_MEMORY => Some(StrategyError::limit("extraction tool ran out of memory")),
        exit::COMMAND_LINE => Some(StrategyError::other(format!(
            "extraction tool rejected its command line: {}",
            first_line(diagnostics)
        ))),
        exit::USER_STOP => Some(StrategyError::other("extraction tool was stopped")),
        _ => Some(tool_message(diagnostics, password_supplied).unwrap_or_else(|| {
            StrategyError::other(format!(
                "extraction tool exited with code {code}: {}",
                first_line(diagnostics)
            ))
        })),
    }
}

/// Substring classification of tool diagnostics.
pub fn tool_message(diagnostics: &str, password_supplied: bool) -> Option<StrategyError> {
    const CORRUPT: &[&str] = &[
        "can not open the file as archive",
        "cannot open the file as archive",
        "unexpected end",
        "headers error",
        "data error",
        "crc failed",
    ];

    let text = diagnostics.to_ascii_lowercase();
    if text.contains("wrong password") {
        return Some(password_error(password_supplied));
    }
    if let Some(signal) = CORRUPT.iter().find(|signal| text.contains(*signal)) {
        return Some(StrategyError::corrupt(format!("extraction tool reported {signal}")));
    }
    if text.contains("unsupported method") {
        return Some(StrategyError::unsupported("extraction tool reported unsupported method"));
    }
    None
}

fn password_error(password_supplied: bool) -> StrategyError {
    if password_supplied {
        StrategyError::PasswordIncorrect
    } else {
        StrategyError::PasswordRequired
    }
}

fn first_line(text: &str) -> &str {
    text.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("no output")
}
