use crate::sandbox::SandboxError;
use thiserror::Error;

/// Hard failures surfaced to the caller.
///
/// Recoverable problems never use this type; they are reported through
/// `ParseResult::warnings`.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("No parser can handle {0}")]
    NoParser(String),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("{0} parser requires binary input")]
    BinaryRequired(&'static str),

    #[error("{0} support is not available")]
    Unavailable(&'static str),

    #[error("Invalid {format} input: {reason}")]
    Format {
        format: &'static str,
        reason: String,
    },

    #[error("Input too large: {size} bytes (max: {max})")]
    InputTooLarge { size: u64, max: u64 },

    #[error(transparent)]
    Archive(#[from] SandboxError),
}

impl ParseError {
    pub fn format(format: &'static str, reason: impl Into<String>) -> Self {
        ParseError::Format {
            format,
            reason: reason.into(),
        }
    }
}
