use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Failed to parse ZIP archive: {0}")]
    ZipParseFailed(String),

    #[error("Invalid path in archive: {0}")]
    InvalidPath(String),

    #[error("File too large: {size} bytes (max: {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Too many entries in archive: {count} (max: {max})")]
    TooManyEntries { count: usize, max: usize },
}
