// Public API exports
pub mod config;
pub mod jobs;
pub mod parser;
pub mod sandbox;
pub mod security;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use config::ImportConfig;
pub use sandbox::{ArchiveMember, FileEntry, Sandbox, SandboxBuilder, SandboxError};
pub use security::PathSanitizer;

pub use parser::{
    ContentType, ParseError, ParseResult, Parser, ParserRegistry, Provenance, Source,
};

pub use jobs::{
    default_store, import_batch, BatchOutcome, ImportInput, InMemoryJobStore, JobRecord,
    JobStatus, JobStore, JobUpdate,
};
