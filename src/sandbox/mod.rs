mod entry;
mod error;

#[cfg(test)]
mod tests;

pub use entry::{ArchiveMember, FileEntry};
pub use error::SandboxError;

use crate::security::PathSanitizer;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use tracing::debug;

/// Immutable sandbox with arena-backed storage for archive members
pub struct Sandbox {
    /// Single contiguous blob containing all file data
    arena: Vec<u8>,
    /// Entries in archive order
    entries: Vec<FileEntry>,
    /// Virtual path -> position in `entries`
    index: HashMap<String, usize>,
    /// Every listed member, loaded or not, in archive order
    members: Vec<ArchiveMember>,
    /// Human-readable notes about members that were left out
    skipped: Vec<String>,
}

/// Mutable builder for constructing a sandbox
pub struct SandboxBuilder {
    arena: Vec<u8>,
    entries: Vec<FileEntry>,
    index: HashMap<String, usize>,
    members: Vec<ArchiveMember>,
    member_index: HashMap<String, usize>,
    skipped: Vec<String>,
    max_file_size: u64,
    max_total_size: u64,
    max_entries: usize,
}

/// Whether the bytes carry the ZIP local-header magic
pub fn looks_like_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK")
}

/// macOS archivers add `__MACOSX/` shadows and `._name` resource forks
pub fn is_resource_fork(name: &str) -> bool {
    let basename = name.rsplit('/').next().unwrap_or(name);
    name.starts_with("__MACOSX/") || name.contains("/__MACOSX/") || basename.starts_with("._")
}

/// Read member names from the central directory without decompressing anything.
///
/// Returns `None` when the bytes are not a readable ZIP archive.
pub fn member_names(bytes: &[u8]) -> Option<Vec<String>> {
    if !looks_like_zip(bytes) {
        return None;
    }
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).ok()?;
    Some(archive.file_names().map(str::to_string).collect())
}

impl SandboxBuilder {
    /// Create a new builder with default limits
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            entries: Vec::new(),
            index: HashMap::new(),
            members: Vec::new(),
            member_index: HashMap::new(),
            skipped: Vec::new(),
            max_file_size: 50 * 1024 * 1024,   // 50 MB per file
            max_total_size: 500 * 1024 * 1024, // 500 MB total
            max_entries: 10_000,
        }
    }

    /// Set maximum individual file size
    pub fn max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Set maximum total arena size
    pub fn max_total_size(mut self, size: u64) -> Self {
        self.max_total_size = size;
        self
    }

    /// Set maximum number of archive members
    pub fn max_entries(mut self, count: usize) -> Self {
        self.max_entries = count;
        self
    }

    /// Add a file to the sandbox arena
    pub fn add_file(
        &mut self,
        raw_path: &str,
        data: &[u8],
        compressed_size: u64,
    ) -> Result<(), SandboxError> {
        let virtual_path = PathSanitizer::sanitize(raw_path)?;

        if data.len() as u64 > self.max_file_size {
            return Err(SandboxError::FileTooLarge {
                size: data.len() as u64,
                max: self.max_file_size,
            });
        }

        let new_total = self.arena.len() as u64 + data.len() as u64;
        if new_total > self.max_total_size {
            return Err(SandboxError::FileTooLarge {
                size: new_total,
                max: self.max_total_size,
            });
        }

        let offset = self.arena.len();
        self.arena.extend_from_slice(data);

        self.record_member(ArchiveMember {
            virtual_path: virtual_path.clone(),
            size: data.len() as u64,
            compressed_size,
        });

        let entry = FileEntry {
            offset,
            length: data.len(),
            compressed_size,
            virtual_path: virtual_path.clone(),
        };

        // A repeated name replaces the earlier member in place
        match self.index.get(&virtual_path) {
            Some(&pos) => self.entries[pos] = entry,
            None => {
                self.index.insert(virtual_path, self.entries.len());
                self.entries.push(entry);
            }
        }

        Ok(())
    }

    fn record_member(&mut self, member: ArchiveMember) {
        match self.member_index.get(&member.virtual_path) {
            Some(&pos) => self.members[pos] = member,
            None => {
                self.member_index
                    .insert(member.virtual_path.clone(), self.members.len());
                self.members.push(member);
            }
        }
    }

    /// Load every regular member of an in-memory ZIP archive
    pub fn ingest_zip(self, bytes: &[u8]) -> Result<Self, SandboxError> {
        self.ingest_zip_with(bytes, |_| true)
    }

    /// List every member of an in-memory ZIP archive from its central
    /// directory, and load only the members `select` accepts.
    ///
    /// Directories are dropped. Resource forks, members whose names fail
    /// sanitization and selected members over the per-file limit are
    /// skipped with a note rather than failing the whole archive. The
    /// member count and the arena total stay hard limits.
    pub fn ingest_zip_with<F>(mut self, bytes: &[u8], mut select: F) -> Result<Self, SandboxError>
    where
        F: FnMut(&ArchiveMember) -> bool,
    {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| SandboxError::ZipParseFailed(e.to_string()))?;

        if archive.len() > self.max_entries {
            return Err(SandboxError::TooManyEntries {
                count: archive.len(),
                max: self.max_entries,
            });
        }

        for i in 0..archive.len() {
            let (raw_path, member) = {
                let file = archive
                    .by_index_raw(i)
                    .map_err(|e| SandboxError::ZipParseFailed(e.to_string()))?;

                if file.is_dir() {
                    continue;
                }

                let raw_path = file.name().to_string();
                if is_resource_fork(&raw_path) {
                    debug!(path = %raw_path, "skipping resource fork");
                    self.skipped
                        .push(format!("Skipped '{}': macOS resource fork", raw_path));
                    continue;
                }

                let virtual_path = match PathSanitizer::sanitize(&raw_path) {
                    Ok(path) => path,
                    Err(e) => {
                        debug!(path = %raw_path, error = %e, "skipping unsafe member");
                        self.skipped.push(format!("Skipped '{}': {}", raw_path, e));
                        continue;
                    }
                };

                let member = ArchiveMember {
                    virtual_path,
                    size: file.size(),
                    compressed_size: file.compressed_size(),
                };
                (raw_path, member)
            };

            let wanted = select(&member);
            let declared = member.size;
            let compressed_size = member.compressed_size;
            self.record_member(member);
            if !wanted {
                continue;
            }

            if declared > self.max_file_size {
                self.note_oversized(&raw_path, declared);
                continue;
            }

            let file = archive
                .by_index(i)
                .map_err(|e| SandboxError::ZipParseFailed(e.to_string()))?;

            // Never trust the declared size; read at most one byte past the limit
            let mut contents = Vec::new();
            file.take(self.max_file_size + 1)
                .read_to_end(&mut contents)
                .map_err(|e| SandboxError::ZipParseFailed(e.to_string()))?;

            if contents.len() as u64 > self.max_file_size {
                self.note_oversized(&raw_path, contents.len() as u64);
                continue;
            }

            self.add_file(&raw_path, &contents, compressed_size)?;
        }

        Ok(self)
    }

    fn note_oversized(&mut self, raw_path: &str, size: u64) {
        let reason = SandboxError::FileTooLarge {
            size,
            max: self.max_file_size,
        };
        debug!(path = %raw_path, %size, "skipping oversized member");
        self.skipped.push(format!("Skipped '{}': {}", raw_path, reason));
    }

    /// Build the immutable sandbox
    pub fn build(self) -> Sandbox {
        Sandbox {
            arena: self.arena,
            entries: self.entries,
            index: self.index,
            members: self.members,
            skipped: self.skipped,
        }
    }
}

impl Default for SandboxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox {
    /// Get a file's contents as a byte slice (zero-copy)
    pub fn get(&self, virtual_path: &str) -> Option<&[u8]> {
        self.get_entry(virtual_path)
            .map(|entry| &self.arena[entry.offset..entry.offset + entry.length])
    }

    /// List loaded files in archive order
    pub fn list(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter()
    }

    /// List every member seen in the central directory, loaded or not
    pub fn members(&self) -> impl Iterator<Item = &ArchiveMember> {
        self.members.iter()
    }

    /// Get metadata for a file without reading contents
    pub fn get_entry(&self, virtual_path: &str) -> Option<&FileEntry> {
        self.index.get(virtual_path).map(|&pos| &self.entries[pos])
    }

    /// Notes about members left out during ingestion
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Get the number of loaded files
    pub fn file_count(&self) -> usize {
        self.entries.len()
    }

    /// Get the number of listed members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Bytes held by live entries; replaced members no longer count
    pub fn total_size(&self) -> usize {
        self.entries.iter().map(|entry| entry.length).sum()
    }

    /// Declared uncompressed size of every listed member
    pub fn uncompressed_size(&self) -> u64 {
        self.members.iter().map(|member| member.size).sum()
    }
}
