/// Metadata for a single archive member held in the sandbox arena
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Byte offset into the arena
    pub offset: usize,
    /// Uncompressed length in bytes
    pub length: usize,
    /// Compressed size as recorded in the archive
    pub compressed_size: u64,
    /// Sanitized virtual path (e.g., "course/package/imsmanifest.xml")
    pub virtual_path: String,
}

/// Central-directory view of a member, whether or not its bytes were loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    pub virtual_path: String,
    /// Uncompressed size as declared by the archive
    pub size: u64,
    pub compressed_size: u64,
}

impl ArchiveMember {
    /// Number of directory levels above this member ("a/b/c.txt" -> 2)
    pub fn depth(&self) -> usize {
        self.virtual_path.matches('/').count()
    }

    /// Lowercased extension without the dot
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.virtual_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase()
    }
}
