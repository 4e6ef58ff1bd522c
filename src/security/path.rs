use crate::sandbox::SandboxError;
use std::path::{Component, Path};

pub struct PathSanitizer;

impl PathSanitizer {
    /// Sanitize a member path from an uploaded archive to prevent:
    /// - Directory traversal (../)
    /// - Absolute paths (/etc/passwd)
    /// - Zip slip attacks
    ///
    /// Hidden files (starting with .) are allowed; packages often carry them.
    /// Returns a normalized virtual path or an error.
    pub fn sanitize(raw_path: &str) -> Result<String, SandboxError> {
        Self::sanitize_with_options(raw_path, true)
    }

    /// Sanitize with custom options
    pub fn sanitize_with_options(
        raw_path: &str,
        allow_hidden: bool,
    ) -> Result<String, SandboxError> {
        if raw_path.is_empty() {
            return Err(SandboxError::InvalidPath("Empty path".to_string()));
        }

        let path = Path::new(raw_path);
        let mut components = Vec::new();

        for component in path.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => {
                    return Err(SandboxError::InvalidPath(format!(
                        "Absolute path not allowed: {}",
                        raw_path
                    )));
                }
                Component::ParentDir => {
                    return Err(SandboxError::InvalidPath(format!(
                        "Parent directory traversal not allowed: {}",
                        raw_path
                    )));
                }
                Component::CurDir => continue,
                Component::Normal(part) => {
                    let part_str = part.to_str().ok_or_else(|| {
                        SandboxError::InvalidPath(format!("Invalid UTF-8 in path: {:?}", part))
                    })?;

                    if !allow_hidden && part_str.starts_with('.') {
                        return Err(SandboxError::InvalidPath(format!(
                            "Hidden files not allowed: {}",
                            raw_path
                        )));
                    }

                    components.push(part_str);
                }
            }
        }

        if components.is_empty() {
            return Err(SandboxError::InvalidPath(format!(
                "No valid components: {}",
                raw_path
            )));
        }

        Ok(components.join("/"))
    }

    /// Resolve a relative reference (e.g. a manifest `href`) against a package root.
    ///
    /// `root` is a sanitized directory path, empty for the archive root.
    /// `..` may climb back toward the root but never above it.
    pub fn resolve_within(root: &str, href: &str) -> Result<String, SandboxError> {
        let href = href.trim();
        if href.is_empty() {
            return Err(SandboxError::InvalidPath("Empty path".to_string()));
        }
        if href.starts_with('/') || href.contains("://") {
            return Err(SandboxError::InvalidPath(format!(
                "Absolute reference not allowed: {}",
                href
            )));
        }

        let mut parts: Vec<&str> = root.split('/').filter(|p| !p.is_empty()).collect();
        let floor = parts.len();

        for part in href.split('/') {
            match part {
                "" | "." => continue,
                ".." => {
                    if parts.len() == floor {
                        return Err(SandboxError::InvalidPath(format!(
                            "Reference escapes package root: {}",
                            href
                        )));
                    }
                    parts.pop();
                }
                other => parts.push(other),
            }
        }

        if parts.len() == floor {
            return Err(SandboxError::InvalidPath(format!(
                "No valid components: {}",
                href
            )));
        }

        Ok(parts.join("/"))
    }
}
