/// Borrowed view of the raw input handed to a parser
///
/// Pasted content arrives as text; uploads arrive as bytes. Binary formats
/// (DOCX, SCORM, ZIP) only accept `Bytes`.
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    Text(&'a str),
    Bytes(&'a [u8]),
}

impl<'a> Source<'a> {
    /// Raw bytes regardless of variant
    pub fn as_bytes(&self) -> &'a [u8] {
        match self {
            Source::Text(text) => text.as_bytes(),
            Source::Bytes(bytes) => bytes,
        }
    }

    /// Binary payload, `None` for pasted text
    pub fn binary(&self) -> Option<&'a [u8]> {
        match self {
            Source::Text(_) => None,
            Source::Bytes(bytes) => Some(bytes),
        }
    }

    /// Decode as UTF-8 text with any leading BOM removed
    pub fn text(&self) -> Option<&'a str> {
        let text = match self {
            Source::Text(text) => *text,
            Source::Bytes(bytes) => std::str::from_utf8(bytes).ok()?,
        };
        Some(text.strip_prefix('\u{feff}').unwrap_or(text))
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> From<&'a str> for Source<'a> {
    fn from(text: &'a str) -> Self {
        Source::Text(text)
    }
}

impl<'a> From<&'a [u8]> for Source<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Source::Bytes(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for Source<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        Source::Bytes(bytes.as_slice())
    }
}

/// Lowercased extension of an optional filename, without the dot
pub fn extension_of(filename: Option<&str>) -> String {
    filename
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}
