mod archive;
mod csv_quiz;
mod docx;
mod error;
mod json_blueprint;
mod markdown;
mod registry;
mod result;
mod scorm;
mod source;
mod text;
mod xml;


pub use archive::ZipParser;
pub use csv_quiz::CsvParser;
pub use docx::DocxParser;
pub use error::ParseError;
pub use json_blueprint::JsonParser;
pub use markdown::MarkdownParser;
pub use registry::ParserRegistry;
pub use result::{ContentType, ParseResult, Provenance};
pub use scorm::ScormParser;
pub use source::{extension_of, Source};
pub use text::TextParser;

/// Core trait that every import format implements
pub trait Parser: Send + Sync {
    /// Stable format identifier used for hints and provenance (e.g. "csv")
    fn format(&self) -> &'static str;

    /// Cheap, side-effect-free detection. Never fails.
    ///
    /// # Arguments
    /// * `source` - Raw input (pasted text or uploaded bytes)
    /// * `filename` - Original filename, when the caller has one
    fn can_parse(&self, source: Source<'_>, filename: Option<&str>) -> bool;

    /// Parse the input into a normalized result.
    ///
    /// Recoverable problems become warnings on the result. An error is
    /// returned only when nothing can be extracted; callers that skip
    /// `can_parse` should expect one.
    fn parse(&self, source: Source<'_>, filename: Option<&str>)
        -> Result<ParseResult, ParseError>;
}
