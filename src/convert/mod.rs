//! Resume conversion: DOCX bytes to semantic HTML to Markdown.

pub mod docx;
pub mod markdown;

use thiserror::Error;

pub use docx::docx_to_html;
pub use markdown::html_to_markdown;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("not a DOCX package: {0}")]
    Package(#[from] zip::result::ZipError),

    #[error("DOCX package has no {0}")]
    MissingPart(&'static str),

    #[error("could not read {part}: {source}")]
    Io {
        part: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{part} expands past {limit} bytes")]
    TooLarge { part: &'static str, limit: u64 },

    #[error("malformed XML in {part}: {message}")]
    Xml { part: &'static str, message: String },

    #[error("document contains no text")]
    Empty,
}

/// Converts a DOCX resume to Markdown.
///
/// A document that parses but yields no text is an error, so callers can
/// treat every failure the same way: run without a resume.
pub fn docx_to_markdown(bytes: &[u8]) -> Result<String, ConversionError> {
    let html = docx_to_html(bytes)?;
    let markdown = html_to_markdown(&html);
    if markdown.trim().is_empty() {
        return Err(ConversionError::Empty);
    }
    log::debug!(
        "Converted DOCX ({} bytes) to {} chars of Markdown",
        bytes.len(),
        markdown.len()
    );
    Ok(markdown)
}
