pub mod error;
mod frontmatter;
mod structural;

pub use error::{ParseError, ParseErrorKind};

use crate::document::Document;
use crate::metadata::Metadata;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the source into a Document. Metadata errors are reported alone,
    /// since the body offsets depend on where the front matter ends.
    pub fn parse(&self) -> Result<Document, Vec<ParseError>> {
        let (metadata, body_start) = match frontmatter::split(&self.source, self.file_id)
            .map_err(|e| vec![e])?
        {
            Some(front) => {
                let metadata = Metadata::from_yaml(front.yaml).map_err(|e| {
                    let span = match e.location() {
                        Some(loc) => {
                            let at = front.yaml_start + loc.index();
                            at..(at + 1).min(front.body_start)
                        }
                        None => 0..front.body_start,
                    };
                    vec![ParseError::new(
                        ParseErrorKind::MalformedMetadata(e.to_string()),
                        span,
                        self.file_id,
                    )]
                })?;
                (metadata, front.body_start)
            }
            None => (Metadata::default(), 0),
        };

        let blocks = structural::parse_blocks(&self.source, body_start, self.file_id)?;
        tracing::debug!(blocks = blocks.len(), "parsed document");

        Ok(Document {
            metadata,
            blocks,
            source_id: self.file_id,
        })
    }
}
