//! Target formats and the identifiers that select them.

use std::fmt;

/// A serialization target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Format {
    /// A standalone web page.
    Html,
    /// Print-style LaTeX source.
    Latex,
    /// GitHub-flavoured Markdown.
    Markdown,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Html => "html",
            Format::Latex => "latex",
            Format::Markdown => "markdown",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Html => "html",
            Format::Latex => "tex",
            Format::Markdown => "md",
        }
    }

    /// Whether figures are embedded in the artifact rather than written as
    /// separate files.
    pub fn embeds_figures(&self) -> bool {
        matches!(self, Format::Html)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Format {
    type Error = String;

    /// Accepts the canonical names and the usual document-type aliases.
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_lowercase().as_str() {
            "html" | "html_document" | "html5" => Ok(Format::Html),
            "latex" | "tex" | "pdf" | "pdf_document" => Ok(Format::Latex),
            "markdown" | "md" | "md_document" | "gfm" | "github_document" => {
                Ok(Format::Markdown)
            }
            _ => Err(s.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve() {
        assert_eq!(Format::try_from("html_document"), Ok(Format::Html));
        assert_eq!(Format::try_from("pdf_document"), Ok(Format::Latex));
        assert_eq!(Format::try_from("PDF"), Ok(Format::Latex));
        assert_eq!(Format::try_from("gfm"), Ok(Format::Markdown));
        assert_eq!(Format::try_from("docx"), Err("docx".to_string()));
    }

    #[test]
    fn extensions() {
        assert_eq!(Format::Latex.extension(), "tex");
        assert_eq!(Format::Markdown.to_string(), "markdown");
        assert!(Format::Html.embeds_figures());
    }
}
