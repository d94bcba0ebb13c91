use crate::parser::error::{ParseError, ParseErrorKind};

/// The front matter region at the start of a document.
pub(crate) struct FrontMatter<'a> {
    /// YAML text between the delimiters.
    pub yaml: &'a str,
    /// Byte offset of `yaml` in the source.
    pub yaml_start: usize,
    /// Byte offset where the document body begins.
    pub body_start: usize,
}

/// Split a leading `---` ... `---` (or `...`) block off the source.
/// Returns `Ok(None)` when the document has no front matter.
pub(crate) fn split(source: &str, file_id: usize) -> Result<Option<FrontMatter<'_>>, ParseError> {
    let start = if source.starts_with('\u{feff}') { '\u{feff}'.len_utf8() } else { 0 };
    let mut lines = LineIter::new(source, start);

    let Some((open_start, open_end, first)) = lines.next() else {
        return Ok(None);
    };
    if first.trim_end() != "---" {
        return Ok(None);
    }

    for (line_start, line_end, line) in lines {
        let line = line.trim_end();
        if line == "---" || line == "..." {
            return Ok(Some(FrontMatter {
                yaml: &source[open_end..line_start],
                yaml_start: open_end,
                body_start: line_end,
            }));
        }
    }

    Err(ParseError::new(
        ParseErrorKind::MalformedMetadata("unterminated metadata block".to_string()),
        open_start..open_start + 3,
        file_id,
    )
    .with_note("close the metadata block with a line containing only `---`"))
}

/// Iterates lines as `(start, end_including_newline, text_without_newline)`.
struct LineIter<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> LineIter<'a> {
    fn new(source: &'a str, pos: usize) -> Self {
        LineIter { source, pos }
    }
}

impl<'a> Iterator for LineIter<'a> {
    type Item = (usize, usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.source.len() {
            return None;
        }
        let start = self.pos;
        let rest = &self.source[start..];
        let (text, consumed) = match rest.find('\n') {
            Some(nl) => (&rest[..nl], nl + 1),
            None => (rest, rest.len()),
        };
        self.pos += consumed;
        Some((start, self.pos, text.trim_end_matches('\r')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_front_matter() {
        assert!(split("# Title\n\nText\n", 0).unwrap().is_none());
        assert!(split("", 0).unwrap().is_none());
    }

    #[test]
    fn splits_yaml_and_body() {
        let source = "---\ntitle: T\n---\nBody\n";
        let front = split(source, 0).unwrap().unwrap();
        assert_eq!(front.yaml, "title: T\n");
        assert_eq!(&source[front.body_start..], "Body\n");
    }

    #[test]
    fn dots_close_the_block() {
        let source = "---\ntitle: T\n...\nBody";
        let front = split(source, 0).unwrap().unwrap();
        assert_eq!(&source[front.body_start..], "Body");
    }

    #[test]
    fn byte_order_mark_is_skipped() {
        let source = "\u{feff}---\ntitle: T\n---\n";
        let front = split(source, 0).unwrap().unwrap();
        assert_eq!(front.yaml, "title: T\n");
    }

    #[test]
    fn unterminated_block() {
        let err = split("---\ntitle: T\n\nBody\n", 0).err().unwrap();
        assert!(matches!(err.kind, ParseErrorKind::MalformedMetadata(_)));
        assert_eq!(err.span, 0..3);
    }
}
