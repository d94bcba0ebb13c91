use std::collections::HashMap;
use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser as CmarkParser, Tag, TagEnd};

use crate::document::{Block, Fragment, FragmentKind, NarrativeText, Segment};
use crate::options::FragmentOptions;
use crate::options::header::{self, Header};
use crate::parser::error::{ParseError, ParseErrorKind};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Split the document body (everything from `body_start`) into narrative and
/// fragment blocks. Spans in the result are absolute offsets into `source`.
pub fn parse_blocks(
    source: &str,
    body_start: usize,
    file_id: usize,
) -> Result<Vec<Block>, Vec<ParseError>> {
    let body = &source[body_start..];
    let options =
        Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES | Options::ENABLE_FOOTNOTES;
    let events: Vec<(Event<'_>, Range<usize>)> =
        CmarkParser::new_ext(body, options).into_offset_iter().collect();

    let mut state = ParseState::new(source, body_start, file_id);
    state.process_events(&events);
    state.finalize()
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

struct ParseState<'a> {
    source: &'a str,
    file_id: usize,
    body_start: usize,
    /// First byte not yet assigned to a segment or block.
    cursor: usize,
    /// Start of the narrative block currently being collected.
    narrative_start: usize,
    segments: Vec<Segment>,
    blocks: Vec<Block>,
    next_id: usize,
    /// Label → span of the fragment that first used it.
    labels: HashMap<String, Range<usize>>,
    errors: Vec<ParseError>,
}

impl<'a> ParseState<'a> {
    fn new(source: &'a str, body_start: usize, file_id: usize) -> Self {
        ParseState {
            source,
            file_id,
            body_start,
            cursor: body_start,
            narrative_start: body_start,
            segments: Vec::new(),
            blocks: Vec::new(),
            next_id: 0,
            labels: HashMap::new(),
            errors: Vec::new(),
        }
    }

    fn process_events(&mut self, events: &[(Event<'_>, Range<usize>)]) {
        let mut i = 0;

        while i < events.len() {
            let (ref ev, ref range) = events[i];
            let span = self.body_start + range.start..self.body_start + range.end;

            match ev {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                    i += 1;
                    let code = collect_text_until(events, &mut i, |e| {
                        matches!(e, TagEnd::CodeBlock)
                    });
                    // Plain fences (```r) are narrative; only {engine} headers execute.
                    if let Some(header) = header::parse_header(info) {
                        self.push_block_fragment(header, info, code, span);
                    }
                }

                Event::Code(text) => {
                    if let Some((engine, header, code)) = split_inline(text) {
                        self.push_inline_fragment(engine, header, code, span);
                    }
                    i += 1;
                }

                _ => {
                    i += 1;
                }
            }
        }
    }

    fn push_block_fragment(
        &mut self,
        header: Header,
        info: &str,
        code: String,
        span: Range<usize>,
    ) {
        let line = line_of(self.source, span.start);

        if !is_terminated(&self.source[span.clone()]) {
            let first_line_end = self.source[span.start..]
                .find('\n')
                .map(|nl| span.start + nl)
                .unwrap_or(span.end);
            self.errors.push(
                ParseError::new(
                    ParseErrorKind::UnterminatedFragment { line },
                    span.start..first_line_end,
                    self.file_id,
                )
                .with_note("close the fragment with a fence at least as long as the opening one"),
            );
        }

        let mut options = FragmentOptions::default();
        let (option_yaml, code) = header::split_option_lines(&code);
        let code_line = line + 1 + option_yaml.lines().count();
        let applied = header::apply_header(&header, &mut options)
            .and_then(|_| header::apply_option_lines(&option_yaml, &mut options));
        if let Err(err) = applied {
            self.errors.push(ParseError::new(
                ParseErrorKind::InvalidOption {
                    key: err.key,
                    reason: err.reason,
                },
                span.clone(),
                self.file_id,
            ));
        }

        if let Some(label) = &options.label {
            if let Some(first) = self.labels.get(label) {
                let first_line = line_of(self.source, first.start);
                self.errors.push(
                    ParseError::new(
                        ParseErrorKind::DuplicateLabel(label.clone()),
                        span.clone(),
                        self.file_id,
                    )
                    .with_note(format!("first used by the fragment at line {}", first_line)),
                );
            } else {
                self.labels.insert(label.clone(), span.clone());
            }
        }

        self.flush_narrative(span.start);

        let id = self.next_fragment_id();
        self.blocks.push(Block::Fragment(Fragment {
            id,
            engine: header.engine,
            code,
            options,
            kind: FragmentKind::Block,
            header: info.trim().to_string(),
            span: span.clone(),
            line,
            code_line,
        }));

        self.cursor = span.end;
        self.narrative_start = span.end;
    }

    fn push_inline_fragment(
        &mut self,
        engine: String,
        header: String,
        code: String,
        span: Range<usize>,
    ) {
        if self.cursor < span.start {
            self.segments
                .push(Segment::Text(self.source[self.cursor..span.start].to_string()));
        }

        let options = FragmentOptions {
            display: false,
            ..FragmentOptions::default()
        };
        let id = self.next_fragment_id();
        let line = line_of(self.source, span.start);
        self.segments.push(Segment::Inline(Fragment {
            id,
            engine,
            code,
            options,
            kind: FragmentKind::Inline,
            header,
            span: span.clone(),
            line,
            code_line: line,
        }));

        self.cursor = span.end;
    }

    fn next_fragment_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Close the narrative block being collected, ending at `end`.
    fn flush_narrative(&mut self, end: usize) {
        if self.cursor < end {
            self.segments
                .push(Segment::Text(self.source[self.cursor..end].to_string()));
            self.cursor = end;
        }
        if !self.segments.is_empty() {
            self.blocks.push(Block::Narrative(NarrativeText {
                segments: std::mem::take(&mut self.segments),
                span: self.narrative_start..end,
            }));
        }
    }

    fn finalize(mut self) -> Result<Vec<Block>, Vec<ParseError>> {
        self.flush_narrative(self.source.len());

        if self.errors.is_empty() {
            Ok(self.blocks)
        } else {
            Err(self.errors)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Collect all text content until a matching End tag.
fn collect_text_until(
    events: &[(Event<'_>, Range<usize>)],
    i: &mut usize,
    is_end: impl Fn(&TagEnd) -> bool,
) -> String {
    let mut text = String::new();
    while *i < events.len() {
        let (ref ev, _) = events[*i];
        match ev {
            Event::End(tag_end) if is_end(tag_end) => {
                *i += 1;
                break;
            }
            Event::Text(s) => {
                text.push_str(s);
                *i += 1;
            }
            _ => {
                *i += 1;
            }
        }
    }
    text
}

/// Recognize `{engine} code` and the classic `r code` inline forms.
/// Returns `(engine, header, code)`.
fn split_inline(text: &str) -> Option<(String, String, String)> {
    if let Some(rest) = text.strip_prefix('{') {
        let close = rest.find('}')?;
        let engine = rest[..close].trim();
        if engine.is_empty() || !engine.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return None;
        }
        let code = rest[close + 1..].trim();
        return Some((engine.to_string(), format!("{{{}}}", engine), code.to_string()));
    }

    let code = text.strip_prefix("r ")?;
    Some(("r".to_string(), "r".to_string(), code.trim().to_string()))
}

/// A fenced block is terminated when its last non-blank line is a closing
/// fence of the same character, at least as long as the opening one.
/// pulldown-cmark runs unterminated fences to the end of their container.
fn is_terminated(raw: &str) -> bool {
    let mut lines = raw.lines();
    let Some(first) = lines.next() else {
        return false;
    };
    let opening = strip_container_prefix(first);
    let fence_char = match opening.chars().next() {
        Some(c @ ('`' | '~')) => c,
        _ => return false,
    };
    let fence_len = opening.chars().take_while(|c| *c == fence_char).count();

    let Some(last) = lines.filter(|l| !l.trim().is_empty()).last() else {
        return false;
    };
    let closing = strip_container_prefix(last).trim_end();
    closing.len() >= fence_len && closing.chars().all(|c| c == fence_char)
}

/// Strip indentation and blockquote markers preceding a fence.
fn strip_container_prefix(line: &str) -> &str {
    line.trim_start_matches([' ', '\t', '>'])
}

/// Convert a byte offset in `source` to a 1-based line number.
pub(crate) fn line_of(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_forms() {
        assert_eq!(
            split_inline("{r} 2+2"),
            Some(("r".into(), "{r}".into(), "2+2".into()))
        );
        assert_eq!(
            split_inline("r mean(x)"),
            Some(("r".into(), "r".into(), "mean(x)".into()))
        );
        assert_eq!(split_inline("library(x)"), None);
        assert_eq!(split_inline("{not an engine} x"), None);
    }

    #[test]
    fn termination() {
        assert!(is_terminated("```{r}\nx <- 1\n```\n"));
        assert!(is_terminated("````{r}\nx\n`````"));
        assert!(!is_terminated("```{r}\nx <- 1\n"));
        assert!(!is_terminated("````{r}\nx <- 1\n```\n"));
        assert!(!is_terminated("```{r}\n"));
        assert!(is_terminated("~~~{r}\nx\n~~~\n"));
    }

    #[test]
    fn line_numbers() {
        let source = "a\nb\nc";
        assert_eq!(line_of(source, 0), 1);
        assert_eq!(line_of(source, 2), 2);
        assert_eq!(line_of(source, 4), 3);
    }
}
