use std::fmt;
use std::ops::Range;

use crate::metadata::Metadata;
use crate::options::FragmentOptions;

/// A parsed manuscript: one metadata record followed by blocks in source order.
#[derive(Debug, Clone)]
pub struct Document {
    pub metadata: Metadata,
    pub blocks: Vec<Block>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl Document {
    /// Every fragment, block-level and inline, in execution order.
    pub fn fragments(&self) -> Vec<&Fragment> {
        let mut fragments = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Fragment(fragment) => fragments.push(fragment),
                Block::Narrative(text) => fragments.extend(text.inline_fragments()),
            }
        }
        fragments
    }

    /// Look up a fragment by its label.
    pub fn fragment_by_label(&self, label: &str) -> Option<&Fragment> {
        self.fragments()
            .into_iter()
            .find(|f| f.label() == Some(label))
    }
}

/// A top-level unit of the document body.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Narrative(NarrativeText),
    Fragment(Fragment),
}

impl Block {
    pub fn span(&self) -> &Range<usize> {
        match self {
            Block::Narrative(text) => &text.span,
            Block::Fragment(fragment) => &fragment.span,
        }
    }
}

/// Narrative Markdown with inline fragments left at their original position.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeText {
    pub segments: Vec<Segment>,
    pub span: Range<usize>,
}

impl NarrativeText {
    pub fn inline_fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Inline(fragment) => Some(fragment),
            Segment::Text(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Markdown copied verbatim from the source.
    Text(String),
    Inline(Fragment),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// A fenced region: ```` ```{r label, key=value} ````.
    Block,
    /// A code span inside narrative text: `` `{r} expr` `` or `` `r expr` ``.
    Inline,
}

/// An embedded, executable snippet.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Position in execution order, unique within the document.
    pub id: usize,
    /// Engine name from the header (`r` for `{r}`).
    pub engine: String,
    /// The code to evaluate, with `#|` option lines removed.
    pub code: String,
    pub options: FragmentOptions,
    pub kind: FragmentKind,
    /// The raw header as written: `{r label, echo=FALSE}`, `{r}` or `r`.
    pub header: String,
    /// Byte span of the whole fragment (fences or backticks included).
    pub span: Range<usize>,
    /// 1-based line of the fragment's first line.
    pub line: usize,
    /// 1-based line of the first line of `code`.
    pub code_line: usize,
}

impl Fragment {
    pub fn label(&self) -> Option<&str> {
        self.options.label.as_deref()
    }

    /// Human-readable location used in diagnostics, e.g. `fragment 'setup' (line 12)`.
    pub fn describe(&self) -> String {
        let kind = match self.kind {
            FragmentKind::Block => "fragment",
            FragmentKind::Inline => "inline fragment",
        };
        match self.label() {
            Some(label) => format!("{} '{}' (line {})", kind, label, self.line),
            None => format!("{} at line {}", kind, self.line),
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            write!(f, "{}", block)?;
        }
        Ok(())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::Narrative(text) => write!(f, "{}", text),
            Block::Fragment(fragment) => write!(f, "{}", fragment),
        }
    }
}

impl fmt::Display for NarrativeText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => write!(f, "{}", text)?,
                Segment::Inline(fragment) => write!(f, "{}", fragment)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FragmentKind::Inline => write!(f, "`{} {}`", self.header, self.code),
            FragmentKind::Block => {
                writeln!(f, "```{}", self.header)?;
                write!(f, "{}", self.code)?;
                if !self.code.is_empty() && !self.code.ends_with('\n') {
                    writeln!(f)?;
                }
                writeln!(f, "```")
            }
        }
    }
}
