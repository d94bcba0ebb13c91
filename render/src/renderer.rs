//! Stitching: fragment results substituted back into the narrative.
//!
//! The renderer walks the document once, in block order, and produces a
//! [`Stitched`] document: Markdown interleaved with figure and table
//! elements. Cross-reference ids are assigned here; tokens that refer to
//! them are resolved later, once every element is known.

use interpreter::{Evaluated, EvaluationResult, Figure, Narrative, Output, Renderable, RuntimeValue};
use weave::{Block, Document, Fragment, FragmentKind, ResultHandling, Segment};

use crate::citation::Reference;
use crate::crossref::{CrossRefs, RefKind};
use crate::error::{Warning, WarningKind};
use crate::markdown::fence;

/// A figure produced by a fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct FigureElement {
    /// Cross-reference id, e.g. `fig-scatter`. Unlabeled fragments have none.
    pub id: Option<String>,
    pub number: Option<usize>,
    pub caption: Option<String>,
    /// Alternative text: the caption, else the plot title.
    pub alt: String,
    /// Where the image lives relative to the output, for formats that link
    /// to it.
    pub path: String,
    pub svg: String,
    /// Inches.
    pub width: Option<f64>,
    pub height: Option<f64>,
}

/// A table produced by a fragment rendered as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct TableElement {
    pub id: Option<String>,
    pub number: Option<usize>,
    pub caption: Option<String>,
    /// Pipe table.
    pub markdown: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Markdown(String),
    Figure(FigureElement),
    Table(TableElement),
}

/// The intermediate document every emitter serializes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stitched {
    pub parts: Vec<Part>,
    /// Cited references, sorted for the reference list.
    pub references: Vec<Reference>,
}

impl Stitched {
    pub fn figures(&self) -> impl Iterator<Item = &FigureElement> {
        self.parts.iter().filter_map(|part| match part {
            Part::Figure(figure) => Some(figure),
            _ => None,
        })
    }

    /// The Markdown of the body with figures and tables in Markdown syntax.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Markdown(text) => out.push_str(text),
                Part::Figure(figure) => {
                    out.push_str(&format!("![{}]({})\n\n", figure.alt, figure.path));
                }
                Part::Table(table) => {
                    out.push_str(&table.markdown);
                    out.push_str("\n\n");
                }
            }
        }
        out
    }
}

/// What rendering produced, before references are resolved.
#[derive(Debug)]
pub struct Rendered {
    pub stitched: Stitched,
    pub crossrefs: CrossRefs,
    pub warnings: Vec<Warning>,
}

pub struct Renderer<'a> {
    evaluated: &'a Evaluated,
    stem: String,
    crossrefs: CrossRefs,
    parts: Vec<Part>,
    /// Markdown not yet pushed as a part.
    pending: String,
    unnamed: usize,
    warnings: Vec<Warning>,
}

impl<'a> Renderer<'a> {
    /// `stem` names the figure directory, `{stem}_files/figure/`.
    pub fn new(evaluated: &'a Evaluated, stem: impl Into<String>) -> Self {
        Renderer {
            evaluated,
            stem: stem.into(),
            crossrefs: CrossRefs::default(),
            parts: Vec::new(),
            pending: String::new(),
            unnamed: 0,
            warnings: Vec::new(),
        }
    }

    pub fn render(mut self, document: &Document) -> Rendered {
        let mut after_block = false;
        for block in &document.blocks {
            match block {
                Block::Narrative(text) => {
                    for segment in &text.segments {
                        match segment {
                            Segment::Text(text) if after_block => {
                                // Block output already closes its paragraph.
                                let text = text.trim_start_matches(['\r', '\n']);
                                if !text.is_empty() {
                                    self.separate();
                                    self.pending.push_str(text);
                                }
                            }
                            Segment::Text(text) => self.pending.push_str(text),
                            Segment::Inline(fragment) => {
                                let inline = self.inline(fragment);
                                self.pending.push_str(&inline);
                            }
                        }
                        after_block = false;
                    }
                }
                Block::Fragment(fragment) => {
                    self.block(fragment);
                    after_block = true;
                }
            }
        }
        self.flush();
        Rendered {
            stitched: Stitched {
                parts: self.parts,
                references: Vec::new(),
            },
            crossrefs: self.crossrefs,
            warnings: self.warnings,
        }
    }

    fn inline(&mut self, fragment: &Fragment) -> String {
        let Some(result) = self.evaluated.get(fragment.id) else {
            return format!("`{}`", fragment.code.trim());
        };
        for message in result.warnings() {
            self.inline_diagnostic(fragment, format!("Warning: {}", message));
        }
        for message in result.messages() {
            self.inline_diagnostic(fragment, message.trim_end().to_string());
        }
        if let Some(error) = result.error() {
            self.inline_diagnostic(fragment, format!("Error: {}", error));
            return format!("Error: {}", error);
        }
        match fragment.options.result_handling {
            ResultHandling::Hidden => String::new(),
            ResultHandling::Asis | ResultHandling::Literal => result.value.to_inline(),
        }
    }

    fn inline_diagnostic(&mut self, fragment: &Fragment, message: String) {
        tracing::warn!(fragment = %fragment.describe(), %message, "inline fragment diagnostic");
        self.warnings.push(
            Warning::new(WarningKind::InlineDiagnostic {
                location: fragment.describe(),
                message,
            })
            .with_span(fragment.span.clone()),
        );
    }

    fn block(&mut self, fragment: &Fragment) {
        debug_assert_eq!(fragment.kind, FragmentKind::Block);
        if fragment.label().is_none() {
            self.unnamed += 1;
        }
        self.separate();

        if fragment.options.display {
            self.pending.push_str(&fence("r", &fragment.code));
            self.pending.push_str("\n\n");
        }

        let Some(result) = self.evaluated.get(fragment.id) else {
            return;
        };
        let mut chunk = Chunk {
            fragment,
            console: String::new(),
            figures: 0,
            tables: 0,
        };
        self.outputs(&mut chunk, result);
        self.console(&mut chunk);
    }

    fn outputs(&mut self, chunk: &mut Chunk<'_>, result: &EvaluationResult) {
        let mode = chunk.fragment.options.result_handling;
        for output in &result.outputs {
            match output {
                Output::Value(value) => match mode {
                    ResultHandling::Hidden => {}
                    _ if mode == ResultHandling::Asis || value.is_asis() => {
                        self.console(chunk);
                        self.narrative(chunk, value);
                    }
                    _ => chunk.line(&value.to_literal()),
                },
                Output::Text(text) => match mode {
                    ResultHandling::Hidden => {}
                    ResultHandling::Asis => {
                        self.console(chunk);
                        self.pending.push_str(text);
                    }
                    ResultHandling::Literal => chunk.console.push_str(text),
                },
                Output::Figure(figure) => {
                    if mode != ResultHandling::Hidden {
                        self.console(chunk);
                        self.figure(chunk, figure);
                    }
                }
                Output::Warning(message) => chunk.line(&format!("Warning: {}", message)),
                Output::Message(message) => chunk.line(message.trim_end_matches('\n')),
                Output::Error(message) => chunk.line(&format!("Error: {}", message)),
            }
        }
    }

    fn narrative(&mut self, chunk: &mut Chunk<'_>, value: &RuntimeValue) {
        match value.to_narrative() {
            Narrative::Markdown(markdown) => {
                self.pending.push_str(&markdown);
                self.pending.push_str("\n\n");
            }
            Narrative::Table { markdown, caption } => {
                chunk.tables += 1;
                let (id, number) = self.register(chunk, RefKind::Table, chunk.tables);
                self.push(Part::Table(TableElement {
                    id,
                    number,
                    caption: caption.or_else(|| chunk.fragment.options.caption.clone()),
                    markdown,
                }));
            }
            Narrative::Figure(figure) => self.figure(chunk, &figure),
        }
    }

    fn figure(&mut self, chunk: &mut Chunk<'_>, figure: &Figure) {
        chunk.figures += 1;
        let k = chunk.figures;
        let (id, number) = self.register(chunk, RefKind::Figure, k);
        let options = &chunk.fragment.options;
        let name = match chunk.fragment.label() {
            Some(label) => file_stem(label),
            None => format!("unnamed-chunk-{}", self.unnamed),
        };
        let caption = options.caption.clone();
        let alt = caption
            .clone()
            .or_else(|| figure.title.clone())
            .unwrap_or_default();
        self.push(Part::Figure(FigureElement {
            id,
            number,
            caption,
            alt,
            path: format!("{}_files/figure/{}-{}.svg", self.stem, name, k),
            svg: figure.svg.clone(),
            width: options.size.width,
            height: options.size.height,
        }));
    }

    fn register(
        &mut self,
        chunk: &Chunk<'_>,
        kind: RefKind,
        k: usize,
    ) -> (Option<String>, Option<usize>) {
        match chunk.fragment.label() {
            Some(label) => {
                let (id, number) = self.crossrefs.register(kind, label, k);
                (Some(id), Some(number))
            }
            None => (None, None),
        }
    }

    /// Flush console text as one fenced block with `## ` prefixes.
    fn console(&mut self, chunk: &mut Chunk<'_>) {
        if chunk.console.is_empty() {
            return;
        }
        let text = std::mem::take(&mut chunk.console);
        let body: Vec<String> = text
            .trim_end_matches('\n')
            .lines()
            .map(|line| format!("## {}", line).trim_end().to_string())
            .collect();
        self.pending.push_str(&fence("", &body.join("\n")));
        self.pending.push_str("\n\n");
    }

    fn push(&mut self, part: Part) {
        self.flush();
        self.parts.push(part);
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.parts.push(Part::Markdown(std::mem::take(&mut self.pending)));
        }
    }

    /// Block output starts on a fresh paragraph.
    fn separate(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        while !self.pending.ends_with("\n\n") {
            self.pending.push('\n');
        }
    }
}

/// Per-fragment rendering state.
struct Chunk<'f> {
    fragment: &'f Fragment,
    /// Console text not yet flushed.
    console: String,
    figures: usize,
    tables: usize,
}

impl Chunk<'_> {
    /// Append a whole line of console output.
    fn line(&mut self, text: &str) {
        if !self.console.is_empty() && !self.console.ends_with('\n') {
            self.console.push('\n');
        }
        self.console.push_str(text);
        self.console.push('\n');
    }
}

/// Figure file name for a label: anything but letters, digits, `-` and `_`
/// becomes `_`.
fn file_stem(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use interpreter::{Environment, Library, execute_document};
    use weave::Parser;

    fn render(source: &str) -> Rendered {
        let document = Parser::new(source.to_string(), 0).parse().unwrap();
        let library = Library::standard();
        let mut env = Environment::new();
        let evaluated = execute_document(&document, &mut env, &library).unwrap();
        Renderer::new(&evaluated, "doc").render(&document)
    }

    fn markdown(source: &str) -> String {
        render(source).stitched.to_markdown()
    }

    #[test]
    fn narrative_without_fragments_is_verbatim() {
        let source = "# Intro\n\nSome *text* here.\n";
        assert_eq!(markdown(source), source);
    }

    #[test]
    fn inline_results_are_substituted() {
        assert_eq!(markdown("The answer is `{r} 2+2`.\n"), "The answer is 4.\n");
    }

    #[test]
    fn literal_results_are_fenced_with_prefixes() {
        let out = markdown("```{r}\nx <- c(1, 2)\nx\n```\n");
        assert_eq!(out, "```r\nx <- c(1, 2)\nx\n```\n\n```\n## [1] 1 2\n```\n\n");
    }

    #[test]
    fn hidden_code_and_results() {
        let out = markdown("```{r, echo=FALSE, results='hide'}\nx <- 3\nx\n```\n\nx is `{r} x`.\n");
        assert_eq!(out, "x is 3.\n");
    }

    #[test]
    fn warnings_are_annotated_unless_suppressed() {
        let out = markdown("```{r, echo=FALSE}\nwarning(\"careful\")\n```\n");
        assert!(out.contains("## Warning: careful"));

        let out = markdown("```{r, echo=FALSE, warning=FALSE}\nwarning(\"careful\")\n```\n");
        assert!(!out.contains("careful"));
    }

    #[test]
    fn asis_text_is_raw_markdown() {
        let out = markdown("```{r, echo=FALSE, results='asis'}\ncat(\"**bold**\")\n```\n");
        assert_eq!(out, "**bold**");
    }

    #[test]
    fn labels_become_safe_file_names() {
        let rendered = render("```{r fit.model, echo=FALSE}\nplot(c(1, 2))\n```\n");
        let figures: Vec<&FigureElement> = rendered.stitched.figures().collect();
        assert_eq!(figures[0].path, "doc_files/figure/fit_model-1.svg");
        assert_eq!(figures[0].id.as_deref(), Some("fig-fit.model"));
    }

    #[test]
    fn labeled_figures_are_numbered() {
        let rendered = render(
            "```{r scatter, echo=FALSE, fig.cap='Points'}\nplot(c(1, 2, 3))\n```\n\n```{r}\nhist(c(1, 2, 2, 3))\n```\n",
        );
        let figures: Vec<&FigureElement> = rendered.stitched.figures().collect();
        assert_eq!(figures.len(), 2);
        assert_eq!(figures[0].id.as_deref(), Some("fig-scatter"));
        assert_eq!(figures[0].number, Some(1));
        assert_eq!(figures[0].path, "doc_files/figure/scatter-1.svg");
        assert_eq!(figures[0].caption.as_deref(), Some("Points"));
        assert_eq!(figures[1].id, None);
        assert_eq!(figures[1].path, "doc_files/figure/unnamed-chunk-1-1.svg");
        assert!(rendered.crossrefs.get("fig-scatter").is_some());
    }

    #[test]
    fn kable_becomes_a_table_element() {
        let rendered = render(
            "```{r scores, echo=FALSE}\nlibrary(knitr)\nkable(data.frame(a = c(1, 2)), caption = \"Scores\")\n```\n",
        );
        let tables: Vec<&TableElement> = rendered
            .stitched
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Table(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].id.as_deref(), Some("tbl-scores"));
        assert_eq!(tables[0].caption.as_deref(), Some("Scores"));
    }

    #[test]
    fn inline_warnings_become_compile_warnings() {
        let rendered = render("Root: `{r} sqrt(-1)`.\n");
        assert_eq!(rendered.warnings.len(), 1);
        assert!(matches!(
            &rendered.warnings[0].kind,
            WarningKind::InlineDiagnostic { message, .. } if message.starts_with("Warning:")
        ));
    }
}
