use pulldown_cmark::{Alignment, Event, HeadingLevel, Parser, Tag, TagEnd};
use weave::{Metadata, OutputFormat};

use super::{Artifact, Emitter, figure_files};
use crate::format::Format;
use crate::markdown::options;
use crate::renderer::{FigureElement, Part, Stitched, TableElement};

const PACKAGES: &[&str] = &[
    "\\usepackage[T1]{fontenc}",
    "\\usepackage[utf8]{inputenc}",
    "\\usepackage{graphicx}",
    "\\usepackage{svg}",
    "\\usepackage{booktabs}",
    "\\usepackage{caption}",
    "\\usepackage[normalem]{ulem}",
    "\\usepackage{hyperref}",
];

/// Print-style LaTeX source. Figures stay in separate SVG files.
pub struct LatexEmitter;

impl Emitter for LatexEmitter {
    fn format(&self) -> Format {
        Format::Latex
    }

    fn emit(
        &self,
        document: &Stitched,
        metadata: &Metadata,
        options: &OutputFormat,
        stem: &str,
    ) -> Vec<Artifact> {
        let class = options.option_str("documentclass").unwrap_or("article");
        let mut out = format!("\\documentclass{{{}}}\n", class);
        for package in PACKAGES {
            out.push_str(package);
            out.push('\n');
        }
        out.push('\n');

        if let Some(title) = &metadata.title {
            out.push_str(&format!("\\title{{{}}}\n", inline_latex(title)));
        }
        if !metadata.author.is_empty() {
            let authors: Vec<String> = metadata.author.iter().map(|a| escape(a)).collect();
            out.push_str(&format!("\\author{{{}}}\n", authors.join(" \\and ")));
        }
        if metadata.title.is_some() {
            let date = metadata.date.as_deref().map(escape).unwrap_or_default();
            out.push_str(&format!("\\date{{{}}}\n", date));
        }

        out.push_str("\n\\begin{document}\n\n");
        if metadata.title.is_some() {
            out.push_str("\\maketitle\n\n");
        }
        if options.option_bool("toc") == Some(true) {
            out.push_str("\\tableofcontents\n\n");
        }

        for part in &document.parts {
            match part {
                Part::Markdown(markdown) => out.push_str(&to_latex(markdown)),
                Part::Figure(figure) => out.push_str(&figure_latex(figure)),
                Part::Table(table) => out.push_str(&table_latex(table)),
            }
        }

        if !document.references.is_empty() {
            out.push_str("\\section*{References}\n\n");
            for reference in &document.references {
                out.push_str(&format!(
                    "\\noindent\\hypertarget{{ref-{}}}{{}}{}\\par\\medskip\n",
                    reference.id,
                    inline_latex(&reference.to_markdown())
                ));
            }
            out.push('\n');
        }
        out.push_str("\\end{document}\n");

        let mut artifacts = vec![Artifact::new(Format::Latex, format!("{}.tex", stem), out)];
        artifacts.extend(figure_files(Format::Latex, document));
        artifacts
    }
}

fn figure_latex(figure: &FigureElement) -> String {
    let mut size = Vec::new();
    if let Some(width) = figure.width {
        size.push(format!("width={}in", width));
    }
    if let Some(height) = figure.height {
        size.push(format!("height={}in", height));
    }
    let size = if size.is_empty() {
        "width=0.8\\linewidth".to_string()
    } else {
        size.join(",")
    };
    let path = figure.path.strip_suffix(".svg").unwrap_or(&figure.path);

    let mut out = String::from("\\begin{figure}[htbp]\n\\centering\n");
    out.push_str(&format!("\\includesvg[{}]{{{}}}\n", size, path));
    out.push_str(&caption_latex(
        figure.id.as_deref(),
        figure.number,
        figure.caption.as_deref(),
    ));
    out.push_str("\\end{figure}\n\n");
    out
}

fn table_latex(table: &TableElement) -> String {
    let mut out = String::from("\\begin{table}[htbp]\n\\centering\n");
    out.push_str(&caption_latex(
        table.id.as_deref(),
        table.number,
        table.caption.as_deref(),
    ));
    out.push_str(&to_latex(&table.markdown));
    out.push_str("\\end{table}\n\n");
    out
}

/// Numbered elements use `\caption`; unnumbered ones with a caption use the
/// starred form so they do not take a number.
fn caption_latex(id: Option<&str>, number: Option<usize>, caption: Option<&str>) -> String {
    let text = caption.map(inline_latex).unwrap_or_default();
    match (id, number) {
        (Some(id), Some(_)) => format!("\\caption{{{}}}\\label{{{}}}\n", text, id),
        _ if caption.is_some() => format!("\\caption*{{{}}}\n", text),
        _ => String::new(),
    }
}

/// Escape LaTeX special characters in text.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

/// Markdown rendered without paragraph breaks, for titles and captions.
fn inline_latex(markdown: &str) -> String {
    to_latex(markdown).trim().replace("\n\n", " ")
}

#[derive(Default)]
struct TableState {
    cell: usize,
}

/// Walks Markdown events and writes LaTeX.
#[derive(Default)]
struct Writer {
    out: String,
    verbatim: bool,
    table: Option<TableState>,
    /// Inside image descriptions, which are not rendered.
    images: usize,
}

fn to_latex(markdown: &str) -> String {
    let mut writer = Writer::default();
    for event in Parser::new_ext(markdown, options()) {
        writer.event(event);
    }
    writer.out
}

impl Writer {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(_) if self.images > 0 => {}
            Event::Text(text) => {
                if self.verbatim {
                    self.out.push_str(&text);
                } else {
                    self.out.push_str(&escape(&text));
                }
            }
            Event::Code(code) => self.out.push_str(&format!("\\texttt{{{}}}", escape(&code))),
            Event::SoftBreak => self.out.push('\n'),
            Event::HardBreak => self.out.push_str("\\\\\n"),
            Event::Rule => self.out.push_str("\\noindent\\rule{\\linewidth}{0.4pt}\n\n"),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {}
            Tag::Heading { level, .. } => {
                let command = match level {
                    HeadingLevel::H1 => "section",
                    HeadingLevel::H2 => "subsection",
                    HeadingLevel::H3 => "subsubsection",
                    HeadingLevel::H4 => "paragraph",
                    _ => "subparagraph",
                };
                self.out.push_str(&format!("\\{}{{", command));
            }
            Tag::BlockQuote(_) => self.out.push_str("\\begin{quote}\n"),
            Tag::CodeBlock(_) => {
                self.out.push_str("\\begin{verbatim}\n");
                self.verbatim = true;
            }
            Tag::List(Some(_)) => self.out.push_str("\\begin{enumerate}\n"),
            Tag::List(None) => self.out.push_str("\\begin{itemize}\n"),
            Tag::Item => self.out.push_str("\\item "),
            Tag::Emphasis => self.out.push_str("\\emph{"),
            Tag::Strong => self.out.push_str("\\textbf{"),
            Tag::Strikethrough => self.out.push_str("\\sout{"),
            Tag::Link { dest_url, .. } => {
                if let Some(target) = dest_url.strip_prefix('#') {
                    if target.starts_with("ref-") {
                        self.out.push_str(&format!("\\hyperlink{{{}}}{{", target));
                    } else {
                        self.out.push_str(&format!("\\hyperref[{}]{{", target));
                    }
                } else {
                    self.out.push_str(&format!("\\href{{{}}}{{", dest_url.replace('%', "\\%")));
                }
            }
            Tag::Image { dest_url, .. } => {
                self.out.push_str(&format!("\\includegraphics{{{}}}", dest_url));
                self.images += 1;
            }
            Tag::Table(alignments) => {
                let spec: String = alignments
                    .iter()
                    .map(|a| match a {
                        Alignment::Right => 'r',
                        Alignment::Center => 'c',
                        Alignment::Left | Alignment::None => 'l',
                    })
                    .collect();
                self.out.push_str(&format!("\\begin{{tabular}}{{{}}}\n\\toprule\n", spec));
                self.table = Some(TableState::default());
            }
            Tag::TableHead | Tag::TableRow => {
                if let Some(table) = &mut self.table {
                    table.cell = 0;
                }
            }
            Tag::TableCell => {
                if let Some(table) = &mut self.table {
                    if table.cell > 0 {
                        self.out.push_str(" & ");
                    }
                    table.cell += 1;
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.out.push_str("\n\n"),
            TagEnd::Heading(_) => self.out.push_str("}\n\n"),
            TagEnd::BlockQuote(_) => self.out.push_str("\\end{quote}\n\n"),
            TagEnd::CodeBlock => {
                if !self.out.ends_with('\n') {
                    self.out.push('\n');
                }
                self.out.push_str("\\end{verbatim}\n\n");
                self.verbatim = false;
            }
            TagEnd::List(true) => self.out.push_str("\\end{enumerate}\n\n"),
            TagEnd::List(false) => self.out.push_str("\\end{itemize}\n\n"),
            TagEnd::Item => {
                if !self.out.ends_with('\n') {
                    self.out.push('\n');
                }
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                self.out.push('}')
            }
            TagEnd::Image => self.images = self.images.saturating_sub(1),
            TagEnd::TableHead => self.out.push_str(" \\\\\n\\midrule\n"),
            TagEnd::TableRow => self.out.push_str(" \\\\\n"),
            TagEnd::Table => {
                self.out.push_str("\\bottomrule\n\\end{tabular}\n\n");
                self.table = None;
            }
            _ => {}
        }
    }
}
