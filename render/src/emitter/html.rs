use pulldown_cmark::{Parser, html};
use weave::{Metadata, OutputFormat};

use super::{Artifact, Emitter};
use crate::crossref::{RefKind, caption_prefix};
use crate::format::Format;
use crate::markdown::{escape_html, options};
use crate::renderer::{FigureElement, Part, Stitched, TableElement};

const STYLE: &str = "body { max-width: 46em; margin: 2em auto; padding: 0 1em; \
font-family: Georgia, serif; line-height: 1.5; }
pre { background: #f6f8fa; padding: 0.6em; overflow-x: auto; }
table { border-collapse: collapse; margin: 1em auto; }
th, td { padding: 0.2em 0.8em; border-bottom: 1px solid #ccc; }
figure { margin: 1.5em 0; text-align: center; }
.figure-image { margin: 0 auto; }
.figure-image svg { width: 100%; height: auto; }
figcaption, caption { font-style: italic; }
.csl-entry { padding-left: 2em; text-indent: -2em; margin-bottom: 0.5em; }";

/// A standalone web page with figures embedded as inline SVG.
pub struct HtmlEmitter;

impl Emitter for HtmlEmitter {
    fn format(&self) -> Format {
        Format::Html
    }

    fn emit(
        &self,
        document: &Stitched,
        metadata: &Metadata,
        _options: &OutputFormat,
        stem: &str,
    ) -> Vec<Artifact> {
        let title = metadata.title.as_deref().unwrap_or(stem);
        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        out.push_str("<meta charset=\"utf-8\">\n");
        out.push_str("<meta name=\"generator\" content=\"weave\">\n");
        out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
        for author in &metadata.author {
            out.push_str(&format!("<meta name=\"author\" content=\"{}\">\n", escape_html(author)));
        }
        out.push_str(&format!("<title>{}</title>\n", escape_html(title)));
        out.push_str(&format!("<style>\n{}\n</style>\n", STYLE));
        out.push_str("</head>\n<body>\n");
        out.push_str(&title_block(metadata));

        for part in &document.parts {
            match part {
                Part::Markdown(markdown) => {
                    html::push_html(&mut out, Parser::new_ext(markdown, options()));
                }
                Part::Figure(figure) => out.push_str(&figure_html(figure)),
                Part::Table(table) => out.push_str(&table_html(table)),
            }
        }

        if !document.references.is_empty() {
            out.push_str("<section id=\"references\" class=\"references\">\n");
            out.push_str("<h2>References</h2>\n");
            for reference in &document.references {
                out.push_str(&format!(
                    "<div id=\"ref-{}\" class=\"csl-entry\">{}</div>\n",
                    escape_html(&reference.id),
                    inline_html(&reference.to_markdown())
                ));
            }
            out.push_str("</section>\n");
        }
        out.push_str("</body>\n</html>\n");

        vec![Artifact::new(Format::Html, format!("{}.html", stem), out)]
    }
}

fn title_block(metadata: &Metadata) -> String {
    if metadata.title.is_none() && metadata.author.is_empty() && metadata.date.is_none() {
        return String::new();
    }
    let mut out = String::from("<header id=\"title-block-header\">\n");
    if let Some(title) = &metadata.title {
        out.push_str(&format!("<h1 class=\"title\">{}</h1>\n", inline_html(title)));
    }
    for author in &metadata.author {
        out.push_str(&format!("<p class=\"author\">{}</p>\n", escape_html(author)));
    }
    if let Some(date) = &metadata.date {
        out.push_str(&format!("<p class=\"date\">{}</p>\n", escape_html(date)));
    }
    out.push_str("</header>\n");
    out
}

/// Markdown rendered without its paragraph wrapper.
fn inline_html(markdown: &str) -> String {
    let mut out = String::new();
    html::push_html(&mut out, Parser::new_ext(markdown, options()));
    let trimmed = out.trim();
    trimmed
        .strip_prefix("<p>")
        .and_then(|s| s.strip_suffix("</p>"))
        .unwrap_or(trimmed)
        .to_string()
}

fn caption_html(kind: RefKind, number: Option<usize>, caption: Option<&str>) -> Option<String> {
    if number.is_none() && caption.is_none() {
        return None;
    }
    let prefix = caption_prefix(kind, number);
    Some(match caption {
        Some(caption) => format!("{}{}", prefix, inline_html(caption)),
        None => prefix.trim_end_matches(": ").to_string(),
    })
}

fn figure_html(figure: &FigureElement) -> String {
    let mut out = match &figure.id {
        Some(id) => format!("<figure id=\"{}\">\n", escape_html(id)),
        None => "<figure>\n".to_string(),
    };
    let mut style = Vec::new();
    if let Some(width) = figure.width {
        style.push(format!("width: {}in", width));
    }
    if let Some(height) = figure.height {
        style.push(format!("height: {}in", height));
    }
    let style = if style.is_empty() {
        String::new()
    } else {
        format!(" style=\"{}\"", style.join("; "))
    };
    out.push_str(&format!(
        "<div class=\"figure-image\" role=\"img\" aria-label=\"{}\"{}>\n{}</div>\n",
        escape_html(&figure.alt),
        style,
        figure.svg
    ));
    if let Some(caption) = caption_html(RefKind::Figure, figure.number, figure.caption.as_deref())
    {
        out.push_str(&format!("<figcaption>{}</figcaption>\n", caption));
    }
    out.push_str("</figure>\n");
    out
}

fn table_html(table: &TableElement) -> String {
    let mut body = String::new();
    html::push_html(&mut body, Parser::new_ext(&table.markdown, options()));
    if let Some(caption) = caption_html(RefKind::Table, table.number, table.caption.as_deref()) {
        body = body.replacen("<table>", &format!("<table>\n<caption>{}</caption>", caption), 1);
    }
    match &table.id {
        Some(id) => format!("<div id=\"{}\" class=\"table\">\n{}</div>\n", escape_html(id), body),
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit(parts: Vec<Part>, metadata: &Metadata) -> String {
        let document = Stitched {
            parts,
            references: Vec::new(),
        };
        let artifacts = HtmlEmitter.emit(&document, metadata, &OutputFormat::named("html"), "doc");
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].path.to_str(), Some("doc.html"));
        artifacts[0].content.clone()
    }

    #[test]
    fn title_block_and_body() {
        let metadata = Metadata {
            title: Some("Errors & *Omissions*".into()),
            author: vec!["M. Nuijten".into()],
            ..Metadata::default()
        };
        let html = emit(vec![Part::Markdown("The answer is 4.\n".into())], &metadata);
        assert!(html.contains("<title>Errors &amp; *Omissions*</title>"));
        assert!(html.contains("<h1 class=\"title\">Errors &amp; <em>Omissions</em></h1>"));
        assert!(html.contains("<p class=\"author\">M. Nuijten</p>"));
        assert!(html.contains("<p>The answer is 4.</p>"));
    }

    #[test]
    fn figures_are_inline_svg_with_numbered_captions() {
        let figure = FigureElement {
            id: Some("fig-scatter".into()),
            number: Some(1),
            caption: Some("Points".into()),
            alt: "Points".into(),
            path: "doc_files/figure/scatter-1.svg".into(),
            svg: "<svg></svg>\n".into(),
            width: Some(5.0),
            height: None,
        };
        let html = emit(vec![Part::Figure(figure)], &Metadata::default());
        assert!(html.contains("<figure id=\"fig-scatter\">"));
        assert!(html.contains("style=\"width: 5in\""));
        assert!(html.contains("<svg></svg>"));
        assert!(html.contains("<figcaption>Figure 1: Points</figcaption>"));
    }

    #[test]
    fn tables_get_captions() {
        let table = TableElement {
            id: Some("tbl-scores".into()),
            number: Some(2),
            caption: None,
            markdown: "| a |\n|--:|\n| 1 |".into(),
        };
        let html = emit(vec![Part::Table(table)], &Metadata::default());
        assert!(html.contains("<div id=\"tbl-scores\" class=\"table\">"));
        assert!(html.contains("<caption>Table 2</caption>"));
    }
}
