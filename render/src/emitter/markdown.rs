use serde::Serialize;
use weave::{Metadata, OutputFormat};

use super::{Artifact, Emitter, figure_files};
use crate::crossref::{RefKind, caption_prefix};
use crate::format::Format;
use crate::markdown::escape_html;
use crate::renderer::{FigureElement, Part, Stitched, TableElement};

/// GitHub-flavoured Markdown with figures as linked SVG files.
pub struct MarkdownEmitter;

#[derive(Serialize)]
struct FrontMatter<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    author: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<&'a str>,
}

impl Emitter for MarkdownEmitter {
    fn format(&self) -> Format {
        Format::Markdown
    }

    fn emit(
        &self,
        document: &Stitched,
        metadata: &Metadata,
        _options: &OutputFormat,
        stem: &str,
    ) -> Vec<Artifact> {
        let mut out = front_matter(metadata);
        for part in &document.parts {
            match part {
                Part::Markdown(markdown) => out.push_str(markdown),
                Part::Figure(figure) => out.push_str(&figure_markdown(figure)),
                Part::Table(table) => out.push_str(&table_markdown(table)),
            }
        }

        if !document.references.is_empty() {
            if !out.ends_with("\n\n") {
                out.push_str(if out.ends_with('\n') { "\n" } else { "\n\n" });
            }
            out.push_str("## References\n\n");
            for reference in &document.references {
                out.push_str(&format!(
                    "<a id=\"ref-{}\"></a>{}\n\n",
                    escape_html(&reference.id),
                    reference.to_markdown()
                ));
            }
        }

        let mut artifacts = vec![Artifact::new(Format::Markdown, format!("{}.md", stem), out)];
        artifacts.extend(figure_files(Format::Markdown, document));
        artifacts
    }
}

fn front_matter(metadata: &Metadata) -> String {
    let header = FrontMatter {
        title: metadata.title.as_deref(),
        author: metadata.author.iter().map(String::as_str).collect(),
        date: metadata.date.as_deref(),
    };
    if header.title.is_none() && header.author.is_empty() && header.date.is_none() {
        return String::new();
    }
    match serde_yaml::to_string(&header) {
        Ok(yaml) => format!("---\n{}---\n\n", yaml),
        Err(err) => {
            tracing::warn!(%err, "cannot serialize the title block");
            String::new()
        }
    }
}

fn anchor(id: Option<&str>) -> String {
    id.map(|id| format!("<a id=\"{}\"></a>\n\n", escape_html(id)))
        .unwrap_or_default()
}

fn caption_line(kind: RefKind, number: Option<usize>, caption: Option<&str>) -> Option<String> {
    match (number, caption) {
        (None, None) => None,
        (number, Some(caption)) => Some(format!("*{}{}*", caption_prefix(kind, number), caption)),
        (Some(number), None) => Some(format!("*{} {}*", kind.name(), number)),
    }
}

fn figure_markdown(figure: &FigureElement) -> String {
    let mut out = anchor(figure.id.as_deref());
    out.push_str(&format!("![{}]({})\n\n", figure.alt, figure.path));
    if let Some(caption) = caption_line(RefKind::Figure, figure.number, figure.caption.as_deref()) {
        out.push_str(&caption);
        out.push_str("\n\n");
    }
    out
}

fn table_markdown(table: &TableElement) -> String {
    let mut out = anchor(table.id.as_deref());
    if let Some(caption) = caption_line(RefKind::Table, table.number, table.caption.as_deref()) {
        out.push_str(&caption);
        out.push_str("\n\n");
    }
    out.push_str(table.markdown.trim_end());
    out.push_str("\n\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::Reference;

    fn emit(document: &Stitched, metadata: &Metadata) -> Vec<Artifact> {
        MarkdownEmitter.emit(document, metadata, &OutputFormat::named("markdown"), "doc")
    }

    #[test]
    fn narrative_passes_through_with_front_matter() {
        let document = Stitched {
            parts: vec![Part::Markdown("The answer is 4.\n".into())],
            references: Vec::new(),
        };
        let metadata = Metadata {
            title: Some("Answers".into()),
            ..Metadata::default()
        };
        let artifacts = emit(&document, &metadata);
        assert_eq!(artifacts[0].content, "---\ntitle: Answers\n---\n\nThe answer is 4.\n");

        let artifacts = emit(&document, &Metadata::default());
        assert_eq!(artifacts[0].content, "The answer is 4.\n");
    }

    #[test]
    fn figures_link_to_files() {
        let document = Stitched {
            parts: vec![Part::Figure(FigureElement {
                id: Some("fig-a".into()),
                number: Some(1),
                caption: Some("A plot".into()),
                alt: "A plot".into(),
                path: "doc_files/figure/a-1.svg".into(),
                svg: "<svg/>".into(),
                width: None,
                height: None,
            })],
            references: Vec::new(),
        };
        let artifacts = emit(&document, &Metadata::default());
        assert_eq!(
            artifacts[0].content,
            "<a id=\"fig-a\"></a>\n\n![A plot](doc_files/figure/a-1.svg)\n\n*Figure 1: A plot*\n\n"
        );
        assert_eq!(artifacts[1].content, "<svg/>");
    }

    #[test]
    fn reference_list_is_appended() {
        let document = Stitched {
            parts: vec![Part::Markdown("As Xie (2015) says.\n".into())],
            references: vec![Reference {
                id: "xie2015".into(),
                title: Some("Dynamic Documents".into()),
                year: Some("2015".into()),
                ..Reference::default()
            }],
        };
        let artifacts = emit(&document, &Metadata::default());
        assert!(artifacts[0].content.ends_with(
            "says.\n\n## References\n\n<a id=\"ref-xie2015\"></a>(2015). *Dynamic Documents*.\n\n"
        ));
    }
}
