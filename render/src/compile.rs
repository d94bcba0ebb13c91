//! The compilation pipeline: parse, evaluate, render, resolve, emit.

use std::path::{Path, PathBuf};

use interpreter::{Environment, Library, execute_document};
use weave::{Document, Metadata, OutputFormat, Parser};

use crate::citation::{Bibliography, Citer};
use crate::emitter::{self, Artifact};
use crate::error::{CompileError, Warning, WarningKind};
use crate::format::Format;
use crate::markdown::rewrite_text;
use crate::renderer::{Part, Rendered, Renderer, Stitched};

/// Settings that come from the invocation rather than the document.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Base name of emitted files, usually the input's file stem.
    pub stem: String,
    /// Directory relative paths in the metadata (the bibliography) resolve
    /// against.
    pub base_dir: PathBuf,
    /// Formats requested by the caller. Overrides the metadata when non-empty.
    pub formats: Vec<String>,
    /// File id used in diagnostics.
    pub source_id: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            stem: "document".to_string(),
            base_dir: PathBuf::from("."),
            formats: Vec::new(),
            source_id: 0,
        }
    }
}

impl CompileOptions {
    /// Options for compiling the file at `path`.
    pub fn for_path(path: &Path) -> Self {
        CompileOptions {
            stem: path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("document")
                .to_string(),
            base_dir: path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
            ..CompileOptions::default()
        }
    }
}

/// Everything one compilation run produced.
#[derive(Debug)]
pub struct Compilation {
    pub document: Document,
    pub stitched: Stitched,
    /// Documents first in format order, supporting files after each.
    pub artifacts: Vec<Artifact>,
    pub warnings: Vec<Warning>,
}

impl Compilation {
    /// The document artifact for `format`, if it was requested.
    pub fn output(&self, format: Format) -> Option<&Artifact> {
        self.artifacts
            .iter()
            .find(|a| a.format == format && a.is_document())
    }
}

/// Compile a manuscript. Parse errors, fragment failures and unknown formats
/// are fatal; reference and citation problems become warnings.
pub fn compile(source: &str, options: &CompileOptions) -> Result<Compilation, CompileError> {
    let document = Parser::new(source.to_string(), options.source_id)
        .parse()
        .map_err(CompileError::Parse)?;
    let targets = targets(&document.metadata, &options.formats)?;

    let mut warnings = Vec::new();
    let bibliography = load_bibliography(&document.metadata, &options.base_dir, &mut warnings);

    // One context per run, dropped with it.
    let library = Library::standard();
    let mut env = Environment::new();
    let evaluated = execute_document(&document, &mut env, &library)?;

    let Rendered {
        mut stitched,
        crossrefs,
        warnings: render_warnings,
    } = Renderer::new(&evaluated, &options.stem).render(&document);
    warnings.extend(render_warnings);

    let mut citer = Citer::new(bibliography.as_ref(), document.metadata.link_citations);
    let mut reference_warnings = Vec::new();
    let mut resolve = |text: &str| citer.process(&crossrefs.resolve(text, &mut reference_warnings));
    for part in &mut stitched.parts {
        match part {
            Part::Markdown(markdown) => *markdown = rewrite_text(markdown, &mut resolve),
            Part::Figure(figure) => figure.caption = figure.caption.as_deref().map(&mut resolve),
            Part::Table(table) => table.caption = table.caption.as_deref().map(&mut resolve),
        }
    }
    if citer.has_citations() && document.metadata.bibliography.is_none() {
        tracing::warn!("citations found but no bibliography is configured");
        warnings.push(Warning::new(WarningKind::MissingBibliography));
    }
    stitched.references = citer.references();
    reference_warnings.extend(citer.into_warnings());
    warnings.extend(
        reference_warnings
            .into_iter()
            .map(|warning| locate(warning, source)),
    );

    let mut artifacts: Vec<Artifact> = Vec::new();
    for (format, format_options) in &targets {
        let emitter = emitter::for_format(*format);
        for artifact in emitter.emit(&stitched, &document.metadata, format_options, &options.stem) {
            // Figure files are shared between formats.
            if artifacts.iter().any(|a| a.path == artifact.path) {
                continue;
            }
            tracing::info!(
                format = %emitter.format(),
                path = %artifact.path.display(),
                bytes = artifact.content.len(),
                "emitted"
            );
            artifacts.push(artifact);
        }
    }

    Ok(Compilation {
        document,
        stitched,
        artifacts,
        warnings,
    })
}

/// Requested formats with their option maps, validated before anything runs.
fn targets(
    metadata: &Metadata,
    requested: &[String],
) -> Result<Vec<(Format, OutputFormat)>, CompileError> {
    let declared: Vec<OutputFormat> = if !requested.is_empty() {
        requested
            .iter()
            .map(|name| {
                metadata
                    .output
                    .iter()
                    .find(|f| &f.name == name)
                    .cloned()
                    .unwrap_or_else(|| OutputFormat::named(name.clone()))
            })
            .collect()
    } else if metadata.output.is_empty() {
        vec![OutputFormat::named("html")]
    } else {
        metadata.output.clone()
    };

    let mut targets: Vec<(Format, OutputFormat)> = Vec::new();
    for output in declared {
        let format = Format::try_from(output.name.as_str()).map_err(CompileError::UnknownFormat)?;
        if !targets.iter().any(|(f, _)| *f == format) {
            targets.push((format, output));
        }
    }
    Ok(targets)
}

fn load_bibliography(
    metadata: &Metadata,
    base_dir: &Path,
    warnings: &mut Vec<Warning>,
) -> Option<Bibliography> {
    let path = metadata.bibliography.as_ref()?;
    let path = base_dir.join(path);
    match Bibliography::load(&path) {
        Ok(bibliography) => Some(bibliography),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "bibliography not loaded");
            warnings.push(Warning::new(WarningKind::Bibliography {
                path,
                reason: err.to_string(),
            }));
            None
        }
    }
}

/// Attach the source span of the first occurrence of the offending token.
fn locate(warning: Warning, source: &str) -> Warning {
    let token = match &warning.kind {
        WarningKind::UnresolvedReference(id) => format!("@{}", id),
        WarningKind::UnknownCitationKey(key) => format!("@{}", key),
        _ => return warning,
    };
    match source.find(&token) {
        Some(start) => warning.with_span(start..start + token.len()),
        None => warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_default_to_html() {
        let targets = targets(&Metadata::default(), &[]).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].0, Format::Html);
    }

    #[test]
    fn aliases_collapse_and_keep_options() {
        let metadata = Metadata::from_yaml(
            "output:\n  pdf_document:\n    toc: true\n  latex: default\n  html: default\n",
        )
        .unwrap();
        let targets = targets(&metadata, &[]).unwrap();
        let formats: Vec<Format> = targets.iter().map(|(f, _)| *f).collect();
        assert_eq!(formats, vec![Format::Latex, Format::Html]);
        assert_eq!(targets[0].1.option_bool("toc"), Some(true));
    }

    #[test]
    fn requested_formats_override_metadata() {
        let metadata = Metadata::from_yaml("output: html\n").unwrap();
        let targets = targets(&metadata, &["markdown".to_string()]).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].0, Format::Markdown);
    }

    #[test]
    fn unknown_formats_are_fatal() {
        let metadata = Metadata::from_yaml("output: docx\n").unwrap();
        assert!(matches!(
            targets(&metadata, &[]),
            Err(CompileError::UnknownFormat(name)) if name == "docx"
        ));
    }

    #[test]
    fn warnings_point_at_their_token() {
        let source = "See @tbl-none here.";
        let warning = locate(
            Warning::new(WarningKind::UnresolvedReference("tbl-none".into())),
            source,
        );
        assert_eq!(warning.span, Some(4..13));
    }
}
