//! Serialization of the stitched document, one emitter per target format.

mod html;
mod latex;
mod markdown;

use std::path::{Component, Path, PathBuf};

use weave::{Metadata, OutputFormat};

use crate::error::CompileError;
use crate::format::Format;
use crate::renderer::Stitched;

pub use html::HtmlEmitter;
pub use latex::LatexEmitter;
pub use markdown::MarkdownEmitter;

/// One emitted file. Paths are relative to the output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub format: Format,
    pub path: PathBuf,
    pub content: String,
}

impl Artifact {
    pub fn new(format: Format, path: impl Into<PathBuf>, content: String) -> Self {
        Artifact {
            format,
            path: path.into(),
            content,
        }
    }

    /// Whether this is the document itself rather than a supporting file.
    pub fn is_document(&self) -> bool {
        self.path.extension().and_then(|e| e.to_str()) == Some(self.format.extension())
    }
}

/// Format-specific serialization.
pub trait Emitter {
    fn format(&self) -> Format;

    /// The document artifact first, supporting files after it.
    fn emit(
        &self,
        document: &Stitched,
        metadata: &Metadata,
        options: &OutputFormat,
        stem: &str,
    ) -> Vec<Artifact>;
}

pub fn for_format(format: Format) -> Box<dyn Emitter> {
    match format {
        Format::Html => Box::new(HtmlEmitter),
        Format::Latex => Box::new(LatexEmitter),
        Format::Markdown => Box::new(MarkdownEmitter),
    }
}

/// SVG files for formats that link to figures instead of embedding them.
fn figure_files(format: Format, document: &Stitched) -> Vec<Artifact> {
    document
        .figures()
        .map(|figure| Artifact::new(format, &figure.path, figure.svg.clone()))
        .collect()
}

/// Write every artifact under `dir`, creating directories as needed.
pub fn write_all(artifacts: &[Artifact], dir: &Path) -> Result<Vec<PathBuf>, CompileError> {
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let contained = artifact
            .path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained {
            return Err(CompileError::UnsafePath(artifact.path.clone()));
        }
        let path = dir.join(&artifact.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CompileError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&path, &artifact.content).map_err(|source| CompileError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "wrote artifact");
        written.push(path);
    }
    Ok(written)
}
