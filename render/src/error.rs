use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use interpreter::FragmentEvaluationError;
use thiserror::Error;
use weave::ParseError;

/// Problems that stop a compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{} error(s) while parsing the document", .0.len())]
    Parse(Vec<ParseError>),

    #[error(transparent)]
    Evaluation(#[from] FragmentEvaluationError),

    #[error("unknown output format '{0}'")]
    UnknownFormat(String),

    #[error("refusing to write '{}' outside the output directory", .0.display())]
    UnsafePath(PathBuf),

    #[error("cannot write '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Non-fatal problems. Compilation continues and the output shows a
/// placeholder where relevant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WarningKind {
    #[error("unresolved cross-reference '@{0}'")]
    UnresolvedReference(String),

    #[error("unknown citation key '{0}'")]
    UnknownCitationKey(String),

    #[error("cannot load bibliography '{}': {reason}", path.display())]
    Bibliography { path: PathBuf, reason: String },

    #[error("citations found but no bibliography is configured")]
    MissingBibliography,

    /// A warning or message raised by an inline fragment, which has nowhere
    /// to show it.
    #[error("{location}: {message}")]
    InlineDiagnostic { location: String, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub kind: WarningKind,
    /// Byte span in the document source, when one can be located.
    pub span: Option<Range<usize>>,
}

impl Warning {
    pub fn new(kind: WarningKind) -> Self {
        Warning { kind, span: None }
    }

    pub fn with_span(mut self, span: Range<usize>) -> Self {
        self.span = Some(span);
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}
