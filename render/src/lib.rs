pub mod citation;
pub mod compile;
pub mod crossref;
pub mod emitter;
pub mod error;
pub mod format;
pub mod markdown;
pub mod renderer;

pub use citation::{Bibliography, CitationError, CitationStyle, Citer, Reference};
pub use compile::{Compilation, CompileOptions, compile};
pub use crossref::{CrossRefs, RefKind};
pub use emitter::{Artifact, Emitter, write_all};
pub use error::{CompileError, Warning, WarningKind};
pub use format::Format;
pub use renderer::{FigureElement, Part, Renderer, Stitched, TableElement};
