pub mod document;
pub mod metadata;
pub mod options;
pub mod parser;

pub use document::{Block, Document, Fragment, FragmentKind, NarrativeText, Segment};
pub use metadata::{Metadata, OutputFormat};
pub use options::{FigureSize, FragmentOptions, OptionValue, ResultHandling};
pub use parser::{ParseError, ParseErrorKind, Parser};
