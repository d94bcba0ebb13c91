pub mod environment;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod format;
pub mod library;
pub mod print;
pub mod renderable;
pub mod result;
pub mod runtime_value;
pub mod syntax;

pub use environment::Environment;
pub use error::{FragmentEvaluationError, RuntimeError};
pub use executor::{Evaluated, execute_document, execute_fragment};
pub use library::{Kable, Library, Package};
pub use renderable::{Figure, Narrative, Renderable};
pub use result::{EvaluationResult, Output};
pub use runtime_value::{RuntimeValue, Table};
