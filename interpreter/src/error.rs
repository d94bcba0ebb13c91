use std::ops::Range;

use thiserror::Error;
use weave::Fragment;

/// Errors raised while parsing or evaluating fragment code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// `offset` is a byte offset into the fragment code.
    #[error("syntax error: {message}")]
    Syntax { message: String, offset: usize },

    #[error("object '{0}' not found")]
    UndefinedVariable(String),

    #[error("could not find function \"{0}\"")]
    UndefinedFunction(String),

    #[error("there is no package called '{0}'")]
    UnknownPackage(String),

    #[error("{0}")]
    TypeError(String),

    #[error("invalid argument to {function}(): {message}")]
    InvalidArgument { function: String, message: String },

    #[error("argument \"{argument}\" is missing, with no default")]
    MissingArgument { argument: String },

    #[error("subscript out of bounds")]
    SubscriptOutOfBounds,

    /// Raised by `stop()`.
    #[error("{0}")]
    Stop(String),

    #[error("no evaluation engine for '{0}' fragments")]
    UnsupportedEngine(String),

    #[error("evaluation nested too deeply")]
    StackOverflow,

    #[error("result would be too long a vector")]
    VectorTooLong,
}

impl RuntimeError {
    pub fn invalid_argument(function: &str, message: impl Into<String>) -> Self {
        RuntimeError::InvalidArgument {
            function: function.to_string(),
            message: message.into(),
        }
    }

    pub fn missing(argument: &str) -> Self {
        RuntimeError::MissingArgument {
            argument: argument.to_string(),
        }
    }
}

/// A failed fragment, enriched with its location in the document.
#[derive(Debug, Clone, Error)]
#[error("error in {location}: {error}")]
pub struct FragmentEvaluationError {
    pub error: RuntimeError,
    /// e.g. `fragment 'setup' (line 12)`
    pub location: String,
    pub fragment_id: usize,
    /// 1-based document line of the failing statement.
    pub line: usize,
    /// Byte span of the fragment in the document source.
    pub span: Range<usize>,
    pub source_id: usize,
}

impl FragmentEvaluationError {
    /// `offset` is the byte offset in the fragment code where evaluation failed.
    pub fn new(error: RuntimeError, fragment: &Fragment, offset: usize, source_id: usize) -> Self {
        let code_line = fragment.code[..offset.min(fragment.code.len())]
            .bytes()
            .filter(|&b| b == b'\n')
            .count();
        FragmentEvaluationError {
            error,
            location: fragment.describe(),
            fragment_id: fragment.id,
            line: fragment.code_line + code_line,
            span: fragment.span.clone(),
            source_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_read_like_the_language() {
        assert_eq!(
            RuntimeError::UndefinedVariable("x".into()).to_string(),
            "object 'x' not found"
        );
        assert_eq!(
            RuntimeError::UndefinedFunction("kable".into()).to_string(),
            "could not find function \"kable\""
        );
        assert_eq!(
            RuntimeError::invalid_argument("round", "digits must be a number").to_string(),
            "invalid argument to round(): digits must be a number"
        );
    }
}
