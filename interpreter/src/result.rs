use weave::FragmentOptions;

use crate::renderable::Figure;
use crate::runtime_value::RuntimeValue;

/// One observable effect of running fragment code, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// A visible value, auto-printed or passed to `print()`.
    Value(RuntimeValue),
    /// Raw text written by `cat()`.
    Text(String),
    Figure(Figure),
    Warning(String),
    Message(String),
    /// The error that stopped a fragment evaluated with `error = TRUE`.
    Error(String),
}

/// Collects outputs while fragment code runs.
#[derive(Debug, Default)]
pub struct Capture {
    outputs: Vec<Output>,
}

impl Capture {
    pub fn push(&mut self, output: Output) {
        self.outputs.push(output);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.outputs.push(Output::Warning(message.into()));
    }

    pub fn message(&mut self, message: impl Into<String>) {
        self.outputs.push(Output::Message(message.into()));
    }

    pub fn into_outputs(self) -> Vec<Output> {
        self.outputs
    }
}

/// The outcome of evaluating one fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub fragment_id: usize,
    /// Outputs with suppressed warnings and messages already removed.
    pub outputs: Vec<Output>,
    /// Value of the last top-level statement.
    pub value: RuntimeValue,
    pub suppressed_warnings: usize,
    pub suppressed_messages: usize,
}

impl EvaluationResult {
    /// Apply the fragment's suppression options to captured outputs.
    pub fn new(
        fragment_id: usize,
        outputs: Vec<Output>,
        value: RuntimeValue,
        options: &FragmentOptions,
    ) -> Self {
        let mut suppressed_warnings = 0;
        let mut suppressed_messages = 0;
        let outputs = outputs
            .into_iter()
            .filter(|output| match output {
                Output::Warning(_) if options.suppress_warnings => {
                    suppressed_warnings += 1;
                    false
                }
                Output::Message(_) if options.suppress_messages => {
                    suppressed_messages += 1;
                    false
                }
                _ => true,
            })
            .collect();

        EvaluationResult {
            fragment_id,
            outputs,
            value,
            suppressed_warnings,
            suppressed_messages,
        }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().filter_map(|o| match o {
            Output::Warning(w) => Some(w.as_str()),
            _ => None,
        })
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().filter_map(|o| match o {
            Output::Message(m) => Some(m.as_str()),
            _ => None,
        })
    }

    pub fn error(&self) -> Option<&str> {
        self.outputs.iter().find_map(|o| match o {
            Output::Error(e) => Some(e.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppression_removes_and_counts() {
        let options = FragmentOptions {
            suppress_warnings: true,
            ..FragmentOptions::default()
        };
        let outputs = vec![
            Output::Warning("careful".into()),
            Output::Message("hello".into()),
            Output::Value(RuntimeValue::Number(1.0)),
        ];
        let result = EvaluationResult::new(0, outputs, RuntimeValue::Number(1.0), &options);
        assert_eq!(result.warnings().count(), 0);
        assert_eq!(result.suppressed_warnings, 1);
        assert_eq!(result.messages().collect::<Vec<_>>(), vec!["hello"]);
        assert_eq!(result.outputs.len(), 2);
    }
}
