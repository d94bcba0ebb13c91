use std::collections::BTreeMap;

use weave::{Document, Fragment};

use crate::environment::Environment;
use crate::error::{FragmentEvaluationError, RuntimeError};
use crate::evaluator::run_program;
use crate::library::{CallContext, Library};
use crate::result::{Capture, EvaluationResult, Output};
use crate::runtime_value::RuntimeValue;
use crate::syntax::parse_program;

/// Results of one compilation run, keyed by fragment id. Fragments with
/// `evaluate = false` have no entry.
#[derive(Debug, Clone, Default)]
pub struct Evaluated {
    results: BTreeMap<usize, EvaluationResult>,
}

impl Evaluated {
    pub fn get(&self, fragment_id: usize) -> Option<&EvaluationResult> {
        self.results.get(&fragment_id)
    }

    /// Results in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &EvaluationResult> {
        self.results.values()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Run every fragment of `document` in source order against one shared
/// environment. Stops at the first failing fragment unless that fragment
/// sets `error = TRUE`.
pub fn execute_document(
    document: &Document,
    env: &mut Environment,
    library: &Library,
) -> Result<Evaluated, FragmentEvaluationError> {
    let mut evaluated = Evaluated::default();
    for fragment in document.fragments() {
        if let Some(result) = execute_fragment(fragment, env, library, document.source_id)? {
            evaluated.results.insert(fragment.id, result);
        }
    }
    tracing::debug!(
        fragments = evaluated.len(),
        bindings = env.variable_names().len(),
        "document evaluated"
    );
    Ok(evaluated)
}

/// Run one fragment. Returns `None` when the fragment is not evaluated.
pub fn execute_fragment(
    fragment: &Fragment,
    env: &mut Environment,
    library: &Library,
    source_id: usize,
) -> Result<Option<EvaluationResult>, FragmentEvaluationError> {
    if !fragment.options.evaluate {
        tracing::debug!(fragment = %fragment.describe(), "skipped, evaluate = FALSE");
        return Ok(None);
    }
    if fragment.options.cache {
        tracing::debug!(
            fragment = %fragment.describe(),
            "cache requested; results are recomputed every run"
        );
    }
    tracing::debug!(fragment = %fragment.describe(), engine = %fragment.engine, "evaluating");

    let mut capture = Capture::default();
    let outcome = if fragment.engine == "r" {
        run_code(&fragment.code, env, library, &mut capture)
    } else {
        Err((RuntimeError::UnsupportedEngine(fragment.engine.clone()), 0))
    };

    let value = match outcome {
        Ok(value) => value,
        Err((error, _)) if fragment.options.error => {
            tracing::debug!(fragment = %fragment.describe(), %error, "error kept as output");
            capture.push(Output::Error(error.to_string()));
            RuntimeValue::Null
        }
        Err((error, offset)) => {
            return Err(FragmentEvaluationError::new(error, fragment, offset, source_id));
        }
    };

    Ok(Some(EvaluationResult::new(
        fragment.id,
        capture.into_outputs(),
        value,
        &fragment.options,
    )))
}

fn run_code(
    code: &str,
    env: &mut Environment,
    library: &Library,
    capture: &mut Capture,
) -> Result<RuntimeValue, (RuntimeError, usize)> {
    let statements = parse_program(code).map_err(|error| {
        let offset = match &error {
            RuntimeError::Syntax { offset, .. } => *offset,
            _ => 0,
        };
        (error, offset)
    })?;
    let mut ctx = CallContext {
        env,
        library,
        capture,
        depth: 0,
    };
    run_program(&statements, &mut ctx)
}
