use interpreter::print::print_value;
use interpreter::{
    Environment, Evaluated, FragmentEvaluationError, Library, Output, RuntimeError, RuntimeValue,
    execute_document,
};

fn execute(source: &str) -> (Result<Evaluated, FragmentEvaluationError>, Environment) {
    let document = weave::Parser::new(source.to_string(), 0)
        .parse()
        .expect("parse failed");
    let mut env = Environment::new();
    let result = execute_document(&document, &mut env, &Library::standard());
    (result, env)
}

fn run(source: &str) -> (Evaluated, Environment) {
    let (result, env) = execute(source);
    (result.expect("evaluation failed"), env)
}

/// Console text of every output of fragment `id`, one entry per output.
fn printed(evaluated: &Evaluated, id: usize) -> Vec<String> {
    evaluated
        .get(id)
        .expect("fragment was not evaluated")
        .outputs
        .iter()
        .map(|output| match output {
            Output::Value(value) => print_value(value),
            Output::Text(text) => text.clone(),
            Output::Figure(_) => "<figure>".to_string(),
            Output::Warning(w) => format!("Warning: {}", w),
            Output::Message(m) => m.clone(),
            Output::Error(e) => format!("Error: {}", e),
        })
        .collect()
}

fn chunk(code: &str) -> String {
    format!("```{{r}}\n{}\n```\n", code)
}

#[test]
fn auto_print_of_top_level_values() {
    let (evaluated, _) = run(&chunk("x <- c(1, 2.5, 10)\nx\nmean(x)"));
    assert_eq!(printed(&evaluated, 0), vec!["[1]  1.0  2.5 10.0", "[1] 4.5"]);
}

#[test]
fn assignments_and_invisible_calls_do_not_print() {
    let (evaluated, _) = run(&chunk("y = 3\n4 -> z\ninvisible(5)\nlibrary(knitr)"));
    assert!(evaluated.get(0).unwrap().outputs.is_empty());
}

#[test]
fn evaluate_false_leaves_bindings_alone() {
    let source = format!(
        "{}\n```{{r, eval=FALSE}}\nx <- 100\n```\n\n{}",
        chunk("x <- 1"),
        chunk("x")
    );
    let (evaluated, env) = run(&source);
    assert!(evaluated.get(1).is_none());
    assert_eq!(env.get_variable("x"), Some(&RuntimeValue::Number(1.0)));
    assert_eq!(printed(&evaluated, 2), vec!["[1] 1"]);
}

#[test]
fn hidden_results_still_bind() {
    let source = format!(
        "```{{r, results='hide'}}\nsecret <- 42\nsecret\n```\n\n{}",
        chunk("secret + 1")
    );
    let (evaluated, _) = run(&source);
    assert_eq!(printed(&evaluated, 1), vec!["[1] 43"]);
}

#[test]
fn inline_fragments_evaluate_in_place() {
    let (evaluated, _) = run("The answer is `{r} 2+2`.\n");
    assert_eq!(evaluated.get(0).unwrap().value, RuntimeValue::Number(4.0));
}

#[test]
fn inline_fragments_see_earlier_bindings() {
    let source = format!("{}\nWe have `r n` participants.\n", chunk("n <- length(1:12)"));
    let (evaluated, _) = run(&source);
    assert_eq!(evaluated.get(1).unwrap().value, RuntimeValue::Number(12.0));
}

#[test]
fn suppressed_warnings_are_counted_not_shown() {
    let (evaluated, _) = run("```{r, warning=FALSE}\nsqrt(-1)\n```\n");
    let result = evaluated.get(0).unwrap();
    assert_eq!(result.warnings().count(), 0);
    assert_eq!(result.suppressed_warnings, 1);
    assert_eq!(printed(&evaluated, 0), vec!["[1] NaN"]);
}

#[test]
fn warnings_are_kept_by_default() {
    let (evaluated, _) = run(&chunk("as.numeric(\"abc\")"));
    assert_eq!(
        printed(&evaluated, 0),
        vec!["Warning: NAs introduced by coercion", "[1] NA"]
    );
}

#[test]
fn suppressed_messages() {
    let (evaluated, _) = run("```{r, message=FALSE}\nmessage(\"loading\")\n1\n```\n");
    assert_eq!(printed(&evaluated, 0), vec!["[1] 1"]);
    assert_eq!(evaluated.get(0).unwrap().suppressed_messages, 1);
}

#[test]
fn order_determines_visibility() {
    let writer = chunk("score <- 10");
    let reader = chunk("score * 2");

    let (forward, _) = execute(&format!("{}\n{}", writer, reader));
    assert!(forward.is_ok());

    let (reversed, _) = execute(&format!("{}\n{}", reader, writer));
    let error = reversed.unwrap_err();
    assert_eq!(error.error, RuntimeError::UndefinedVariable("score".into()));
    assert_eq!(error.fragment_id, 0);
}

#[test]
fn packages_must_be_attached() {
    let (result, _) = execute(&chunk("kable(1:3)"));
    assert_eq!(
        result.unwrap_err().error,
        RuntimeError::UndefinedFunction("kable".into())
    );

    let (evaluated, env) = run(&format!("{}\n{}", chunk("library(knitr)"), chunk("kable(1:3)")));
    assert!(env.is_attached("knitr"));
    assert!(matches!(
        evaluated.get(1).unwrap().outputs.as_slice(),
        [Output::Value(RuntimeValue::Object(_))]
    ));
}

#[test]
fn namespaced_calls_do_not_attach() {
    let (evaluated, env) = run(&chunk("papaja::printp(0.0004)"));
    assert!(!env.is_attached("papaja"));
    assert_eq!(printed(&evaluated, 0), vec!["[1] \"< .001\""]);
}

#[test]
fn data_frames_print_with_row_numbers() {
    let (evaluated, _) = run(&chunk(
        "df <- data.frame(group = c(\"control\", \"treatment\"), score = c(1.5, 2))\ndf",
    ));
    assert_eq!(
        printed(&evaluated, 0),
        vec!["      group score\n1   control   1.5\n2 treatment   2.0"]
    );
}

#[test]
fn plots_produce_figures() {
    let (evaluated, _) = run(&chunk("plot(1:10, main = \"Trend\")"));
    let result = evaluated.get(0).unwrap();
    match result.outputs.as_slice() {
        [Output::Figure(figure)] => {
            assert!(figure.svg.starts_with("<svg"));
            assert_eq!(figure.title.as_deref(), Some("Trend"));
        }
        other => panic!("expected one figure, got {:?}", other),
    }
}

#[test]
fn seeded_draws_are_reproducible() {
    let code =
        chunk("set.seed(42)\nx <- runif(3)\nset.seed(42)\ny <- runif(3)\nsame <- sum(x == y)");
    let (_, env) = run(&code);
    assert_eq!(env.get_variable("same"), Some(&RuntimeValue::Number(3.0)));
}

#[test]
fn stop_halts_without_error_option() {
    let (result, env) = execute(&format!(
        "{}\n{}",
        chunk("stop(\"bad input\")"),
        chunk("after <- 1")
    ));
    let error = result.unwrap_err();
    assert_eq!(error.to_string(), "error in fragment at line 1: bad input");
    assert!(!env.has_variable("after"));
}

#[test]
fn cat_writes_raw_text() {
    let (evaluated, _) = run(&chunk("cat(\"a\", \"b\", sep = \"-\")"));
    assert_eq!(printed(&evaluated, 0), vec!["a-b"]);
}

#[test]
fn missing_values_print_as_na() {
    let (evaluated, env) = run(&chunk(
        "NA\nx <- c(1, NA, 3)\nx\nx[2] + 1\nmissing <- sum(is.na(x))\nsqrt(-1)",
    ));
    assert_eq!(
        printed(&evaluated, 0),
        vec!["[1] NA", "[1]  1 NA  3", "[1] NA", "[1] NaN"]
    );
    assert_eq!(env.get_variable("missing"), Some(&RuntimeValue::Number(1.0)));
}

const HUGE_VECTORS: [&str; 4] = [
    "x <- 1:1e20",
    "x <- rep(c(1, 2), times = 1e19)",
    "x <- seq(1, 1e20, by = 1e-300)",
    "x <- seq_len(1e12)",
];

#[test]
fn huge_vectors_are_recorded_under_error_option() {
    for code in HUGE_VECTORS {
        let source = format!("```{{r, error=TRUE}}\n{}\n```\n\n{}", code, chunk("after <- 1"));
        let (evaluated, env) = run(&source);
        assert_eq!(
            printed(&evaluated, 0),
            vec!["Error: result would be too long a vector"],
            "{}",
            code
        );
        assert!(!env.has_variable("x"), "{}", code);
        assert!(env.has_variable("after"), "{}", code);
    }
}

#[test]
fn huge_vectors_halt_without_error_option() {
    for code in HUGE_VECTORS {
        let (result, env) = execute(&chunk(code));
        let error = result.unwrap_err();
        assert_eq!(error.error, RuntimeError::VectorTooLong, "{}", code);
        assert_eq!(error.fragment_id, 0);
        assert!(!env.has_variable("x"), "{}", code);
    }
}
