use crate::error::RuntimeError;
use crate::library::{Arguments, CallContext};
use crate::result::Output;
use crate::runtime_value::{RuntimeValue, checked_length};
use crate::syntax::{BinaryOperator, Expr, Statement, UnaryOperator};

const MAX_DEPTH: usize = 256;

/// Run top-level statements, auto-printing each visible result.
/// On failure, returns the error with the byte offset of the failing statement.
pub fn run_program(
    statements: &[Statement],
    ctx: &mut CallContext<'_>,
) -> Result<RuntimeValue, (RuntimeError, usize)> {
    let mut last = RuntimeValue::Null;
    for statement in statements {
        let (value, visible) =
            execute_statement(statement, ctx).map_err(|e| (e, statement.span().start))?;
        if visible {
            ctx.capture.push(Output::Value(value.clone()));
        }
        last = value;
    }
    Ok(last)
}

/// Execute one statement, returning its value and whether it auto-prints.
pub fn execute_statement(
    statement: &Statement,
    ctx: &mut CallContext<'_>,
) -> Result<(RuntimeValue, bool), RuntimeError> {
    match statement {
        Statement::Assignment { target, value, .. } => {
            let value = evaluate(value, ctx)?;
            tracing::trace!(name = %target, class = %value.class(), "binding");
            ctx.env.set_variable(target, value.clone());
            Ok((value, false))
        }
        Statement::Expression { value, .. } => evaluate_visible(value, ctx),
    }
}

/// Evaluate an expression to a value.
pub fn evaluate(expr: &Expr, ctx: &mut CallContext<'_>) -> Result<RuntimeValue, RuntimeError> {
    evaluate_visible(expr, ctx).map(|(value, _)| value)
}

/// Evaluate an expression, also reporting whether its value is visible.
pub fn evaluate_visible(
    expr: &Expr,
    ctx: &mut CallContext<'_>,
) -> Result<(RuntimeValue, bool), RuntimeError> {
    if ctx.depth > MAX_DEPTH {
        return Err(RuntimeError::StackOverflow);
    }
    ctx.depth += 1;
    let result = evaluate_inner(expr, ctx);
    ctx.depth -= 1;
    result
}

fn evaluate_inner(
    expr: &Expr,
    ctx: &mut CallContext<'_>,
) -> Result<(RuntimeValue, bool), RuntimeError> {
    match expr {
        // --- Literals ---
        Expr::Number(n) => Ok((RuntimeValue::Number(*n), true)),
        Expr::String(s) => Ok((RuntimeValue::String(s.clone()), true)),
        Expr::Boolean(b) => Ok((RuntimeValue::Boolean(*b), true)),
        Expr::Null => Ok((RuntimeValue::Null, true)),

        // --- References ---
        Expr::Variable(name, _) => {
            if let Some(value) = ctx.env.get_variable(name) {
                return Ok((value.clone(), true));
            }
            match ctx.library.find_constant(ctx.env, name) {
                Some(value) => Ok((value.clone(), true)),
                None => Err(RuntimeError::UndefinedVariable(name.clone())),
            }
        }

        Expr::Call {
            namespace,
            function,
            args,
            ..
        } => call(namespace.as_deref(), function, args, ctx),

        Expr::Index { target, index } => {
            let target = evaluate(target, ctx)?;
            let index = evaluate(index, ctx)?;
            Ok((subscript(&target, &index)?, true))
        }

        Expr::Member { target, name } => match evaluate(target, ctx)? {
            RuntimeValue::Table(table) => {
                Ok((table.column(name).unwrap_or(RuntimeValue::Null), true))
            }
            RuntimeValue::Null => Ok((RuntimeValue::Null, true)),
            _ => Err(RuntimeError::TypeError(
                "$ operator is invalid for atomic vectors".to_string(),
            )),
        },

        // --- Operations ---
        Expr::Unary { operator, operand } => {
            let value = evaluate(operand, ctx)?;
            let result = match operator {
                UnaryOperator::Negation => map_numbers(&value, "-", |n| -n)?,
                UnaryOperator::LogicalNot => {
                    let flags = value
                        .elements()
                        .iter()
                        .map(|e| logical(e).map(|b| RuntimeValue::Boolean(!b)))
                        .collect::<Result<Vec<_>, _>>()?;
                    RuntimeValue::from_elements(flags)
                }
            };
            Ok((result, true))
        }

        Expr::Binary {
            operator: BinaryOperator::LogicalAnd,
            left,
            right,
        } => {
            if !evaluate(left, ctx)?.condition()? {
                return Ok((RuntimeValue::Boolean(false), true));
            }
            Ok((RuntimeValue::Boolean(evaluate(right, ctx)?.condition()?), true))
        }

        Expr::Binary {
            operator: BinaryOperator::LogicalOr,
            left,
            right,
        } => {
            if evaluate(left, ctx)?.condition()? {
                return Ok((RuntimeValue::Boolean(true), true));
            }
            Ok((RuntimeValue::Boolean(evaluate(right, ctx)?.condition()?), true))
        }

        Expr::Binary {
            operator,
            left,
            right,
        } => {
            let l = evaluate(left, ctx)?;
            let r = evaluate(right, ctx)?;
            Ok((binary(*operator, &l, &r, ctx)?, true))
        }

        Expr::If {
            condition,
            then_branch,
            else_branch,
        } => {
            if evaluate(condition, ctx)?.condition()? {
                evaluate_visible(then_branch, ctx)
            } else if let Some(else_branch) = else_branch {
                evaluate_visible(else_branch, ctx)
            } else {
                Ok((RuntimeValue::Null, false))
            }
        }

        Expr::Block(statements) => {
            let mut last = (RuntimeValue::Null, true);
            for statement in statements {
                last = execute_statement(statement, ctx)?;
            }
            Ok(last)
        }
    }
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

fn call(
    namespace: Option<&str>,
    function: &str,
    args: &[crate::syntax::Argument],
    ctx: &mut CallContext<'_>,
) -> Result<(RuntimeValue, bool), RuntimeError> {
    let library = ctx.library;
    let builtin = match namespace {
        Some(ns) => library
            .package(ns)
            .ok_or_else(|| RuntimeError::UnknownPackage(ns.to_string()))?
            .builtin(function)
            .ok_or_else(|| RuntimeError::UndefinedFunction(format!("{}::{}", ns, function)))?,
        None => library
            .find_function(ctx.env, function)
            .ok_or_else(|| RuntimeError::UndefinedFunction(function.to_string()))?,
    };

    // library(knitr) names its package with a bare symbol.
    let quotes_package = matches!(builtin.name, "library" | "require");

    let mut arguments = Arguments::new(builtin.name);
    for (position, arg) in args.iter().enumerate() {
        let value = match &arg.value {
            Expr::Variable(name, _)
                if quotes_package
                    && (arg.name.as_deref() == Some("package")
                        || (arg.name.is_none() && position == 0)) =>
            {
                RuntimeValue::String(name.clone())
            }
            other => evaluate(other, ctx)?,
        };
        arguments.push(arg.name.clone(), value);
    }

    let value = (builtin.func)(ctx, &arguments)?;
    Ok((value, builtin.visible))
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

fn binary(
    operator: BinaryOperator,
    left: &RuntimeValue,
    right: &RuntimeValue,
    ctx: &mut CallContext<'_>,
) -> Result<RuntimeValue, RuntimeError> {
    match operator {
        BinaryOperator::Sequence => sequence(left, right),

        BinaryOperator::Addition
        | BinaryOperator::Subtraction
        | BinaryOperator::Multiplication
        | BinaryOperator::Division
        | BinaryOperator::Power
        | BinaryOperator::Modulo
        | BinaryOperator::IntegerDivision => elementwise(left, right, ctx, |a, b| {
            let (Some(x), Some(y)) = (numeric(a), numeric(b)) else {
                return Err(RuntimeError::TypeError(
                    "non-numeric argument to binary operator".to_string(),
                ));
            };
            let n = match operator {
                BinaryOperator::Addition => x + y,
                BinaryOperator::Subtraction => x - y,
                BinaryOperator::Multiplication => x * y,
                BinaryOperator::Division => x / y,
                BinaryOperator::Power => x.powf(y),
                BinaryOperator::Modulo => x - (x / y).floor() * y,
                _ => (x / y).floor(),
            };
            Ok(RuntimeValue::Number(n))
        }),

        BinaryOperator::Equality
        | BinaryOperator::Inequality
        | BinaryOperator::GreaterThan
        | BinaryOperator::LessThan
        | BinaryOperator::GreaterThanOrEqual
        | BinaryOperator::LessThanOrEqual => elementwise(left, right, ctx, |a, b| {
            let ordering = match (numeric(a), numeric(b)) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => Some(a.scalar_text().cmp(&b.scalar_text())),
            };
            let Some(ordering) = ordering else {
                return Ok(RuntimeValue::Boolean(false));
            };
            let result = match operator {
                BinaryOperator::Equality => ordering.is_eq(),
                BinaryOperator::Inequality => ordering.is_ne(),
                BinaryOperator::GreaterThan => ordering.is_gt(),
                BinaryOperator::LessThan => ordering.is_lt(),
                BinaryOperator::GreaterThanOrEqual => ordering.is_ge(),
                _ => ordering.is_le(),
            };
            Ok(RuntimeValue::Boolean(result))
        }),

        BinaryOperator::And | BinaryOperator::Or => elementwise(left, right, ctx, |a, b| {
            let (x, y) = (logical(a)?, logical(b)?);
            Ok(RuntimeValue::Boolean(if operator == BinaryOperator::And {
                x && y
            } else {
                x || y
            }))
        }),

        BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr => {
            let (x, y) = (left.condition()?, right.condition()?);
            Ok(RuntimeValue::Boolean(if operator == BinaryOperator::LogicalAnd {
                x && y
            } else {
                x || y
            }))
        }
    }
}

/// Apply `f` element by element, recycling the shorter operand.
fn elementwise(
    left: &RuntimeValue,
    right: &RuntimeValue,
    ctx: &mut CallContext<'_>,
    f: impl Fn(&RuntimeValue, &RuntimeValue) -> Result<RuntimeValue, RuntimeError>,
) -> Result<RuntimeValue, RuntimeError> {
    if matches!(left, RuntimeValue::Table(_) | RuntimeValue::Object(_))
        || matches!(right, RuntimeValue::Table(_) | RuntimeValue::Object(_))
    {
        return Err(RuntimeError::TypeError(
            "non-numeric argument to binary operator".to_string(),
        ));
    }

    let l = left.elements();
    let r = right.elements();
    if l.is_empty() || r.is_empty() {
        return Ok(RuntimeValue::Null);
    }
    let n = l.len().max(r.len());
    if n % l.len() != 0 || n % r.len() != 0 {
        ctx.capture
            .warning("longer object length is not a multiple of shorter object length");
    }
    let results = (0..n)
        .map(|i| f(&l[i % l.len()], &r[i % r.len()]))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RuntimeValue::from_elements(results))
}

/// `from:to`, stepping by one toward `to`.
fn sequence(from: &RuntimeValue, to: &RuntimeValue) -> Result<RuntimeValue, RuntimeError> {
    let (Some(start), Some(end)) = (
        from.elements().first().and_then(numeric),
        to.elements().first().and_then(numeric),
    ) else {
        return Err(RuntimeError::TypeError(
            "argument of length 0 or non-numeric in ':'".to_string(),
        ));
    };
    if !start.is_finite() || !end.is_finite() {
        return Err(RuntimeError::TypeError("NA/NaN argument in ':'".to_string()));
    }
    let count = checked_length((end - start).abs().floor() + 1.0)?;
    let step = if end >= start { 1.0 } else { -1.0 };
    Ok(RuntimeValue::from_numbers(
        (0..count).map(|i| start + step * i as f64),
    ))
}

fn subscript(target: &RuntimeValue, index: &RuntimeValue) -> Result<RuntimeValue, RuntimeError> {
    if matches!(target, RuntimeValue::Table(_) | RuntimeValue::Object(_)) {
        return Err(RuntimeError::TypeError(format!(
            "object of class '{}' is not subsettable with [; select columns with $",
            target.class()
        )));
    }
    let elements = target.elements();
    let indices = index.elements();

    if !indices.is_empty() && indices.iter().all(|i| matches!(i, RuntimeValue::Boolean(_))) {
        let selected = elements
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                matches!(indices[i % indices.len()], RuntimeValue::Boolean(true))
            })
            .map(|(_, e)| e.clone())
            .collect();
        return Ok(RuntimeValue::from_elements(selected));
    }

    let positions = index.numbers("[")?;
    if positions.iter().all(|p| *p <= 0.0) {
        let excluded: Vec<usize> = positions.iter().map(|p| (-p) as usize).collect();
        let kept = elements
            .iter()
            .enumerate()
            .filter(|(i, _)| !excluded.contains(&(i + 1)))
            .map(|(_, e)| e.clone())
            .collect();
        return Ok(RuntimeValue::from_elements(kept));
    }
    if positions.iter().any(|p| *p < 0.0) {
        return Err(RuntimeError::TypeError(
            "can't mix positive and negative subscripts".to_string(),
        ));
    }

    let mut selected = Vec::with_capacity(positions.len());
    for p in positions.iter().filter(|p| **p >= 1.0) {
        let element = elements
            .get(*p as usize - 1)
            .ok_or(RuntimeError::SubscriptOutOfBounds)?;
        selected.push(element.clone());
    }
    Ok(RuntimeValue::from_elements(selected))
}

fn map_numbers(
    value: &RuntimeValue,
    operator: &str,
    f: impl Fn(f64) -> f64,
) -> Result<RuntimeValue, RuntimeError> {
    let numbers = value.elements().iter().map(numeric).collect::<Option<Vec<_>>>();
    match numbers {
        Some(numbers) => Ok(RuntimeValue::from_numbers(numbers.into_iter().map(f))),
        None => Err(RuntimeError::TypeError(format!(
            "invalid argument to unary operator '{}'",
            operator
        ))),
    }
}

fn numeric(value: &RuntimeValue) -> Option<f64> {
    value.as_number()
}

fn logical(value: &RuntimeValue) -> Result<bool, RuntimeError> {
    match value {
        RuntimeValue::Boolean(b) => Ok(*b),
        RuntimeValue::Number(n) => Ok(*n != 0.0),
        _ => Err(RuntimeError::TypeError(
            "operations are possible only for numeric or logical types".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::library::Library;
    use crate::result::Capture;
    use crate::syntax::parse_program;

    fn run(code: &str) -> (Result<RuntimeValue, RuntimeError>, Vec<Output>) {
        let library = Library::standard();
        let mut env = Environment::new();
        let mut capture = Capture::default();
        let mut ctx = CallContext {
            env: &mut env,
            library: &library,
            capture: &mut capture,
            depth: 0,
        };
        let result =
            parse_program(code).and_then(|p| run_program(&p, &mut ctx).map_err(|(e, _)| e));
        (result, capture.into_outputs())
    }

    fn value(code: &str) -> RuntimeValue {
        run(code).0.unwrap()
    }

    #[test]
    fn arithmetic_is_vectorized() {
        assert_eq!(value("2 + 2"), RuntimeValue::Number(4.0));
        assert_eq!(value("c(1, 2, 3) * 2"), RuntimeValue::from_numbers([2.0, 4.0, 6.0]));
        assert_eq!(value("1:3 + c(10, 20, 30)"), RuntimeValue::from_numbers([11.0, 22.0, 33.0]));
        assert_eq!(value("-7 %% 3"), RuntimeValue::Number(2.0));
        assert_eq!(value("7 %/% 2"), RuntimeValue::Number(3.0));
        assert_eq!(value("2^10"), RuntimeValue::Number(1024.0));
    }

    #[test]
    fn division_by_zero_is_infinite() {
        assert_eq!(value("1 / 0"), RuntimeValue::Number(f64::INFINITY));
    }

    #[test]
    fn recycling_warns_on_uneven_lengths() {
        let (result, outputs) = run("x <- 1:3 + 1:2");
        assert!(result.is_ok());
        assert!(matches!(&outputs[0], Output::Warning(w) if w.contains("multiple")));
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(
            value("c(1, 5, 3) > 2"),
            RuntimeValue::Vector(vec![
                RuntimeValue::Boolean(false),
                RuntimeValue::Boolean(true),
                RuntimeValue::Boolean(true),
            ])
        );
        assert_eq!(value("\"a\" == \"a\" && !FALSE"), RuntimeValue::Boolean(true));
        // The right side is never evaluated.
        assert_eq!(value("FALSE && undefined_name"), RuntimeValue::Boolean(false));
    }

    #[test]
    fn visible_values_are_captured() {
        let (_, outputs) = run("x <- 5\nx\ninvisible(x)\nx * 2");
        assert_eq!(
            outputs,
            vec![
                Output::Value(RuntimeValue::Number(5.0)),
                Output::Value(RuntimeValue::Number(10.0)),
            ]
        );
    }

    #[test]
    fn undefined_names() {
        let (result, _) = run("y + 1");
        assert_eq!(result, Err(RuntimeError::UndefinedVariable("y".into())));
        let (result, _) = run("nosuch(1)");
        assert_eq!(result, Err(RuntimeError::UndefinedFunction("nosuch".into())));
    }

    #[test]
    fn strings_do_not_add() {
        let (result, _) = run("\"a\" + 1");
        assert!(matches!(result, Err(RuntimeError::TypeError(_))));
    }

    #[test]
    fn indexing() {
        assert_eq!(value("x <- c(10, 20, 30); x[2]"), RuntimeValue::Number(20.0));
        assert_eq!(value("x <- c(10, 20, 30); x[-1]"), RuntimeValue::from_numbers([20.0, 30.0]));
        assert_eq!(
            value("x <- c(10, 20, 30); x[x > 15]"),
            RuntimeValue::from_numbers([20.0, 30.0])
        );
        let (result, _) = run("c(1, 2)[5]");
        assert_eq!(result, Err(RuntimeError::SubscriptOutOfBounds));
    }

    #[test]
    fn table_columns() {
        assert_eq!(
            value("df <- data.frame(a = c(1, 2), b = c(\"x\", \"y\")); df$a"),
            RuntimeValue::from_numbers([1.0, 2.0])
        );
        assert_eq!(value("df <- data.frame(a = 1); df$nothing"), RuntimeValue::Null);
    }

    #[test]
    fn if_else_and_blocks() {
        assert_eq!(value("if (1 > 2) \"a\" else \"b\""), RuntimeValue::String("b".into()));
        assert_eq!(value("{ a <- 2; a * 3 }"), RuntimeValue::Number(6.0));
    }

    #[test]
    fn sequences() {
        assert_eq!(value("3:1"), RuntimeValue::from_numbers([3.0, 2.0, 1.0]));
        assert_eq!(value("-1:1"), RuntimeValue::from_numbers([-1.0, 0.0, 1.0]));
    }

    #[test]
    fn library_takes_a_bare_name() {
        let (result, outputs) = run("library(knitr)\nkable(data.frame(x = 1))");
        assert!(result.is_ok());
        assert_eq!(outputs.len(), 1);
        let (result, _) = run("library(notapackage)");
        assert_eq!(result, Err(RuntimeError::UnknownPackage("notapackage".into())));
    }

    #[test]
    fn namespaced_calls_do_not_attach() {
        let (result, _) = run("knitr::kable(data.frame(x = 1))\nkable(data.frame(x = 1))");
        assert_eq!(result, Err(RuntimeError::UndefinedFunction("kable".into())));
    }
}
