use crate::error::RuntimeError;
use crate::format::{
    NA, SIGNIFICANT_DIGITS, decimals_of, format_number, format_significant, format_with_decimals,
    round_to,
};
use crate::library::{Arguments, CallContext, Package};
use crate::result::Output;
use crate::runtime_value::{MAX_LENGTH, RuntimeValue, Table, checked_length};

pub fn package() -> Package {
    Package::new("base")
        .constant("pi", RuntimeValue::Number(std::f64::consts::PI))
        .constant("T", RuntimeValue::Boolean(true))
        .constant("F", RuntimeValue::Boolean(false))
        .constant("Inf", RuntimeValue::Number(f64::INFINITY))
        .constant("NaN", RuntimeValue::Number(f64::NAN))
        .constant("NA", RuntimeValue::Number(NA))
        .constant(
            "LETTERS",
            RuntimeValue::from_strings(('A'..='Z').map(|c| c.to_string())),
        )
        .constant(
            "letters",
            RuntimeValue::from_strings(('a'..='z').map(|c| c.to_string())),
        )
        // Vectors
        .function("c", combine)
        .function("length", length)
        .function("seq", seq)
        .function("seq_len", seq_len)
        .function("rep", rep)
        .function("rev", rev)
        .function("sort", sort)
        .function("ifelse", ifelse)
        // Arithmetic
        .function("sum", sum)
        .function("mean", mean)
        .function("min", |ctx, args| extreme(ctx, args, false))
        .function("max", |ctx, args| extreme(ctx, args, true))
        .function("round", round)
        .function("signif", signif)
        .function("abs", |ctx, args| math(ctx, args, f64::abs))
        .function("sqrt", |ctx, args| math(ctx, args, f64::sqrt))
        .function("exp", |ctx, args| math(ctx, args, f64::exp))
        .function("floor", |ctx, args| math(ctx, args, f64::floor))
        .function("ceiling", |ctx, args| math(ctx, args, f64::ceil))
        .function("log", log)
        // Text
        .function("paste", |_, args| paste(args, " "))
        .function("paste0", |_, args| paste(args, ""))
        .function("format", format)
        .function("sprintf", sprintf)
        .function("nchar", nchar)
        .function("toupper", |_, args| map_text(args, |s| s.to_uppercase()))
        .function("tolower", |_, args| map_text(args, |s| s.to_lowercase()))
        // Types
        .function("class", |_, args| {
            Ok(RuntimeValue::String(args.required("x", 0)?.class()))
        })
        .function("is.null", |_, args| {
            Ok(RuntimeValue::Boolean(args.required("x", 0)?.is_null()))
        })
        .function("is.na", |_, args| {
            let x = args.required("x", 0)?;
            Ok(RuntimeValue::from_elements(
                x.elements()
                    .iter()
                    .map(|e| matches!(e, RuntimeValue::Number(n) if n.is_nan()))
                    .map(RuntimeValue::Boolean)
                    .collect(),
            ))
        })
        .function("is.numeric", |_, args| {
            Ok(RuntimeValue::Boolean(args.required("x", 0)?.class() == "numeric"))
        })
        .function("is.character", |_, args| {
            Ok(RuntimeValue::Boolean(args.required("x", 0)?.class() == "character"))
        })
        .function("as.numeric", as_numeric)
        .function("as.character", |_, args| {
            let x = args.required("x", 0)?;
            Ok(RuntimeValue::from_strings(
                x.elements().iter().map(RuntimeValue::scalar_text),
            ))
        })
        .function("exists", |ctx, args| {
            let name = args.string("x", 0).ok_or_else(|| RuntimeError::missing("x"))?;
            Ok(RuntimeValue::Boolean(ctx.env.has_variable(&name)))
        })
        // Data frames
        .function("data.frame", data_frame)
        .function("nrow", |_, args| table_dimension(args, true))
        .function("ncol", |_, args| table_dimension(args, false))
        .function("names", names)
        .function("colnames", names)
        .function("head", head)
        // Output and conditions
        .invisible("print", print)
        .invisible("cat", cat)
        .invisible("message", message)
        .invisible("warning", warning)
        .function("stop", stop)
        .invisible("invisible", |_, args| {
            Ok(args.get("x", 0).cloned().unwrap_or(RuntimeValue::Null))
        })
        // Environment
        .invisible("library", library)
        .invisible("require", require)
        .invisible("set.seed", set_seed)
        .invisible("rm", rm)
}

// ---------------------------------------------------------------------------
// Vectors
// ---------------------------------------------------------------------------

/// `c(...)`: concatenate, coercing to the most general element type.
fn combine(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let mut elements = Vec::new();
    for (_, value) in args.entries() {
        if let RuntimeValue::Table(_) | RuntimeValue::Object(_) = value {
            return Err(RuntimeError::invalid_argument(
                "c",
                format!("cannot combine a {}", value.class()),
            ));
        }
        elements.extend(value.elements());
    }
    Ok(RuntimeValue::from_elements(coerce_common(elements)))
}

/// Coerce scalars to one type: character over numeric over logical.
pub(crate) fn coerce_common(elements: Vec<RuntimeValue>) -> Vec<RuntimeValue> {
    if elements.iter().any(|e| matches!(e, RuntimeValue::String(_))) {
        elements
            .iter()
            .map(|e| RuntimeValue::String(e.scalar_text()))
            .collect()
    } else if elements.iter().any(|e| matches!(e, RuntimeValue::Number(_))) {
        elements
            .iter()
            .map(|e| RuntimeValue::Number(e.as_number().unwrap_or(f64::NAN)))
            .collect()
    } else {
        elements
    }
}

fn length(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    Ok(RuntimeValue::Number(args.required("x", 0)?.len() as f64))
}

fn seq(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    // seq(n) is 1:n
    if args.entries().len() == 1 && args.positional().count() == 1 {
        return seq_len(ctx, args);
    }
    let from = args.number_or("from", 0, 1.0)?;
    let to = args.number("to", 1)?;
    let by = args.number("by", 2)?;
    let length_out = args.number("length.out", 3)?;

    let to = match (to, length_out, by) {
        (Some(to), _, _) => to,
        (None, Some(n), step) => from + (n - 1.0) * step.unwrap_or(1.0),
        (None, None, _) => from,
    };

    if let Some(n) = length_out {
        if n < 1.0 {
            return Ok(RuntimeValue::Null);
        }
        if n == 1.0 {
            return Ok(RuntimeValue::Number(from));
        }
        let count = checked_length(n.ceil())?;
        let step = (to - from) / (n - 1.0);
        return Ok(RuntimeValue::from_numbers(
            (0..count).map(|i| from + step * i as f64),
        ));
    }

    let by = by.unwrap_or(if to >= from { 1.0 } else { -1.0 });
    if by == 0.0 || (to - from) * by < 0.0 {
        return Err(RuntimeError::invalid_argument("seq", "wrong sign in 'by' argument"));
    }
    let count = checked_length(((to - from) / by + 1e-10).floor() + 1.0)?;
    Ok(RuntimeValue::from_numbers(
        (0..count).map(|i| from + by * i as f64),
    ))
}

fn seq_len(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let n = args.number_or("length.out", 0, 0.0)?;
    if n < 0.0 {
        return Err(RuntimeError::invalid_argument(
            "seq_len",
            "argument must be non-negative",
        ));
    }
    let n = checked_length(n.floor())?;
    Ok(RuntimeValue::from_numbers((1..=n).map(|i| i as f64)))
}

fn rep(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let x = args.required("x", 0)?.elements();
    let times = args.number_or("times", 1, 1.0)?.max(0.0).floor();
    let each = args.number_or("each", 2, 1.0)?.max(0.0).floor();
    checked_length(x.len() as f64 * each * times)?;
    let (times, each) = (checked_length(times)?, checked_length(each)?);
    let expanded: Vec<RuntimeValue> = x
        .iter()
        .flat_map(|e| std::iter::repeat_n(e.clone(), each))
        .collect();
    let mut result = Vec::with_capacity(expanded.len() * times);
    for _ in 0..times {
        result.extend(expanded.iter().cloned());
    }
    Ok(RuntimeValue::from_elements(result))
}

fn rev(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let mut elements = args.required("x", 0)?.elements();
    elements.reverse();
    Ok(RuntimeValue::from_elements(elements))
}

fn sort(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let mut elements = args.required("x", 0)?.elements();
    let decreasing = args.flag("decreasing", 1, false)?;
    elements.sort_by(|a, b| match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => a.scalar_text().cmp(&b.scalar_text()),
    });
    if decreasing {
        elements.reverse();
    }
    Ok(RuntimeValue::from_elements(elements))
}

fn ifelse(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let test = args.required("test", 0)?.elements();
    let yes = args.required("yes", 1)?.elements();
    let no = args.required("no", 2)?.elements();
    if yes.is_empty() || no.is_empty() {
        return Err(RuntimeError::invalid_argument("ifelse", "'yes' and 'no' must not be empty"));
    }
    let picked = test
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let chosen = if t.condition()? { &yes[i % yes.len()] } else { &no[i % no.len()] };
            Ok(chosen.clone())
        })
        .collect::<Result<Vec<_>, RuntimeError>>()?;
    Ok(RuntimeValue::from_elements(coerce_common(picked)))
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

/// Every unnamed argument flattened to numbers.
fn all_numbers(args: &Arguments) -> Result<Vec<f64>, RuntimeError> {
    let mut numbers = Vec::new();
    for value in args.positional() {
        numbers.extend(value.numbers(&args.function)?);
    }
    Ok(numbers)
}

fn sum(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    Ok(RuntimeValue::Number(all_numbers(args)?.iter().sum()))
}

fn mean(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let x = args.required("x", 0)?;
    let Ok(numbers) = x.numbers("mean") else {
        ctx.capture
            .warning("argument is not numeric or logical: returning NaN");
        return Ok(RuntimeValue::Number(f64::NAN));
    };
    Ok(RuntimeValue::Number(
        numbers.iter().sum::<f64>() / numbers.len() as f64,
    ))
}

fn extreme(
    ctx: &mut CallContext<'_>,
    args: &Arguments,
    maximum: bool,
) -> Result<RuntimeValue, RuntimeError> {
    let numbers = all_numbers(args)?;
    if numbers.is_empty() {
        let (name, fallback) = if maximum {
            ("max", f64::NEG_INFINITY)
        } else {
            ("min", f64::INFINITY)
        };
        ctx.capture.warning(format!(
            "no non-missing arguments to {}; returning {}",
            name,
            format_number(fallback)
        ));
        return Ok(RuntimeValue::Number(fallback));
    }
    let fold = if maximum { f64::max } else { f64::min };
    let init = if maximum { f64::NEG_INFINITY } else { f64::INFINITY };
    Ok(RuntimeValue::Number(numbers.into_iter().fold(init, fold)))
}

fn round(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let x = args.required("x", 0)?.numbers("round")?;
    let digits = args.number_or("digits", 1, 0.0)? as i32;
    Ok(RuntimeValue::from_numbers(x.into_iter().map(|n| round_to(n, digits))))
}

fn signif(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let x = args.required("x", 0)?.numbers("signif")?;
    let digits = args.number_or("digits", 1, 6.0)?.max(1.0) as i32;
    Ok(RuntimeValue::from_numbers(x.into_iter().map(|n| {
        if n == 0.0 || !n.is_finite() {
            return n;
        }
        let magnitude = n.abs().log10().floor() as i32;
        round_to(n, digits - 1 - magnitude)
    })))
}

fn math(
    ctx: &mut CallContext<'_>,
    args: &Arguments,
    f: fn(f64) -> f64,
) -> Result<RuntimeValue, RuntimeError> {
    let x = args.required("x", 0)?.numbers(&args.function)?;
    let results: Vec<f64> = x.iter().map(|n| f(*n)).collect();
    if results.iter().zip(&x).any(|(r, n)| r.is_nan() && !n.is_nan()) {
        ctx.capture.warning("NaNs produced");
    }
    Ok(RuntimeValue::from_numbers(results))
}

fn log(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let x = args.required("x", 0)?.numbers("log")?;
    let base = args.number("base", 1)?;
    let results: Vec<f64> = x
        .iter()
        .map(|n| match base {
            Some(b) => n.ln() / b.ln(),
            None => n.ln(),
        })
        .collect();
    if results.iter().any(|r| r.is_nan()) {
        ctx.capture.warning("NaNs produced");
    }
    Ok(RuntimeValue::from_numbers(results))
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// `paste()` and `paste0()`: element-wise concatenation with recycling.
fn paste(args: &Arguments, default_sep: &str) -> Result<RuntimeValue, RuntimeError> {
    let sep = args
        .named("sep")
        .map(RuntimeValue::scalar_text)
        .unwrap_or_else(|| default_sep.to_string());
    let collapse = args.named("collapse").map(RuntimeValue::scalar_text);

    let columns: Vec<Vec<String>> = args
        .positional()
        .map(|v| v.elements().iter().map(RuntimeValue::scalar_text).collect::<Vec<_>>())
        .filter(|c| !c.is_empty())
        .collect();
    let n = columns.iter().map(Vec::len).max().unwrap_or(0);
    let pasted: Vec<String> = (0..n)
        .map(|i| {
            columns
                .iter()
                .map(|c| c[i % c.len()].as_str())
                .collect::<Vec<_>>()
                .join(&sep)
        })
        .collect();

    match collapse {
        Some(collapse) => Ok(RuntimeValue::String(pasted.join(&collapse))),
        None if pasted.is_empty() => Ok(RuntimeValue::String(String::new())),
        None => Ok(RuntimeValue::from_strings(pasted)),
    }
}

/// `format(x, nsmall = 0, digits = 7, big.mark = "")`
fn format(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let x = args.required("x", 0)?;
    let nsmall = args
        .named("nsmall")
        .and_then(RuntimeValue::as_number)
        .unwrap_or(0.0);
    if !(0.0..=20.0).contains(&nsmall) {
        return Err(RuntimeError::invalid_argument(
            "format",
            "'nsmall' must be between 0 and 20",
        ));
    }
    let digits = match args.named("digits").and_then(RuntimeValue::as_number) {
        Some(d) if !(1.0..=22.0).contains(&d) => {
            return Err(RuntimeError::invalid_argument(
                "format",
                "'digits' must be between 1 and 22",
            ));
        }
        Some(d) => d as usize,
        None => SIGNIFICANT_DIGITS,
    };
    let nsmall = nsmall as usize;
    let big_mark = args.named("big.mark").map(RuntimeValue::scalar_text);

    let elements = x.elements();
    let formatted = elements.iter().map(|e| match e {
        RuntimeValue::Number(n) => {
            let mut text = format_significant(*n, digits);
            if nsmall > 0 && n.is_finite() && !text.contains('e') {
                let shown: f64 = text.parse().unwrap_or(*n);
                text = format_with_decimals(shown, decimals_of(&text).max(nsmall));
            }
            match &big_mark {
                Some(mark) if !mark.is_empty() => group_thousands(&text, mark),
                _ => text,
            }
        }
        other => other.scalar_text(),
    });
    Ok(RuntimeValue::from_strings(formatted))
}

/// Insert `mark` between groups of three integer digits.
pub(crate) fn group_thousands(text: &str, mark: &str) -> String {
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    let (integer, fraction) = match unsigned.find('.') {
        Some(dot) => unsigned.split_at(dot),
        None => (unsigned, ""),
    };
    let digits: Vec<char> = integer.chars().collect();
    let mut grouped = String::new();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push_str(mark);
        }
        grouped.push(*c);
    }
    format!("{}{}{}", sign, grouped, fraction)
}

/// `sprintf(fmt, ...)` with `%d`, `%i`, `%f`, `%e`, `%g`, `%s` and `%%`,
/// including width, precision and the `-`, `+`, `0` flags. Vectorized over
/// its arguments.
fn sprintf(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let format = args.required("fmt", 0)?.scalar_text();
    let values: Vec<Vec<RuntimeValue>> = args.positional().skip(1).map(|v| v.elements()).collect();
    if values.iter().any(Vec::is_empty) {
        return Ok(RuntimeValue::Null);
    }
    let n = values.iter().map(Vec::len).max().unwrap_or(1);
    let results = (0..n)
        .map(|i| {
            let row: Vec<&RuntimeValue> = values.iter().map(|v| &v[i % v.len()]).collect();
            sprintf_one(&format, &row)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RuntimeValue::from_strings(results))
}

fn sprintf_one(format: &str, values: &[&RuntimeValue]) -> Result<String, RuntimeError> {
    let invalid = |message: String| RuntimeError::invalid_argument("sprintf", message);
    let mut out = String::new();
    let mut chars = format.chars().peekable();
    let mut next_value = 0;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut flags = String::new();
        while let Some(&f) = chars.peek() {
            if matches!(f, '-' | '+' | '0' | ' ') {
                flags.push(f);
                chars.next();
            } else {
                break;
            }
        }
        let mut width = String::new();
        while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            width.push(d);
            chars.next();
        }
        let mut precision: Option<usize> = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut p = String::new();
            while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                p.push(d);
                chars.next();
            }
            precision = Some(p.parse().unwrap_or(0));
        }
        let conversion = chars
            .next()
            .ok_or_else(|| invalid("unterminated format specification".to_string()))?;

        let value = values
            .get(next_value)
            .ok_or_else(|| invalid("too few arguments".to_string()))?;
        next_value += 1;

        let number = || {
            value.as_number().ok_or_else(|| {
                invalid(format!(
                    "invalid format '%{}'; use format %s for character objects",
                    conversion
                ))
            })
        };
        let mut body = match conversion {
            'd' | 'i' => {
                let n = number()?;
                if n.fract() != 0.0 {
                    return Err(invalid(format!(
                        "invalid format '%{}'; use format %f, %e or %g for numeric objects",
                        conversion
                    )));
                }
                format!("{}", n as i64)
            }
            'f' => format!("{:.*}", precision.unwrap_or(6), number()?),
            'e' => {
                let raw = format!("{:.*e}", precision.unwrap_or(6), number()?);
                match raw.split_once('e') {
                    Some((mantissa, exponent)) => {
                        let exponent: i32 = exponent.parse().unwrap_or(0);
                        format!(
                            "{}e{}{:02}",
                            mantissa,
                            if exponent < 0 { '-' } else { '+' },
                            exponent.abs()
                        )
                    }
                    None => raw,
                }
            }
            'g' => format_significant(number()?, precision.unwrap_or(6)),
            's' => {
                let text = value.scalar_text();
                match precision {
                    Some(p) => text.chars().take(p).collect(),
                    None => text,
                }
            }
            other => return Err(invalid(format!("unrecognised format specification '%{}'", other))),
        };

        if flags.contains('+') && conversion != 's' && !body.starts_with('-') {
            body.insert(0, '+');
        }
        let width: usize = width.parse().unwrap_or(0);
        let len = body.chars().count();
        if len < width {
            let pad = width - len;
            if flags.contains('-') {
                body.push_str(&" ".repeat(pad));
            } else if flags.contains('0') && conversion != 's' {
                let sign_len = usize::from(body.starts_with(['-', '+']));
                body.insert_str(sign_len, &"0".repeat(pad));
            } else {
                body.insert_str(0, &" ".repeat(pad));
            }
        }
        out.push_str(&body);
    }
    Ok(out)
}

fn nchar(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let x = args.required("x", 0)?;
    Ok(RuntimeValue::from_numbers(
        x.elements().iter().map(|e| e.scalar_text().chars().count() as f64),
    ))
}

fn map_text(args: &Arguments, f: impl Fn(&str) -> String) -> Result<RuntimeValue, RuntimeError> {
    let x = args.required("x", 0)?;
    Ok(RuntimeValue::from_strings(
        x.elements().iter().map(|e| f(&e.scalar_text())),
    ))
}

fn as_numeric(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let x = args.required("x", 0)?;
    let mut coerced = false;
    let numbers: Vec<f64> = x
        .elements()
        .iter()
        .map(|e| match e {
            RuntimeValue::String(s) if s.trim() == "NA" => NA,
            RuntimeValue::String(s) => s.trim().parse::<f64>().unwrap_or_else(|_| {
                coerced = true;
                NA
            }),
            other => other.as_number().unwrap_or(NA),
        })
        .collect();
    if coerced {
        ctx.capture.warning("NAs introduced by coercion");
    }
    Ok(RuntimeValue::from_numbers(numbers))
}

// ---------------------------------------------------------------------------
// Data frames
// ---------------------------------------------------------------------------

fn data_frame(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let columns = args
        .entries()
        .iter()
        .enumerate()
        .map(|(i, (name, value))| {
            let name = name.clone().unwrap_or_else(|| format!("V{}", i + 1));
            (name, value.clone())
        })
        .collect();
    Ok(RuntimeValue::Table(Table::from_columns(columns)?))
}

fn expect_table<'a>(args: &'a Arguments, function: &str) -> Result<&'a Table, RuntimeError> {
    match args.required("x", 0)? {
        RuntimeValue::Table(table) => Ok(table),
        other => Err(RuntimeError::invalid_argument(
            function,
            format!("expected a data frame, got {}", other.class()),
        )),
    }
}

fn table_dimension(args: &Arguments, rows: bool) -> Result<RuntimeValue, RuntimeError> {
    let table = expect_table(args, &args.function)?;
    let n = if rows { table.nrow() } else { table.ncol() };
    Ok(RuntimeValue::Number(n as f64))
}

fn names(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    match args.required("x", 0)? {
        RuntimeValue::Table(table) => Ok(RuntimeValue::from_strings(table.headers.clone())),
        _ => Ok(RuntimeValue::Null),
    }
}

fn head(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let n = args.number_or("n", 1, 6.0)?.max(0.0).min(MAX_LENGTH as f64) as usize;
    match args.required("x", 0)? {
        RuntimeValue::Table(table) => Ok(RuntimeValue::Table(table.head(n))),
        other => Ok(RuntimeValue::from_elements(
            other.elements().into_iter().take(n).collect(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Output and conditions
// ---------------------------------------------------------------------------

fn print(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let x = args.get("x", 0).cloned().unwrap_or(RuntimeValue::Null);
    ctx.capture.push(Output::Value(x.clone()));
    Ok(x)
}

fn cat(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let sep = args
        .named("sep")
        .map(RuntimeValue::scalar_text)
        .unwrap_or_else(|| " ".to_string());
    let pieces: Vec<String> = args
        .positional()
        .flat_map(|v| v.elements())
        .map(|e| e.scalar_text())
        .collect();
    ctx.capture.push(Output::Text(pieces.join(&sep)));
    Ok(RuntimeValue::Null)
}

/// Positional arguments pasted together with no separator.
fn condition_text(args: &Arguments) -> String {
    args.positional()
        .flat_map(|v| v.elements())
        .map(|e| e.scalar_text())
        .collect()
}

fn message(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    ctx.capture.message(condition_text(args));
    Ok(RuntimeValue::Null)
}

fn warning(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let text = condition_text(args);
    ctx.capture.warning(text.clone());
    Ok(RuntimeValue::String(text))
}

fn stop(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    Err(RuntimeError::Stop(condition_text(args)))
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

fn attach(ctx: &mut CallContext<'_>, name: &str) -> bool {
    let Some(package) = ctx.library.package(name) else {
        return false;
    };
    if ctx.env.attach(name) {
        tracing::debug!(package = name, "attached package");
        if let Some(startup) = &package.startup_message {
            ctx.capture.message(startup.clone());
        }
    }
    true
}

fn library(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let name = args.string("package", 0).ok_or_else(|| RuntimeError::missing("package"))?;
    if !attach(ctx, &name) {
        return Err(RuntimeError::UnknownPackage(name));
    }
    Ok(RuntimeValue::from_strings(ctx.env.search_path().to_vec()))
}

fn require(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let name = args.string("package", 0).ok_or_else(|| RuntimeError::missing("package"))?;
    let found = attach(ctx, &name);
    if !found {
        ctx.capture
            .warning(format!("there is no package called '{}'", name));
    }
    Ok(RuntimeValue::Boolean(found))
}

fn set_seed(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let seed = args
        .number("seed", 0)?
        .ok_or_else(|| RuntimeError::missing("seed"))?;
    ctx.env.set_seed(seed as i64 as u64);
    Ok(RuntimeValue::Null)
}

fn rm(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    for value in args.positional() {
        for name in value.elements() {
            let name = name.scalar_text();
            if ctx.env.remove_variable(&name).is_none() {
                ctx.capture.warning(format!("object '{}' not found", name));
            }
        }
    }
    Ok(RuntimeValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: &str, values: &[RuntimeValue]) -> String {
        sprintf_one(format, &values.iter().collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn sprintf_conversions() {
        assert_eq!(fmt("%.2f", &[RuntimeValue::Number(3.14159)]), "3.14");
        assert_eq!(fmt("%d items", &[RuntimeValue::Number(3.0)]), "3 items");
        assert_eq!(fmt("%5.1f|", &[RuntimeValue::Number(2.26)]), "  2.3|");
        assert_eq!(fmt("%-4s|", &[RuntimeValue::String("ab".into())]), "ab  |");
        assert_eq!(fmt("%03d", &[RuntimeValue::Number(7.0)]), "007");
        assert_eq!(fmt("%+.1f", &[RuntimeValue::Number(1.0)]), "+1.0");
        assert_eq!(fmt("100%%", &[]), "100%");
        assert_eq!(fmt("%.2e", &[RuntimeValue::Number(12345.0)]), "1.23e+04");
    }

    #[test]
    fn sprintf_rejects_fractional_integers() {
        let err = sprintf_one("%d", &[&RuntimeValue::Number(1.5)]);
        assert!(err.is_err());
    }

    #[test]
    fn thousands() {
        assert_eq!(group_thousands("1234567.5", ","), "1,234,567.5");
        assert_eq!(group_thousands("-999", ","), "-999");
        assert_eq!(group_thousands("-1000", ","), "-1,000");
    }

    #[test]
    fn coercion() {
        let mixed = coerce_common(vec![
            RuntimeValue::Number(1.0),
            RuntimeValue::String("a".into()),
        ]);
        assert_eq!(mixed, vec![RuntimeValue::String("1".into()), RuntimeValue::String("a".into())]);
        let logical = coerce_common(vec![RuntimeValue::Boolean(true), RuntimeValue::Number(2.0)]);
        assert_eq!(logical, vec![RuntimeValue::Number(1.0), RuntimeValue::Number(2.0)]);
    }
}
