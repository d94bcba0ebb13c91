use rand::Rng;

use crate::error::RuntimeError;
use crate::format::{decimals_of, format_significant, format_with_decimals, round_to};
use crate::library::{Arguments, CallContext, Package};
use crate::print::pipe_table;
use crate::renderable::{Narrative, Renderable};
use crate::runtime_value::{RuntimeValue, Table, checked_length};

pub fn package() -> Package {
    Package::new("stats")
        .function("median", median)
        .function("var", |_, args| Ok(RuntimeValue::Number(variance(&numbers(args, "var")?))))
        .function("sd", |_, args| {
            Ok(RuntimeValue::Number(variance(&numbers(args, "sd")?).sqrt()))
        })
        .function("quantile", quantile)
        .function("cor", cor)
        .function("summary", summary)
        .function("rnorm", rnorm)
        .function("runif", runif)
}

fn numbers(args: &Arguments, function: &str) -> Result<Vec<f64>, RuntimeError> {
    args.required("x", 0)?.numbers(function)
}

fn sorted(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(f64::total_cmp);
    values
}

/// Type 7 sample quantile of sorted data.
fn quantile_of(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

fn mean_of(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator).
fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let mean = mean_of(values);
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

fn median(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let values = sorted(numbers(args, "median")?);
    Ok(RuntimeValue::Number(quantile_of(&values, 0.5)))
}

fn quantile(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let values = sorted(numbers(args, "quantile")?);
    let probs = match args.get("probs", 1) {
        Some(p) => p.numbers("quantile")?,
        None => vec![0.0, 0.25, 0.5, 0.75, 1.0],
    };
    if probs.iter().any(|p| !(0.0..=1.0).contains(p)) {
        return Err(RuntimeError::invalid_argument("quantile", "'probs' outside [0,1]"));
    }
    Ok(RuntimeValue::from_numbers(
        probs.iter().map(|p| quantile_of(&values, *p)),
    ))
}

/// Pearson correlation.
fn cor(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let x = numbers(args, "cor")?;
    let y = args.required("y", 1)?.numbers("cor")?;
    if x.len() != y.len() {
        return Err(RuntimeError::invalid_argument("cor", "incompatible dimensions"));
    }
    let (mx, my) = (mean_of(&x), mean_of(&y));
    let covariance: f64 = x.iter().zip(&y).map(|(a, b)| (a - mx) * (b - my)).sum();
    let sx: f64 = x.iter().map(|a| (a - mx).powi(2)).sum::<f64>().sqrt();
    let sy: f64 = y.iter().map(|b| (b - my).powi(2)).sum::<f64>().sqrt();
    Ok(RuntimeValue::Number(covariance / (sx * sy)))
}

fn summary(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let values = sorted(numbers(args, "summary")?);
    if values.is_empty() {
        return Err(RuntimeError::invalid_argument("summary", "no values to summarise"));
    }
    let statistics = vec![
        ("Min.", values[0]),
        ("1st Qu.", quantile_of(&values, 0.25)),
        ("Median", quantile_of(&values, 0.5)),
        ("Mean", mean_of(&values)),
        ("3rd Qu.", quantile_of(&values, 0.75)),
        ("Max.", values[values.len() - 1]),
    ];
    Ok(RuntimeValue::Object(std::rc::Rc::new(Summary { statistics })))
}

fn rnorm(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let n = checked_length(args.number_or("n", 0, 1.0)?.max(0.0).floor())?;
    let mean = args.number_or("mean", 1, 0.0)?;
    let sd = args.number_or("sd", 2, 1.0)?;
    let rng = ctx.env.rng();
    // Box-Muller
    let draws = (0..n).map(|_| {
        let u1: f64 = 1.0 - rng.r#gen::<f64>();
        let u2: f64 = rng.r#gen::<f64>();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + sd * z
    });
    Ok(RuntimeValue::from_numbers(draws.collect::<Vec<_>>()))
}

fn runif(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let n = checked_length(args.number_or("n", 0, 1.0)?.max(0.0).floor())?;
    let min = args.number_or("min", 1, 0.0)?;
    let max = args.number_or("max", 2, 1.0)?;
    let rng = ctx.env.rng();
    let draws: Vec<f64> = (0..n).map(|_| min + (max - min) * rng.r#gen::<f64>()).collect();
    Ok(RuntimeValue::from_numbers(draws))
}

/// Six-number summary of a numeric vector.
#[derive(Debug)]
pub struct Summary {
    statistics: Vec<(&'static str, f64)>,
}

impl Summary {
    /// Values to four significant digits with a common number of decimals.
    fn cells(&self) -> Vec<String> {
        let rounded: Vec<f64> = self
            .statistics
            .iter()
            .map(|(_, v)| {
                if *v == 0.0 || !v.is_finite() {
                    *v
                } else {
                    round_to(*v, 3 - v.abs().log10().floor() as i32)
                }
            })
            .collect();
        let decimals = rounded
            .iter()
            .map(|v| decimals_of(&format_significant(*v, 4)))
            .max()
            .unwrap_or(0);
        rounded
            .iter()
            .map(|v| format_with_decimals(*v, decimals))
            .collect()
    }
}

impl Renderable for Summary {
    fn type_name(&self) -> &str {
        "summaryDefault"
    }

    fn to_narrative(&self) -> Narrative {
        let table = Table {
            headers: self.statistics.iter().map(|(name, _)| name.to_string()).collect(),
            rows: vec![self.cells().into_iter().map(RuntimeValue::String).collect()],
        };
        Narrative::Table {
            markdown: pipe_table(&table, None),
            caption: None,
        }
    }

    fn to_literal(&self) -> String {
        let cells = self.cells();
        let mut names = Vec::new();
        let mut values = Vec::new();
        for ((name, _), cell) in self.statistics.iter().zip(&cells) {
            let width = name.len().max(cell.len());
            names.push(format!("{:>width$}", name));
            values.push(format!("{:>width$}", cell));
        }
        format!("{}\n{}", names.join(" "), values.join(" "))
    }

    fn to_inline(&self) -> String {
        self.cells().join(", ")
    }
}
