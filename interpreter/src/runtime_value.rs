use std::fmt;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::format::format_number;
use crate::print;
use crate::renderable::{Narrative, Renderable};

/// Longest vector a fragment may build.
pub const MAX_LENGTH: usize = 10_000_000;

/// Turn a computed element count into a length, refusing counts that are
/// not finite or exceed [`MAX_LENGTH`].
pub fn checked_length(count: f64) -> Result<usize, RuntimeError> {
    if count.is_finite() && (0.0..=MAX_LENGTH as f64).contains(&count) {
        Ok(count as usize)
    } else {
        Err(RuntimeError::VectorTooLong)
    }
}

/// A runtime value produced by evaluating an expression.
#[derive(Debug, Clone)]
pub enum RuntimeValue {
    Null,
    Number(f64),
    Boolean(bool),
    String(String),
    /// Two or more scalars of one type. Single elements are stored as scalars.
    Vector(Vec<RuntimeValue>),
    /// A data frame: named columns of equal length.
    Table(Table),
    /// A package-defined result kind.
    Object(Rc<dyn Renderable>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RuntimeValue>>,
}

impl Table {
    /// Build a table from named columns, recycling shorter columns.
    pub fn from_columns(columns: Vec<(String, RuntimeValue)>) -> Result<Table, RuntimeError> {
        let cells: Vec<Vec<RuntimeValue>> = columns.iter().map(|(_, v)| v.elements()).collect();
        let nrow = cells.iter().map(Vec::len).max().unwrap_or(0);
        for ((name, _), column) in columns.iter().zip(&cells) {
            if nrow > 0 && (column.is_empty() || nrow % column.len() != 0) {
                return Err(RuntimeError::invalid_argument(
                    "data.frame",
                    format!(
                        "column '{}' has {} rows, which does not divide {}",
                        name,
                        column.len(),
                        nrow
                    ),
                ));
            }
        }
        let rows = (0..nrow)
            .map(|r| cells.iter().map(|c| c[r % c.len()].clone()).collect())
            .collect();
        Ok(Table {
            headers: columns.into_iter().map(|(name, _)| name).collect(),
            rows,
        })
    }

    pub fn nrow(&self) -> usize {
        self.rows.len()
    }

    pub fn ncol(&self) -> usize {
        self.headers.len()
    }

    pub fn column_at(&self, index: usize) -> RuntimeValue {
        RuntimeValue::from_elements(
            self.rows
                .iter()
                .filter_map(|row| row.get(index).cloned())
                .collect(),
        )
    }

    pub fn column(&self, name: &str) -> Option<RuntimeValue> {
        let index = self.headers.iter().position(|h| h == name)?;
        Some(self.column_at(index))
    }

    pub fn head(&self, n: usize) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

impl RuntimeValue {
    /// Collapse a list of scalars: empty is NULL, one element is a scalar.
    pub fn from_elements(mut elements: Vec<RuntimeValue>) -> RuntimeValue {
        match elements.len() {
            0 => RuntimeValue::Null,
            1 => elements.remove(0),
            _ => RuntimeValue::Vector(elements),
        }
    }

    pub fn from_numbers(numbers: impl IntoIterator<Item = f64>) -> RuntimeValue {
        RuntimeValue::from_elements(numbers.into_iter().map(RuntimeValue::Number).collect())
    }

    pub fn from_strings(strings: impl IntoIterator<Item = String>) -> RuntimeValue {
        RuntimeValue::from_elements(strings.into_iter().map(RuntimeValue::String).collect())
    }

    /// The scalar elements of an atomic value.
    pub fn elements(&self) -> Vec<RuntimeValue> {
        match self {
            RuntimeValue::Null => Vec::new(),
            RuntimeValue::Vector(items) => items.clone(),
            other => vec![other.clone()],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RuntimeValue::Null => 0,
            RuntimeValue::Vector(items) => items.len(),
            RuntimeValue::Table(table) => table.ncol(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RuntimeValue::Null)
    }

    /// Class name as reported by `class()`.
    pub fn class(&self) -> String {
        match self {
            RuntimeValue::Null => "NULL".to_string(),
            RuntimeValue::Number(_) => "numeric".to_string(),
            RuntimeValue::Boolean(_) => "logical".to_string(),
            RuntimeValue::String(_) => "character".to_string(),
            RuntimeValue::Vector(items) => items
                .first()
                .map(|first| first.class())
                .unwrap_or_else(|| "NULL".to_string()),
            RuntimeValue::Table(_) => "data.frame".to_string(),
            RuntimeValue::Object(object) => object.type_name().to_string(),
        }
    }

    /// Numeric view of a scalar; logicals count as 0 and 1.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RuntimeValue::Number(n) => Some(*n),
            RuntimeValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Every element as a number, or a type error naming `function`.
    pub fn numbers(&self, function: &str) -> Result<Vec<f64>, RuntimeError> {
        self.elements()
            .iter()
            .map(|e| {
                e.as_number().ok_or_else(|| {
                    RuntimeError::invalid_argument(
                        function,
                        format!("expected a numeric argument, got {}", e.class()),
                    )
                })
            })
            .collect()
    }

    /// The value used as an `if` condition.
    pub fn condition(&self) -> Result<bool, RuntimeError> {
        match self.elements().first() {
            None => Err(RuntimeError::TypeError("argument is of length zero".to_string())),
            Some(RuntimeValue::Boolean(b)) => Ok(*b),
            Some(RuntimeValue::Number(n)) if !n.is_nan() => Ok(*n != 0.0),
            Some(other) => Err(RuntimeError::TypeError(format!(
                "argument is not interpretable as logical: {}",
                other.class()
            ))),
        }
    }

    /// The text of a scalar as `paste()` and `cat()` see it.
    pub fn scalar_text(&self) -> String {
        match self {
            RuntimeValue::Null => String::new(),
            RuntimeValue::Number(n) => format_number(*n),
            RuntimeValue::Boolean(true) => "TRUE".to_string(),
            RuntimeValue::Boolean(false) => "FALSE".to_string(),
            RuntimeValue::String(s) => s.clone(),
            other => other.to_inline(),
        }
    }
}

impl Renderable for RuntimeValue {
    fn type_name(&self) -> &str {
        match self {
            RuntimeValue::Null => "NULL",
            RuntimeValue::Number(_) => "numeric",
            RuntimeValue::Boolean(_) => "logical",
            RuntimeValue::String(_) => "character",
            RuntimeValue::Vector(_) => "vector",
            RuntimeValue::Table(_) => "data.frame",
            RuntimeValue::Object(object) => object.type_name(),
        }
    }

    fn to_narrative(&self) -> Narrative {
        match self {
            RuntimeValue::Table(table) => Narrative::Table {
                markdown: print::pipe_table(table, None),
                caption: None,
            },
            RuntimeValue::Object(object) => object.to_narrative(),
            other => Narrative::Markdown(other.to_inline()),
        }
    }

    fn to_literal(&self) -> String {
        match self {
            RuntimeValue::Object(object) => object.to_literal(),
            other => print::print_value(other),
        }
    }

    /// Vectors join with `", "`.
    fn to_inline(&self) -> String {
        match self {
            RuntimeValue::Vector(items) => items
                .iter()
                .map(RuntimeValue::scalar_text)
                .collect::<Vec<_>>()
                .join(", "),
            RuntimeValue::Table(table) => print::pipe_table(table, None),
            RuntimeValue::Object(object) => object.to_inline(),
            scalar => scalar.scalar_text(),
        }
    }

    fn is_asis(&self) -> bool {
        match self {
            RuntimeValue::Object(object) => object.is_asis(),
            _ => false,
        }
    }
}

impl fmt::Display for RuntimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_inline())
    }
}

impl PartialEq for RuntimeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RuntimeValue::Null, RuntimeValue::Null) => true,
            (RuntimeValue::Number(a), RuntimeValue::Number(b)) => a == b, // NaN != NaN per IEEE 754
            (RuntimeValue::Boolean(a), RuntimeValue::Boolean(b)) => a == b,
            (RuntimeValue::String(a), RuntimeValue::String(b)) => a == b,
            (RuntimeValue::Vector(a), RuntimeValue::Vector(b)) => a == b,
            (RuntimeValue::Table(a), RuntimeValue::Table(b)) => a == b,
            (RuntimeValue::Object(a), RuntimeValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}
