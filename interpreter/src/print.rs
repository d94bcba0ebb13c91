//! Console-style printing and pipe tables.

use crate::format::{decimals_of, format_number, format_with_decimals, round_to};
use crate::runtime_value::{RuntimeValue, Table};

const CONSOLE_WIDTH: usize = 80;

/// Print a value the way the interactive console would.
pub fn print_value(value: &RuntimeValue) -> String {
    match value {
        RuntimeValue::Null => "NULL".to_string(),
        RuntimeValue::Table(table) => print_table(table),
        RuntimeValue::Object(object) => object.to_literal(),
        atomic => print_vector(&atomic.elements()),
    }
}

/// `[1] 1.0 2.5 3.0`, wrapped at the console width with index labels.
fn print_vector(elements: &[RuntimeValue]) -> String {
    let cells = format_cells(elements, true);
    let strings = elements.iter().all(|e| matches!(e, RuntimeValue::String(_)));
    let cell_width = cells.iter().map(|c| c.chars().count()).max().unwrap_or(0);
    let label_width = format!("[{}]", cells.len()).len();
    let per_line = ((CONSOLE_WIDTH - label_width) / (cell_width + 1)).max(1);

    let mut lines = Vec::new();
    for (chunk_index, chunk) in cells.chunks(per_line).enumerate() {
        let label = format!("[{}]", chunk_index * per_line + 1);
        let mut line = format!("{:>width$}", label, width = label_width);
        for cell in chunk {
            line.push(' ');
            if strings {
                line.push_str(&format!("{:<width$}", cell, width = cell_width));
            } else {
                line.push_str(&format!("{:>width$}", cell, width = cell_width));
            }
        }
        lines.push(line.trim_end().to_string());
    }
    lines.join("\n")
}

/// A data frame with row numbers and right-aligned columns.
fn print_table(table: &Table) -> String {
    if table.ncol() == 0 {
        return format!("data frame with 0 columns and {} rows", table.nrow());
    }
    if table.nrow() == 0 {
        return format!(
            "[1] {}\n<0 rows> (or 0-length row.names)",
            table.headers.join(" ")
        );
    }

    let row_names: Vec<String> = (1..=table.nrow()).map(|n| n.to_string()).collect();
    let mut columns: Vec<Vec<String>> = vec![row_names];
    let mut headers = vec![String::new()];
    for (index, header) in table.headers.iter().enumerate() {
        let cells: Vec<RuntimeValue> = table.rows.iter().map(|row| row[index].clone()).collect();
        columns.push(format_cells(&cells, false));
        headers.push(header.clone());
    }

    let widths: Vec<usize> = columns
        .iter()
        .zip(&headers)
        .map(|(cells, header)| {
            cells
                .iter()
                .map(|c| c.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(table.nrow() + 1);
    let render_row = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, width))| {
                if i == 0 {
                    format!("{:<width$}", cell, width = *width)
                } else {
                    format!("{:>width$}", cell, width = *width)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    };
    lines.push(render_row(headers.iter().map(String::as_str).collect()));
    for r in 0..table.nrow() {
        lines.push(render_row(columns.iter().map(|c| c[r].as_str()).collect()));
    }
    lines.join("\n")
}

/// Markdown pipe table in the layout knitr's `kable()` produces: numeric
/// columns right-aligned, everything else left-aligned. `digits` rounds
/// numeric cells to that many decimal places.
pub fn pipe_table(table: &Table, digits: Option<usize>) -> String {
    let mut columns = Vec::with_capacity(table.ncol());
    let mut numeric = Vec::with_capacity(table.ncol());
    for index in 0..table.ncol() {
        let cells: Vec<RuntimeValue> = table
            .rows
            .iter()
            .map(|row| match (&row[index], digits) {
                (RuntimeValue::Number(n), Some(d)) => RuntimeValue::Number(round_to(*n, d as i32)),
                (cell, _) => cell.clone(),
            })
            .collect();
        numeric.push(
            !cells.is_empty() && cells.iter().all(|c| matches!(c, RuntimeValue::Number(_))),
        );
        columns.push(format_cells(&cells, false));
    }

    let widths: Vec<usize> = columns
        .iter()
        .zip(&table.headers)
        .map(|(cells, header)| {
            cells
                .iter()
                .map(|c| c.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render_row = |cells: Vec<&str>| {
        let mut line = String::from("|");
        for ((cell, width), right) in cells.iter().zip(&widths).zip(&numeric) {
            if *right {
                line.push_str(&format!(" {:>width$}|", cell, width = *width));
            } else {
                line.push_str(&format!("{:<width$} |", cell, width = *width));
            }
        }
        line
    };

    let mut lines = vec![render_row(table.headers.iter().map(String::as_str).collect())];
    let mut rule = String::from("|");
    for (width, right) in widths.iter().zip(&numeric) {
        if *right {
            rule.push_str(&format!("{}:|", "-".repeat(*width)));
        } else {
            rule.push_str(&format!(":{}|", "-".repeat(*width)));
        }
    }
    lines.push(rule);
    for r in 0..table.nrow() {
        lines.push(render_row(columns.iter().map(|c| c[r].as_str()).collect()));
    }
    lines.join("\n")
}

/// Format scalars for columnar display. Numbers share a common number of
/// decimals; strings are quoted when `quote` is set.
fn format_cells(elements: &[RuntimeValue], quote: bool) -> Vec<String> {
    let numbers: Option<Vec<f64>> = elements
        .iter()
        .map(|e| match e {
            RuntimeValue::Number(n) => Some(*n),
            _ => None,
        })
        .collect();

    if let Some(numbers) = numbers {
        let formatted: Vec<String> = numbers.iter().map(|n| format_number(*n)).collect();
        if formatted.iter().any(|f| f.contains('e')) {
            return formatted;
        }
        let decimals = formatted.iter().map(|f| decimals_of(f)).max().unwrap_or(0);
        return numbers
            .iter()
            .map(|n| format_with_decimals(*n, decimals))
            .collect();
    }

    elements
        .iter()
        .map(|e| match e {
            RuntimeValue::String(s) if quote => format!("{:?}", s),
            other => other.scalar_text(),
        })
        .collect()
}
