//! Fragment headers: `{r label, echo=FALSE, fig.cap="A plot"}` and `#| key: value` lines.

use crate::options::{FragmentOptions, OptionError, OptionValue, check_label};

/// The pieces of a fenced fragment header.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub engine: String,
    /// `(key, raw value)` pairs; positional entries have no key.
    pub entries: Vec<(Option<String>, String)>,
}

/// Returns `None` when the info string is not an executable header (no braces).
pub fn parse_header(info: &str) -> Option<Header> {
    let inner = info.trim().strip_prefix('{')?.strip_suffix('}')?.trim();
    let engine_end = inner
        .find(|c: char| c.is_whitespace() || c == ',')
        .unwrap_or(inner.len());
    let engine = inner[..engine_end].to_string();
    if engine.is_empty() {
        return None;
    }

    let entries = split_top_level(&inner[engine_end..])
        .into_iter()
        .filter(|item| !item.is_empty())
        .map(|item| match find_assignment(&item) {
            Some(pos) => (
                Some(item[..pos].trim().to_string()),
                item[pos + 1..].trim().to_string(),
            ),
            None => (None, item),
        })
        .collect();

    Some(Header { engine, entries })
}

/// Apply header entries to `options`. The first positional entry is the label.
pub fn apply_header(header: &Header, options: &mut FragmentOptions) -> Result<(), OptionError> {
    let mut positional_seen = false;
    for (key, raw) in &header.entries {
        match key {
            Some(key) => options.apply(key, OptionValue::from_r_literal(raw))?,
            None if !positional_seen => {
                positional_seen = true;
                options.label = Some(check_label(raw)?);
            }
            None => {
                return Err(OptionError {
                    key: raw.clone(),
                    reason: "only the first unnamed option may be a label".to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Split leading `#|` lines off a fragment body. Returns the YAML text of those
/// lines and the remaining code.
pub fn split_option_lines(code: &str) -> (String, String) {
    let mut yaml = String::new();
    let mut rest_start = 0;
    for line in code.split_inclusive('\n') {
        let trimmed = line.trim_start();
        match trimmed.strip_prefix("#|") {
            Some(option) => {
                yaml.push_str(option.strip_prefix(' ').unwrap_or(option));
                if !option.ends_with('\n') {
                    yaml.push('\n');
                }
                rest_start += line.len();
            }
            None => break,
        }
    }
    (yaml, code[rest_start..].to_string())
}

/// Apply `#|` option YAML to `options`.
pub fn apply_option_lines(yaml: &str, options: &mut FragmentOptions) -> Result<(), OptionError> {
    if yaml.trim().is_empty() {
        return Ok(());
    }
    let value: serde_yaml::Value = serde_yaml::from_str(yaml).map_err(|e| OptionError {
        key: "#|".to_string(),
        reason: format!("invalid option YAML: {}", e),
    })?;
    let serde_yaml::Value::Mapping(map) = value else {
        return Err(OptionError {
            key: "#|".to_string(),
            reason: "option lines must be `key: value` pairs".to_string(),
        });
    };
    for (key, value) in &map {
        let key = match key {
            serde_yaml::Value::String(s) => s.clone(),
            other => OptionValue::from_yaml(other).to_string(),
        };
        options.apply(&key, OptionValue::from_yaml(value))?;
    }
    Ok(())
}

/// Split on commas that are not inside quotes or parentheses.
fn split_top_level(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0u32;

    for c in text.chars() {
        match (quote, c) {
            (Some(q), _) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), _) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                current.push(c);
            }
            (None, '(') => {
                depth += 1;
                current.push(c);
            }
            (None, ')') => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            (None, ',') if depth == 0 => {
                items.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    items.push(current.trim().to_string());
    items
}

/// Position of the `=` separating key and value, ignoring quoted text.
fn find_assignment(item: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in item.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '=') => return Some(i),
            _ => {}
        }
    }
    None
}
