pub mod header;

use std::collections::BTreeMap;
use std::fmt;

/// How a fragment's result is embedded in the narrative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultHandling {
    /// The result's narrative representation is embedded directly (tables, figures).
    Asis,
    /// The result is embedded as a literal value.
    #[default]
    Literal,
    /// The result is evaluated for its side effects only.
    Hidden,
}

impl ResultHandling {
    pub fn parse(value: &str) -> Option<ResultHandling> {
        match value {
            "asis" => Some(ResultHandling::Asis),
            "literal" | "markup" | "hold" => Some(ResultHandling::Literal),
            "hidden" | "hide" | "false" | "FALSE" => Some(ResultHandling::Hidden),
            _ => None,
        }
    }
}

/// Rendered figure dimensions, in inches.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FigureSize {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

/// A raw option value as written in a fragment header or `#|` line.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl OptionValue {
    /// Interpret an R-style literal: `TRUE`, `F`, `3.5`, `"text"`, `'text'`, or a bare word.
    pub fn from_r_literal(raw: &str) -> OptionValue {
        let raw = raw.trim();
        match raw {
            "TRUE" | "T" | "true" => return OptionValue::Bool(true),
            "FALSE" | "F" | "false" => return OptionValue::Bool(false),
            _ => {}
        }
        if let Ok(n) = raw.parse::<f64>() {
            return OptionValue::Number(n);
        }
        let unquoted = raw
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
        OptionValue::String(unquoted.unwrap_or(raw).to_string())
    }

    pub fn from_yaml(value: &serde_yaml::Value) -> OptionValue {
        match value {
            serde_yaml::Value::Bool(b) => OptionValue::Bool(*b),
            serde_yaml::Value::Number(n) => match n.as_f64() {
                Some(f) => OptionValue::Number(f),
                None => OptionValue::String(n.to_string()),
            },
            serde_yaml::Value::String(s) => OptionValue::String(s.clone()),
            other => OptionValue::String(
                serde_yaml::to_string(other)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default(),
            ),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "a logical",
            OptionValue::Number(_) => "a number",
            OptionValue::String(_) => "a string",
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(true) => write!(f, "TRUE"),
            OptionValue::Bool(false) => write!(f, "FALSE"),
            OptionValue::Number(n) => write!(f, "{}", n),
            OptionValue::String(s) => write!(f, "{}", s),
        }
    }
}

/// Per-fragment settings controlling evaluation and rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentOptions {
    pub label: Option<String>,
    /// Whether the source code is shown.
    pub display: bool,
    pub size: FigureSize,
    pub suppress_warnings: bool,
    pub suppress_messages: bool,
    /// Parsed and recorded; results are never reused across runs.
    pub cache: bool,
    pub result_handling: ResultHandling,
    pub evaluate: bool,
    /// Continue on failure, embedding the error as the fragment's result.
    pub error: bool,
    pub caption: Option<String>,
    /// Options with no meaning to the compiler, kept verbatim.
    pub unrecognized: BTreeMap<String, String>,
}

impl Default for FragmentOptions {
    fn default() -> Self {
        FragmentOptions {
            label: None,
            display: true,
            size: FigureSize::default(),
            suppress_warnings: false,
            suppress_messages: false,
            cache: false,
            result_handling: ResultHandling::Literal,
            evaluate: true,
            error: false,
            caption: None,
            unrecognized: BTreeMap::new(),
        }
    }
}

/// Why an option could not be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionError {
    pub key: String,
    pub reason: String,
}

/// Labels name figure files, so they may not leave the figure directory.
pub fn check_label(label: &str) -> Result<String, OptionError> {
    if label.is_empty() || label.contains(['/', '\\']) || label.contains("..") {
        return Err(OptionError {
            key: "label".to_string(),
            reason: format!(
                "'{}' cannot name a figure file; avoid path separators and '..'",
                label
            ),
        });
    }
    Ok(label.to_string())
}

impl FragmentOptions {
    /// Apply a single option. Keys are matched case-insensitively with `-` and `_`
    /// ignored, so `suppressWarnings`, `suppress-warnings` and `suppress_warnings`
    /// are the same option. knitr spellings (`echo`, `eval`, `results`, `fig.cap`,
    /// ...) are accepted as aliases.
    pub fn apply(&mut self, key: &str, value: OptionValue) -> Result<(), OptionError> {
        let normalized: String = key
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        let invalid = |expected: &str, value: &OptionValue| OptionError {
            key: key.to_string(),
            reason: format!("expected {}, got {} ({})", expected, value.type_name(), value),
        };
        let as_bool = |value: &OptionValue| match value {
            OptionValue::Bool(b) => Ok(*b),
            other => Err(invalid("a logical", other)),
        };
        let as_number = |value: &OptionValue| match value {
            OptionValue::Number(n) if *n > 0.0 => Ok(*n),
            other => Err(invalid("a positive number", other)),
        };

        match normalized.as_str() {
            "label" => self.label = Some(check_label(&value.to_string())?),
            "display" | "echo" => self.display = as_bool(&value)?,
            "evaluate" | "eval" => self.evaluate = as_bool(&value)?,
            "cache" => self.cache = as_bool(&value)?,
            "error" => self.error = as_bool(&value)?,
            "suppresswarnings" => self.suppress_warnings = as_bool(&value)?,
            "suppressmessages" => self.suppress_messages = as_bool(&value)?,
            "warning" | "warnings" => self.suppress_warnings = !as_bool(&value)?,
            "message" | "messages" => self.suppress_messages = !as_bool(&value)?,
            "include" => {
                if !as_bool(&value)? {
                    self.display = false;
                    self.result_handling = ResultHandling::Hidden;
                }
            }
            "resulthandling" | "results" | "output" => {
                let handling = match &value {
                    OptionValue::Bool(false) => Some(ResultHandling::Hidden),
                    OptionValue::Bool(true) => Some(ResultHandling::Literal),
                    OptionValue::String(s) => ResultHandling::parse(s),
                    OptionValue::Number(_) => None,
                };
                self.result_handling = handling.ok_or_else(|| OptionError {
                    key: key.to_string(),
                    reason: format!("expected one of asis, literal, hidden; got {}", value),
                })?;
            }
            "size.width" | "fig.width" | "figwidth" | "width" => {
                self.size.width = Some(as_number(&value)?)
            }
            "size.height" | "fig.height" | "figheight" | "height" => {
                self.size.height = Some(as_number(&value)?)
            }
            "caption" | "fig.cap" | "figcap" | "tbl.cap" | "tblcap" => {
                self.caption = Some(value.to_string())
            }
            _ => {
                tracing::debug!(option = key, "ignoring unrecognized fragment option");
                self.unrecognized.insert(key.to_string(), value.to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = FragmentOptions::default();
        assert!(opts.display);
        assert!(opts.evaluate);
        assert!(!opts.error);
        assert_eq!(opts.result_handling, ResultHandling::Literal);
    }

    #[test]
    fn spec_names_and_aliases_agree() {
        let mut a = FragmentOptions::default();
        a.apply("suppressWarnings", OptionValue::Bool(true)).unwrap();
        a.apply("display", OptionValue::Bool(false)).unwrap();

        let mut b = FragmentOptions::default();
        b.apply("warning", OptionValue::Bool(false)).unwrap();
        b.apply("echo", OptionValue::Bool(false)).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn result_handling_values() {
        let mut opts = FragmentOptions::default();
        opts.apply("resultHandling", OptionValue::String("asis".into()))
            .unwrap();
        assert_eq!(opts.result_handling, ResultHandling::Asis);
        opts.apply("results", OptionValue::String("hide".into())).unwrap();
        assert_eq!(opts.result_handling, ResultHandling::Hidden);
        assert!(opts
            .apply("resultHandling", OptionValue::String("loud".into()))
            .is_err());
    }

    #[test]
    fn size_requires_positive_number() {
        let mut opts = FragmentOptions::default();
        opts.apply("size.width", OptionValue::Number(6.0)).unwrap();
        opts.apply("fig-height", OptionValue::Number(4.0)).unwrap();
        assert_eq!(opts.size.width, Some(6.0));
        assert_eq!(opts.size.height, Some(4.0));

        let err = opts.apply("size.width", OptionValue::Bool(true)).unwrap_err();
        assert_eq!(err.key, "size.width");
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let mut opts = FragmentOptions::default();
        let err = opts
            .apply("display", OptionValue::String("yes".into()))
            .unwrap_err();
        assert!(err.reason.contains("logical"));
    }

    #[test]
    fn unrecognized_options_are_preserved() {
        let mut opts = FragmentOptions::default();
        opts.apply("dev", OptionValue::String("png".into())).unwrap();
        assert_eq!(opts.unrecognized.get("dev").map(String::as_str), Some("png"));
    }

    #[test]
    fn labels_cannot_name_paths() {
        assert_eq!(check_label("scatter-plot_2").unwrap(), "scatter-plot_2");
        assert!(check_label("fit.model").is_ok());
        for label in ["../../../escape", "figs/one", "a\\b", "..", ""] {
            assert!(check_label(label).is_err(), "{label}");
        }
        let mut opts = FragmentOptions::default();
        assert!(opts.apply("label", OptionValue::String("../up".into())).is_err());
    }

    #[test]
    fn include_false_hides_everything() {
        let mut opts = FragmentOptions::default();
        opts.apply("include", OptionValue::Bool(false)).unwrap();
        assert!(!opts.display);
        assert_eq!(opts.result_handling, ResultHandling::Hidden);
    }

    #[test]
    fn r_literals() {
        assert_eq!(OptionValue::from_r_literal("TRUE"), OptionValue::Bool(true));
        assert_eq!(OptionValue::from_r_literal("F"), OptionValue::Bool(false));
        assert_eq!(OptionValue::from_r_literal("4.5"), OptionValue::Number(4.5));
        assert_eq!(
            OptionValue::from_r_literal("'asis'"),
            OptionValue::String("asis".into())
        );
    }
}
