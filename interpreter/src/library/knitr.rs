use std::rc::Rc;

use crate::error::RuntimeError;
use crate::library::{Arguments, CallContext, Package};
use crate::print::pipe_table;
use crate::renderable::{Narrative, Renderable};
use crate::runtime_value::{RuntimeValue, Table};

pub fn package() -> Package {
    Package::new("knitr")
        .function("kable", kable)
        .function("combine_words", combine_words)
}

/// A table formatted for the document rather than the console.
#[derive(Debug, Clone)]
pub struct Kable {
    pub table: Table,
    pub caption: Option<String>,
    pub digits: Option<usize>,
}

impl Kable {
    pub fn markdown(&self) -> String {
        pipe_table(&self.table, self.digits)
    }
}

impl Renderable for Kable {
    fn type_name(&self) -> &str {
        "knitr_kable"
    }

    fn to_narrative(&self) -> Narrative {
        Narrative::Table {
            markdown: self.markdown(),
            caption: self.caption.clone(),
        }
    }

    fn to_literal(&self) -> String {
        self.markdown()
    }

    fn is_asis(&self) -> bool {
        true
    }
}

fn kable(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let mut table = match args.required("x", 0)? {
        RuntimeValue::Table(table) => table.clone(),
        RuntimeValue::Object(_) => {
            return Err(RuntimeError::invalid_argument(
                "kable",
                "'x' must be a data frame or vector",
            ));
        }
        vector => Table::from_columns(vec![("x".to_string(), vector.clone())])?,
    };

    if let Some(names) = args.named("col.names") {
        let names: Vec<String> = names.elements().iter().map(RuntimeValue::scalar_text).collect();
        if names.len() != table.ncol() {
            return Err(RuntimeError::invalid_argument(
                "kable",
                format!(
                    "'col.names' has {} names for {} columns",
                    names.len(),
                    table.ncol()
                ),
            ));
        }
        table.headers = names;
    }

    let digits = match args.named("digits").and_then(RuntimeValue::as_number) {
        Some(d) if !(0.0..=20.0).contains(&d) => {
            return Err(RuntimeError::invalid_argument(
                "kable",
                "'digits' must be between 0 and 20",
            ));
        }
        Some(d) => Some(d as usize),
        None => None,
    };

    Ok(RuntimeValue::Object(Rc::new(Kable {
        table,
        caption: args.named("caption").map(RuntimeValue::scalar_text),
        digits,
    })))
}

/// `combine_words(c("a", "b", "c"))` is `"a, b and c"`.
fn combine_words(_: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let words: Vec<String> = args
        .required("words", 0)?
        .elements()
        .iter()
        .map(RuntimeValue::scalar_text)
        .collect();
    let sep = args.string("sep", 1).unwrap_or_else(|| ", ".to_string());
    let and = args.string("and", 2).unwrap_or_else(|| " and ".to_string());

    let text = match words.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{}{}{}", first, and, second),
        [init @ .., last] => format!("{}{}{}", init.join(&sep), and, last),
    };
    Ok(RuntimeValue::String(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::library::Library;
    use crate::result::Capture;

    fn call(
        func: fn(&mut CallContext<'_>, &Arguments) -> Result<RuntimeValue, RuntimeError>,
        args: Arguments,
    ) -> Result<RuntimeValue, RuntimeError> {
        let mut env = Environment::new();
        let library = Library::standard();
        let mut capture = Capture::default();
        let mut ctx = CallContext {
            env: &mut env,
            library: &library,
            capture: &mut capture,
            depth: 0,
        };
        func(&mut ctx, &args)
    }

    #[test]
    fn kable_is_asis_with_caption() {
        let x = RuntimeValue::from_numbers(vec![1.0, 2.5]);
        let args = Arguments::new("kable")
            .with(None, x)
            .with(Some("caption"), RuntimeValue::String("Scores".into()));
        let RuntimeValue::Object(object) = call(kable, args).unwrap() else {
            panic!("kable should return an object");
        };
        assert!(object.is_asis());
        assert_eq!(
            object.to_narrative(),
            Narrative::Table {
                markdown: "|   x|\n|---:|\n| 1.0|\n| 2.5|".to_string(),
                caption: Some("Scores".to_string()),
            }
        );
    }

    #[test]
    fn kable_rejects_mismatched_column_names() {
        let args = Arguments::new("kable")
            .with(None, RuntimeValue::Number(1.0))
            .with(
                Some("col.names"),
                RuntimeValue::from_strings(vec!["a".to_string(), "b".to_string()]),
            );
        assert!(matches!(
            call(kable, args),
            Err(RuntimeError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn words_are_combined() {
        let words = |w: &[&str]| {
            Arguments::new("combine_words")
                .with(None, RuntimeValue::from_strings(w.iter().map(|s| s.to_string())))
        };
        assert_eq!(
            call(combine_words, words(&["a", "b", "c"])),
            Ok(RuntimeValue::String("a, b and c".into()))
        );
        assert_eq!(
            call(combine_words, words(&["a", "b"])),
            Ok(RuntimeValue::String("a and b".into()))
        );
    }
}
