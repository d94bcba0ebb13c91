//! Numbering of labeled figures and tables, and resolution of `@fig-…` /
//! `@tbl-…` tokens in narrative text.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{Warning, WarningKind};

static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^\w@\\])@((?:fig|tbl)-[A-Za-z0-9_]+(?:[-:][A-Za-z0-9_]+)*)")
        .expect("cross-reference pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Figure,
    Table,
}

impl RefKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            RefKind::Figure => "fig",
            RefKind::Table => "tbl",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RefKind::Figure => "Figure",
            RefKind::Table => "Table",
        }
    }
}

/// Reference ids and their numbers, assigned in document order per kind.
#[derive(Debug, Default)]
pub struct CrossRefs {
    entries: HashMap<String, (RefKind, usize)>,
    figures: usize,
    tables: usize,
}

impl CrossRefs {
    /// Register the next element of `kind` for fragment `label`. The `k`th
    /// element of one fragment (1-based) gets a `-k` suffix after the first.
    /// Returns the id and the element's number.
    pub fn register(&mut self, kind: RefKind, label: &str, k: usize) -> (String, usize) {
        let id = if k <= 1 {
            format!("{}-{}", kind.prefix(), label)
        } else {
            format!("{}-{}-{}", kind.prefix(), label, k)
        };
        let counter = match kind {
            RefKind::Figure => &mut self.figures,
            RefKind::Table => &mut self.tables,
        };
        *counter += 1;
        let number = *counter;
        self.entries.insert(id.clone(), (kind, number));
        (id, number)
    }

    pub fn get(&self, id: &str) -> Option<(RefKind, usize)> {
        self.entries.get(id).copied()
    }

    /// Replace resolvable tokens with a link reading "Figure N" / "Table N".
    /// Unresolvable tokens stay as written and produce a warning.
    pub fn resolve(&self, text: &str, warnings: &mut Vec<Warning>) -> String {
        REFERENCE
            .replace_all(text, |caps: &Captures<'_>| {
                let id = &caps[2];
                match self.get(id) {
                    Some((kind, number)) => {
                        format!("{}[{} {}](#{})", &caps[1], kind.name(), number, id)
                    }
                    None => {
                        tracing::warn!(id, "unresolved cross-reference");
                        warnings.push(Warning::new(WarningKind::UnresolvedReference(
                            id.to_string(),
                        )));
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The `Figure N: ` / `Table N: ` caption prefix for a numbered element.
pub fn caption_prefix(kind: RefKind, number: Option<usize>) -> String {
    match number {
        Some(n) => format!("{} {}: ", kind.name(), n),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_is_per_kind() {
        let mut refs = CrossRefs::default();
        assert_eq!(refs.register(RefKind::Figure, "a", 1), ("fig-a".to_string(), 1));
        assert_eq!(refs.register(RefKind::Table, "b", 1), ("tbl-b".to_string(), 1));
        assert_eq!(refs.register(RefKind::Figure, "a", 2), ("fig-a-2".to_string(), 2));
    }

    #[test]
    fn tokens_become_links() {
        let mut refs = CrossRefs::default();
        refs.register(RefKind::Figure, "scatter", 1);
        let mut warnings = Vec::new();
        assert_eq!(
            refs.resolve("As @fig-scatter shows.", &mut warnings),
            "As [Figure 1](#fig-scatter) shows."
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn unresolved_tokens_stay_and_warn() {
        let refs = CrossRefs::default();
        let mut warnings = Vec::new();
        assert_eq!(refs.resolve("See @tbl-missing.", &mut warnings), "See @tbl-missing.");
        assert_eq!(
            warnings,
            vec![Warning::new(WarningKind::UnresolvedReference("tbl-missing".into()))]
        );
    }

    #[test]
    fn emails_are_not_references() {
        let refs = CrossRefs::default();
        let mut warnings = Vec::new();
        assert_eq!(refs.resolve("mail me@fig-host.org", &mut warnings), "mail me@fig-host.org");
        assert!(warnings.is_empty());
    }
}
