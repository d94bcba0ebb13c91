//! Bibliographies and author-year citations.
//!
//! A bibliography is loaded from CSL-JSON, CSL-YAML or BibTeX into a common
//! [`Reference`] model. [`Citer`] rewrites citation tokens in narrative text
//! and remembers which references were cited, in order, for the reference
//! list at the end of the document.

mod bibtex;
mod csl;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

use crate::error::{Warning, WarningKind};

#[derive(Debug, Error)]
pub enum CitationError {
    #[error("unknown citation key '{0}'")]
    UnknownCitationKey(String),

    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    Parse { message: String },

    #[error("unsupported bibliography format '{}' (expected .json, .yaml, .yml or .bib)", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// How a single citation is phrased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationStyle {
    /// `Nuijten et al., 2016`, used inside parentheses.
    Parenthetical,
    /// `Nuijten et al. (2016)`, for a bare `@key` in running text.
    Narrative,
    /// `2016`, for `[-@key]`.
    SuppressAuthor,
}

/// A person or organisation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Name {
    pub family: Option<String>,
    pub given: Option<String>,
    /// Organisations and other names that are not split.
    pub literal: Option<String>,
}

impl Name {
    /// The name as cited: family name or the literal name.
    pub fn short(&self) -> String {
        self.literal
            .clone()
            .or_else(|| self.family.clone())
            .or_else(|| self.given.clone())
            .unwrap_or_default()
    }

    /// `Family, G. I.` as in a reference list.
    pub fn inverted(&self) -> String {
        if let Some(literal) = &self.literal {
            return literal.clone();
        }
        let family = self.family.clone().unwrap_or_default();
        match self.given.as_deref().map(initials) {
            Some(initials) if !initials.is_empty() => format!("{}, {}", family, initials),
            _ => family,
        }
    }
}

fn initials(given: &str) -> String {
    given
        .split_whitespace()
        .map(|part| {
            part.split('-')
                .filter_map(|p| p.chars().next())
                .map(|c| format!("{}.", c))
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One bibliography entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reference {
    pub id: String,
    /// CSL item type, e.g. `article-journal` or `book`.
    pub kind: String,
    pub title: Option<String>,
    pub authors: Vec<Name>,
    pub year: Option<String>,
    pub container_title: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub page: Option<String>,
    pub publisher: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
}

impl Reference {
    fn year_label(&self) -> String {
        self.year.clone().unwrap_or_else(|| "n.d.".to_string())
    }

    /// Author part of a citation, APA style.
    fn author_label(&self, narrative: bool) -> String {
        let names: Vec<String> = self.authors.iter().map(Name::short).collect();
        match names.as_slice() {
            [] => self.title.clone().unwrap_or_else(|| self.id.clone()),
            [one] => one.clone(),
            [a, b] if narrative => format!("{} and {}", a, b),
            [a, b] => format!("{} & {}", a, b),
            [first, ..] => format!("{} et al.", first),
        }
    }

    pub fn cite(&self, style: CitationStyle) -> String {
        match style {
            CitationStyle::Parenthetical => {
                format!("{}, {}", self.author_label(false), self.year_label())
            }
            CitationStyle::Narrative => {
                format!("{} ({})", self.author_label(true), self.year_label())
            }
            CitationStyle::SuppressAuthor => self.year_label(),
        }
    }

    /// The reference-list entry as Markdown.
    pub fn to_markdown(&self) -> String {
        let names: Vec<String> = self.authors.iter().map(Name::inverted).collect();
        let authors = match names.as_slice() {
            [] => String::new(),
            [one] => one.clone(),
            [init @ .., last] => format!("{}, & {}", init.join(", "), last),
        };

        let mut entry = String::new();
        if !authors.is_empty() {
            entry.push_str(&authors);
            if !authors.ends_with('.') {
                entry.push('.');
            }
            entry.push(' ');
        }
        entry.push_str(&format!("({}).", self.year_label()));

        let title = self.title.as_deref().map(|t| t.trim_end_matches('.'));
        match (&self.container_title, title) {
            (Some(container), title) => {
                if let Some(title) = title {
                    entry.push_str(&format!(" {}.", title));
                }
                entry.push_str(&format!(" *{}*", container));
                if let Some(volume) = &self.volume {
                    entry.push_str(&format!(", *{}*", volume));
                    if let Some(issue) = &self.issue {
                        entry.push_str(&format!("({})", issue));
                    }
                }
                if let Some(page) = &self.page {
                    entry.push_str(&format!(", {}", page));
                }
                entry.push('.');
            }
            (None, Some(title)) => {
                entry.push_str(&format!(" *{}*.", title));
                if let Some(publisher) = &self.publisher {
                    entry.push_str(&format!(" {}.", publisher));
                }
            }
            (None, None) => {}
        }

        if let Some(doi) = &self.doi {
            entry.push_str(&format!(" <https://doi.org/{}>", doi));
        } else if let Some(url) = &self.url {
            entry.push_str(&format!(" <{}>", url));
        }
        entry
    }

    fn sort_key(&self) -> (String, String, String) {
        (
            self.author_label(false).to_lowercase(),
            self.year_label(),
            self.title.clone().unwrap_or_default().to_lowercase(),
        )
    }
}

/// References indexed by citation key.
#[derive(Debug, Clone, Default)]
pub struct Bibliography {
    references: Vec<Reference>,
    index: HashMap<String, usize>,
}

impl Bibliography {
    pub fn new(references: Vec<Reference>) -> Self {
        let index = references
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        Bibliography { references, index }
    }

    /// Load a bibliography file, choosing the reader by extension.
    pub fn load(path: &Path) -> Result<Bibliography, CitationError> {
        let content = std::fs::read_to_string(path).map_err(|source| CitationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        let bibliography = match extension.as_deref() {
            Some("json") => Bibliography::from_csl_json(&content),
            Some("yaml" | "yml") => Bibliography::from_csl_yaml(&content),
            Some("bib" | "bibtex") => Bibliography::from_bibtex(&content),
            _ => Err(CitationError::UnsupportedFormat(path.to_path_buf())),
        }?;
        tracing::debug!(
            path = %path.display(),
            entries = bibliography.len(),
            "bibliography loaded"
        );
        Ok(bibliography)
    }

    pub fn from_csl_json(content: &str) -> Result<Bibliography, CitationError> {
        csl::from_json(content).map(Bibliography::new)
    }

    pub fn from_csl_yaml(content: &str) -> Result<Bibliography, CitationError> {
        csl::from_yaml(content).map(Bibliography::new)
    }

    pub fn from_bibtex(content: &str) -> Result<Bibliography, CitationError> {
        bibtex::parse(content)
            .map(Bibliography::new)
            .map_err(|message| CitationError::Parse { message })
    }

    pub fn get(&self, key: &str) -> Option<&Reference> {
        self.index.get(key).map(|&i| &self.references[i])
    }

    /// Citation text for `key` in the given style.
    pub fn resolve(&self, key: &str, style: CitationStyle) -> Result<String, CitationError> {
        self.get(key)
            .map(|reference| reference.cite(style))
            .ok_or_else(|| CitationError::UnknownCitationKey(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

const KEY: &str = r"[A-Za-z0-9_]+(?:[:.#$%&+?<>~/-][A-Za-z0-9_]+)*";

static CITATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\[(?P<group>[^\[\]]*@[^\[\]]*)\]|(?P<pre>^|[^\w@\\?])@(?P<bare>{})",
        KEY
    ))
    .expect("citation pattern is valid")
});

static GROUP_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\s*(?P<prefix>[^@]*?)(?P<suppress>-)?@(?P<key>{})(?P<locator>[^@]*?)\s*$",
        KEY
    ))
    .expect("citation item pattern is valid")
});

fn is_crossref(key: &str) -> bool {
    key.starts_with("fig-") || key.starts_with("tbl-")
}

/// Rewrites citation tokens and records what was cited.
pub struct Citer<'a> {
    bibliography: Option<&'a Bibliography>,
    link: bool,
    cited: Vec<String>,
    seen: HashSet<String>,
    missing: HashSet<String>,
    warnings: Vec<Warning>,
}

impl<'a> Citer<'a> {
    /// With `link`, citations link to their reference-list entry.
    pub fn new(bibliography: Option<&'a Bibliography>, link: bool) -> Self {
        Citer {
            bibliography,
            link,
            cited: Vec::new(),
            seen: HashSet::new(),
            missing: HashSet::new(),
            warnings: Vec::new(),
        }
    }

    /// Replace `@key`, `[@key]`, `[-@key]` and `[see @a, p. 3; @b]` in `text`.
    pub fn process(&mut self, text: &str) -> String {
        CITATION
            .replace_all(text, |caps: &Captures<'_>| {
                if let Some(group) = caps.name("group") {
                    self.group(group.as_str())
                        .unwrap_or_else(|| caps[0].to_string())
                } else {
                    let key = &caps["bare"];
                    if is_crossref(key) {
                        return caps[0].to_string();
                    }
                    format!("{}{}", &caps["pre"], self.cite(key, CitationStyle::Narrative))
                }
            })
            .into_owned()
    }

    fn group(&mut self, body: &str) -> Option<String> {
        let items: Vec<Captures<'_>> = body
            .split(';')
            .map(|item| GROUP_ITEM.captures(item))
            .collect::<Option<_>>()?;
        if items.iter().all(|item| is_crossref(&item["key"])) {
            return None;
        }
        let rendered: Vec<String> = items
            .iter()
            .map(|item| {
                let style = if item.name("suppress").is_some() {
                    CitationStyle::SuppressAuthor
                } else {
                    CitationStyle::Parenthetical
                };
                let prefix = item["prefix"].trim();
                let locator = item["locator"].trim();
                let mut text = String::new();
                if !prefix.is_empty() {
                    text.push_str(prefix);
                    text.push(' ');
                }
                text.push_str(&self.cite(&item["key"], style));
                if !locator.is_empty() {
                    if !locator.starts_with(',') {
                        text.push(',');
                        text.push(' ');
                    }
                    text.push_str(locator);
                }
                text
            })
            .collect();
        Some(format!("({})", rendered.join("; ")))
    }

    fn cite(&mut self, key: &str, style: CitationStyle) -> String {
        let resolved = match self.bibliography {
            Some(bibliography) => bibliography.resolve(key, style),
            None => Err(CitationError::UnknownCitationKey(key.to_string())),
        };
        match resolved {
            Ok(text) => {
                if self.seen.insert(key.to_string()) {
                    self.cited.push(key.to_string());
                }
                if self.link {
                    format!("[{}](#ref-{})", text, key)
                } else {
                    text
                }
            }
            Err(_) => {
                if self.missing.insert(key.to_string()) {
                    tracing::warn!(key, "unknown citation key");
                    self.warnings
                        .push(Warning::new(WarningKind::UnknownCitationKey(key.to_string())));
                }
                format!("?@{}", key)
            }
        }
    }

    /// Cited references sorted for the reference list.
    pub fn references(&self) -> Vec<Reference> {
        let Some(bibliography) = self.bibliography else {
            return Vec::new();
        };
        let mut references: Vec<Reference> = self
            .cited
            .iter()
            .filter_map(|key| bibliography.get(key).cloned())
            .collect();
        references.sort_by_key(Reference::sort_key);
        references
    }

    pub fn has_citations(&self) -> bool {
        !self.cited.is_empty() || !self.missing.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(family: &str, given: &str) -> Name {
        Name {
            family: Some(family.to_string()),
            given: Some(given.to_string()),
            literal: None,
        }
    }

    fn bibliography() -> Bibliography {
        Bibliography::new(vec![
            Reference {
                id: "nuijten2016".into(),
                kind: "article-journal".into(),
                title: Some("The prevalence of statistical reporting errors".into()),
                authors: vec![
                    name("Nuijten", "Michèle B."),
                    name("Hartgerink", "Chris H. J."),
                    name("Wicherts", "Jelte M."),
                ],
                year: Some("2016".into()),
                container_title: Some("Behavior Research Methods".into()),
                volume: Some("48".into()),
                issue: Some("4".into()),
                page: Some("1205–1226".into()),
                doi: Some("10.3758/s13428-015-0664-2".into()),
                ..Reference::default()
            },
            Reference {
                id: "xie2015".into(),
                title: Some("Dynamic Documents with R and knitr".into()),
                authors: vec![name("Xie", "Yihui")],
                year: Some("2015".into()),
                publisher: Some("Chapman and Hall/CRC".into()),
                ..Reference::default()
            },
            Reference {
                id: "aust2022".into(),
                authors: vec![name("Aust", "Frederik"), name("Barth", "Marius")],
                year: Some("2022".into()),
                ..Reference::default()
            },
        ])
    }

    #[test]
    fn resolve_styles() {
        let bib = bibliography();
        assert_eq!(
            bib.resolve("nuijten2016", CitationStyle::Narrative).unwrap(),
            "Nuijten et al. (2016)"
        );
        assert_eq!(
            bib.resolve("aust2022", CitationStyle::Parenthetical).unwrap(),
            "Aust & Barth, 2022"
        );
        assert_eq!(
            bib.resolve("aust2022", CitationStyle::Narrative).unwrap(),
            "Aust and Barth (2022)"
        );
        assert!(matches!(
            bib.resolve("nobody", CitationStyle::Narrative),
            Err(CitationError::UnknownCitationKey(key)) if key == "nobody"
        ));
    }

    #[test]
    fn citer_rewrites_groups_and_bare_keys() {
        let bib = bibliography();
        let mut citer = Citer::new(Some(&bib), false);
        assert_eq!(
            citer.process("As @xie2015 argues [see @nuijten2016, p. 3; -@aust2022]."),
            "As Xie (2015) argues (see Nuijten et al., 2016, p. 3; 2022)."
        );
        let ids: Vec<String> = citer.references().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["aust2022", "nuijten2016", "xie2015"]);
    }

    #[test]
    fn unknown_keys_leave_a_placeholder() {
        let mut citer = Citer::new(None, false);
        assert_eq!(citer.process("Per @nuijten2016."), "Per ?@nuijten2016.");
        assert_eq!(citer.process("Again @nuijten2016."), "Again ?@nuijten2016.");
        assert!(citer.has_citations());
        assert_eq!(
            citer.into_warnings(),
            vec![Warning::new(WarningKind::UnknownCitationKey("nuijten2016".into()))]
        );
    }

    #[test]
    fn emails_and_crossrefs_are_ignored() {
        let bib = bibliography();
        let mut citer = Citer::new(Some(&bib), true);
        let text = "Write to a@xie2015.org about @fig-one.";
        assert_eq!(citer.process(text), text);
        assert!(!citer.has_citations());
    }

    #[test]
    fn linked_citations() {
        let bib = bibliography();
        let mut citer = Citer::new(Some(&bib), true);
        assert_eq!(citer.process("[@xie2015]"), "([Xie, 2015](#ref-xie2015))");
    }

    #[test]
    fn reference_entries() {
        let bib = bibliography();
        assert_eq!(
            bib.get("nuijten2016").unwrap().to_markdown(),
            "Nuijten, M. B., Hartgerink, C. H. J., & Wicherts, J. M. (2016). The prevalence of \
             statistical reporting errors. *Behavior Research Methods*, *48*(4), 1205–1226. \
             <https://doi.org/10.3758/s13428-015-0664-2>"
        );
        assert_eq!(
            bib.get("xie2015").unwrap().to_markdown(),
            "Xie, Y. (2015). *Dynamic Documents with R and knitr*. Chapman and Hall/CRC."
        );
    }
}
