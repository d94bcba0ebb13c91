//! CSL-JSON and CSL-YAML readers.

use serde::Deserialize;

use super::{CitationError, Name, Reference};

/// CSL allows strings or numbers for ids and several numeric fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Integer(i64),
    Float(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::String(s) => s,
            StringOrNumber::Integer(n) => n.to_string(),
            StringOrNumber::Float(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CslName {
    family: Option<String>,
    given: Option<String>,
    literal: Option<String>,
    #[serde(rename = "non-dropping-particle")]
    non_dropping_particle: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CslDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<StringOrNumber>>,
    literal: Option<String>,
    raw: Option<String>,
}

impl CslDate {
    fn year(self) -> Option<String> {
        if let Some(year) = self
            .date_parts
            .into_iter()
            .next()
            .and_then(|parts| parts.into_iter().next())
        {
            return Some(year.into_string());
        }
        self.literal.or(self.raw)
    }
}

#[derive(Debug, Deserialize)]
struct CslItem {
    id: StringOrNumber,
    #[serde(rename = "type", default)]
    kind: String,
    title: Option<String>,
    #[serde(default)]
    author: Vec<CslName>,
    #[serde(default)]
    editor: Vec<CslName>,
    issued: Option<CslDate>,
    #[serde(rename = "container-title")]
    container_title: Option<String>,
    volume: Option<StringOrNumber>,
    issue: Option<StringOrNumber>,
    page: Option<StringOrNumber>,
    publisher: Option<String>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
}

impl From<CslName> for Name {
    fn from(name: CslName) -> Self {
        let family = match (name.non_dropping_particle, name.family) {
            (Some(particle), Some(family)) => Some(format!("{} {}", particle, family)),
            (_, family) => family,
        };
        Name {
            family,
            given: name.given,
            literal: name.literal,
        }
    }
}

impl From<CslItem> for Reference {
    fn from(item: CslItem) -> Self {
        // Edited volumes are cited by their editors.
        let names = if item.author.is_empty() {
            item.editor
        } else {
            item.author
        };
        Reference {
            id: item.id.into_string(),
            kind: item.kind,
            title: item.title,
            authors: names.into_iter().map(Name::from).collect(),
            year: item.issued.and_then(CslDate::year),
            container_title: item.container_title,
            volume: item.volume.map(StringOrNumber::into_string),
            issue: item.issue.map(StringOrNumber::into_string),
            page: item
                .page
                .map(|p| p.into_string().replace("--", "–").replace('-', "–")),
            publisher: item.publisher,
            doi: item.doi,
            url: item.url,
        }
    }
}

/// A CSL-YAML file is a list of items or a mapping with a `references` list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CslYaml {
    Items(Vec<CslItem>),
    Document { references: Vec<CslItem> },
}

pub(super) fn from_json(content: &str) -> Result<Vec<Reference>, CitationError> {
    let items: Vec<CslItem> = serde_json::from_str(content).map_err(|e| CitationError::Parse {
        message: format!("invalid CSL-JSON: {}", e),
    })?;
    Ok(items.into_iter().map(Reference::from).collect())
}

pub(super) fn from_yaml(content: &str) -> Result<Vec<Reference>, CitationError> {
    let parsed: CslYaml = serde_yaml::from_str(content).map_err(|e| CitationError::Parse {
        message: format!("invalid CSL-YAML: {}", e),
    })?;
    let items = match parsed {
        CslYaml::Items(items) => items,
        CslYaml::Document { references } => references,
    };
    Ok(items.into_iter().map(Reference::from).collect())
}
