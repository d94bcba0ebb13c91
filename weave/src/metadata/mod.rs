use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer};
use serde_yaml::Value;

/// Document-level configuration from the YAML front matter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Metadata {
    #[serde(default, deserialize_with = "scalar_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "authors")]
    pub author: Vec<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub date: Option<String>,
    /// Requested target formats, in declaration order.
    #[serde(default, alias = "format", deserialize_with = "output_formats")]
    pub output: Vec<OutputFormat>,
    #[serde(default)]
    pub bibliography: Option<PathBuf>,
    #[serde(default, rename = "linkCitations", alias = "link-citations", alias = "link_citations")]
    pub link_citations: bool,
    /// Every other key, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A target format identifier with its per-format option map.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFormat {
    pub name: String,
    pub options: BTreeMap<String, Value>,
}

impl OutputFormat {
    pub fn named(name: impl Into<String>) -> Self {
        OutputFormat {
            name: name.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn option_bool(&self, key: &str) -> Option<bool> {
        self.options.get(key).and_then(Value::as_bool)
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }
}

impl Metadata {
    /// Parse a front matter body. An empty or comment-only body yields defaults.
    pub fn from_yaml(yaml: &str) -> Result<Metadata, serde_yaml::Error> {
        let value: Value = serde_yaml::from_str(yaml)?;
        match value {
            Value::Null => Ok(Metadata::default()),
            Value::Mapping(_) => serde_yaml::from_value(value),
            _ => Err(serde::de::Error::custom(
                "front matter must be a mapping of keys to values",
            )),
        }
    }

    /// Names of the requested formats, in order.
    pub fn format_names(&self) -> Vec<&str> {
        self.output.iter().map(|f| f.name.as_str()).collect()
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        other => scalar_to_string(&other)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected a scalar value")),
    }
}

/// `author` may be a string, a list of strings, or a list of `{name: ...}` maps.
fn authors<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    fn one(value: &Value) -> Option<String> {
        match value {
            Value::Mapping(map) => map.get("name").and_then(scalar_to_string),
            other => scalar_to_string(other),
        }
    }

    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .iter()
            .map(|item| {
                one(item).ok_or_else(|| serde::de::Error::custom("invalid author entry"))
            })
            .collect(),
        other => one(other)
            .map(|a| vec![a])
            .ok_or_else(|| serde::de::Error::custom("invalid author entry")),
    }
}

/// Accepts `html`, `[html, latex]`, and `{html_document: {toc: true}, pdf_document: default}`.
fn output_formats<'de, D>(deserializer: D) -> Result<Vec<OutputFormat>, D::Error>
where
    D: Deserializer<'de>,
{
    fn options_of<E: serde::de::Error>(value: &Value) -> Result<BTreeMap<String, Value>, E> {
        match value {
            Value::Null => Ok(BTreeMap::new()),
            Value::String(s) if s == "default" => Ok(BTreeMap::new()),
            Value::Mapping(map) => map
                .iter()
                .map(|(k, v)| {
                    scalar_to_string(k)
                        .map(|k| (k, v.clone()))
                        .ok_or_else(|| E::custom("format option keys must be scalars"))
                })
                .collect(),
            _ => Err(E::custom("format options must be a mapping or 'default'")),
        }
    }

    fn from_mapping<E: serde::de::Error>(
        map: &serde_yaml::Mapping,
    ) -> Result<Vec<OutputFormat>, E> {
        map.iter()
            .map(|(name, opts)| {
                let name = scalar_to_string(name)
                    .ok_or_else(|| E::custom("format names must be scalars"))?;
                Ok(OutputFormat {
                    name,
                    options: options_of(opts)?,
                })
            })
            .collect()
    }

    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(Vec::new()),
        Value::String(name) => Ok(vec![OutputFormat::named(name.clone())]),
        Value::Mapping(map) => from_mapping(map),
        Value::Sequence(items) => {
            let mut formats = Vec::new();
            for item in items {
                match item {
                    Value::String(name) => formats.push(OutputFormat::named(name.clone())),
                    Value::Mapping(map) => formats.extend(from_mapping::<D::Error>(map)?),
                    _ => return Err(serde::de::Error::custom("invalid output format entry")),
                }
            }
            Ok(formats)
        }
        _ => Err(serde::de::Error::custom("invalid output format list")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_front_matter_is_default() {
        assert_eq!(Metadata::from_yaml("").unwrap(), Metadata::default());
        assert_eq!(Metadata::from_yaml("# just a comment\n").unwrap(), Metadata::default());
    }

    #[test]
    fn recognized_keys() {
        let yaml = r#"
title: "Reproducible manuscripts"
author:
  - Michèle Nuijten
  - name: Sacha Epskamp
date: 2016-10-01
bibliography: refs.bib
link-citations: true
"#;
        let meta = Metadata::from_yaml(yaml).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Reproducible manuscripts"));
        assert_eq!(meta.author, vec!["Michèle Nuijten", "Sacha Epskamp"]);
        assert_eq!(meta.date.as_deref(), Some("2016-10-01"));
        assert_eq!(meta.bibliography, Some(PathBuf::from("refs.bib")));
        assert!(meta.link_citations);
        assert!(meta.extra.is_empty());
    }

    #[test]
    fn output_as_mapping_with_options() {
        let yaml = "output:\n  html_document:\n    toc: true\n  pdf_document: default\n";
        let meta = Metadata::from_yaml(yaml).unwrap();
        assert_eq!(meta.format_names(), vec!["html_document", "pdf_document"]);
        assert_eq!(meta.output[0].option_bool("toc"), Some(true));
        assert!(meta.output[1].options.is_empty());
    }

    #[test]
    fn output_as_list_or_scalar() {
        let meta = Metadata::from_yaml("output: [html, markdown]").unwrap();
        assert_eq!(meta.format_names(), vec!["html", "markdown"]);

        let meta = Metadata::from_yaml("output: latex").unwrap();
        assert_eq!(meta.format_names(), vec!["latex"]);
    }

    #[test]
    fn unknown_keys_are_preserved() {
        let meta = Metadata::from_yaml("title: T\nabstract: short\n").unwrap();
        assert_eq!(
            meta.extra.get("abstract").and_then(Value::as_str),
            Some("short")
        );
    }

    #[test]
    fn non_mapping_is_rejected() {
        assert!(Metadata::from_yaml("- a\n- b\n").is_err());
    }
}
