//! A small BibTeX reader: entries, `@string` macros, `#` concatenation and
//! braced or quoted values. `@comment` and `@preamble` are skipped.

use std::collections::HashMap;

use super::{Name, Reference};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    macros: HashMap<String, String>,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn line(&self) -> usize {
        self.src[..self.pos.min(self.src.len())].matches('\n').count() + 1
    }

    fn error(&self, message: &str) -> String {
        format!("BibTeX line {}: {}", self.line(), message)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), String> {
        self.skip_ws();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn ident(&mut self) -> String {
        self.skip_ws();
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b) if b.is_ascii_alphanumeric() || b"_-:./+'".contains(&b)
        ) {
            self.pos += 1;
        }
        self.src[start..self.pos].to_string()
    }

    /// Content of a `{...}` group with nested braces kept. The cursor is on
    /// the opening brace.
    fn braced(&mut self) -> Result<String, String> {
        let start = self.pos + 1;
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Ok(self.src[start..self.pos - 1].to_string());
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        Err(self.error("unbalanced braces"))
    }

    fn quoted(&mut self) -> Result<String, String> {
        self.pos += 1;
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                b'"' if depth == 0 => {
                    self.pos += 1;
                    return Ok(self.src[start..self.pos - 1].to_string());
                }
                _ => {}
            }
            self.pos += 1;
        }
        Err(self.error("unterminated string"))
    }

    /// A field value: parts joined with `#`.
    fn value(&mut self) -> Result<String, String> {
        let mut value = String::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'{') => value.push_str(&self.braced()?),
                Some(b'"') => value.push_str(&self.quoted()?),
                Some(b) if b.is_ascii_alphanumeric() => {
                    let word = self.ident();
                    let key = word.to_lowercase();
                    match self.macros.get(&key) {
                        Some(expansion) => value.push_str(expansion),
                        None => value.push_str(&word),
                    }
                }
                _ => return Err(self.error("expected a field value")),
            }
            self.skip_ws();
            if self.peek() == Some(b'#') {
                self.pos += 1;
            } else {
                return Ok(value);
            }
        }
    }

    /// `name = value` pairs up to the closing delimiter.
    fn fields(&mut self, close: u8) -> Result<Vec<(String, String)>, String> {
        let mut fields = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b) if b == close => {
                    self.pos += 1;
                    return Ok(fields);
                }
                Some(b',') => self.pos += 1,
                Some(_) => {
                    let name = self.ident().to_lowercase();
                    if name.is_empty() {
                        return Err(self.error("expected a field name"));
                    }
                    self.expect(b'=')?;
                    let value = self.value()?;
                    fields.push((name, value));
                }
                None => return Err(self.error("unterminated entry")),
            }
        }
    }
}

pub(super) fn parse(src: &str) -> Result<Vec<Reference>, String> {
    let mut cursor = Cursor {
        src,
        pos: 0,
        macros: MONTHS
            .iter()
            .enumerate()
            .map(|(i, m)| (m.to_string(), (i + 1).to_string()))
            .collect(),
    };
    let mut references = Vec::new();

    while let Some(at) = cursor.src[cursor.pos..].find('@') {
        cursor.pos += at + 1;
        let entry_type = cursor.ident().to_lowercase();
        cursor.skip_ws();
        let close = match cursor.peek() {
            Some(b'{') => b'}',
            Some(b'(') => b')',
            _ => continue,
        };

        match entry_type.as_str() {
            "comment" => {
                if close == b'}' {
                    cursor.braced()?;
                }
            }
            "preamble" => {
                cursor.pos += 1;
                cursor.value()?;
                cursor.expect(close)?;
            }
            "string" => {
                cursor.pos += 1;
                for (name, value) in cursor.fields(close)? {
                    cursor.macros.insert(name, value);
                }
            }
            _ => {
                cursor.pos += 1;
                let key_start = cursor.pos;
                let Some(comma) = cursor.src[key_start..].find(',') else {
                    return Err(cursor.error("entry has no fields"));
                };
                let key = cursor.src[key_start..key_start + comma].trim().to_string();
                cursor.pos = key_start + comma + 1;
                let fields = cursor.fields(close)?;
                references.push(reference(key, &entry_type, fields));
            }
        }
    }

    Ok(references)
}

fn reference(id: String, entry_type: &str, fields: Vec<(String, String)>) -> Reference {
    let fields: HashMap<String, String> = fields.into_iter().collect();
    let get = |name: &str| fields.get(name).map(|v| clean(v)).filter(|v| !v.is_empty());

    let kind = match entry_type {
        "article" => "article-journal",
        "book" => "book",
        "incollection" | "inbook" => "chapter",
        "inproceedings" | "conference" => "paper-conference",
        "phdthesis" | "mastersthesis" => "thesis",
        "techreport" => "report",
        _ => "document",
    };
    let names = fields
        .get("author")
        .or_else(|| fields.get("editor"))
        .map(|raw| split_names(raw))
        .unwrap_or_default();

    Reference {
        id,
        kind: kind.to_string(),
        title: get("title"),
        authors: names,
        year: get("year").or_else(|| get("date").map(|d| d.chars().take(4).collect())),
        container_title: get("journal")
            .or_else(|| get("journaltitle"))
            .or_else(|| get("booktitle")),
        volume: get("volume"),
        issue: get("number").or_else(|| get("issue")),
        page: get("pages").map(|p| p.replace("--", "–").replace('-', "–")),
        publisher: get("publisher")
            .or_else(|| get("institution"))
            .or_else(|| get("school")),
        doi: get("doi"),
        url: get("url"),
    }
}

/// Strip braces, unescape the common LaTeX specials and collapse whitespace.
fn clean(value: &str) -> String {
    let unescaped = value
        .replace("\\&", "&")
        .replace("\\%", "%")
        .replace("\\_", "_")
        .replace("\\$", "$")
        .replace(['{', '}'], "");
    unescaped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split an author list on top-level ` and `.
fn split_names(raw: &str) -> Vec<Name> {
    let mut names = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    let words: Vec<&str> = raw.split_whitespace().collect();
    for word in words {
        if depth == 0 && word.eq_ignore_ascii_case("and") {
            names.push(std::mem::take(&mut current));
            continue;
        }
        depth += word.matches('{').count();
        depth = depth.saturating_sub(word.matches('}').count());
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    names.push(current);
    names
        .iter()
        .filter(|n| !n.trim().is_empty())
        .map(|n| parse_name(n.trim()))
        .collect()
}

fn parse_name(raw: &str) -> Name {
    if raw.starts_with('{') && raw.ends_with('}') && !raw[1..raw.len() - 1].contains('{') {
        return Name {
            literal: Some(clean(raw)),
            ..Name::default()
        };
    }
    if let Some((family, given)) = raw.split_once(',') {
        return Name {
            family: Some(clean(family)),
            given: Some(clean(given)).filter(|g| !g.is_empty()),
            literal: None,
        };
    }
    let cleaned = clean(raw);
    match cleaned.rsplit_once(' ') {
        Some((given, family)) => Name {
            family: Some(family.to_string()),
            given: Some(given.to_string()),
            literal: None,
        },
        None => Name {
            family: Some(cleaned),
            ..Name::default()
        },
    }
}
