use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use render::{CompileError, CompileOptions, Compilation, Format, Warning};

#[derive(Debug, Deserialize)]
pub struct ExpectedWarning {
    /// Substring that must appear in the warning message.
    pub contains: String,

    /// If set, the warning's span must start on this 1-based source line.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Formats to compile. The first one is checked against the expectations.
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,

    /// Expected document output of the first format (trimmed comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Substrings that must appear in the first format's output.
    #[serde(default)]
    pub expect_contains: Vec<String>,

    /// Substrings that must not appear in the first format's output.
    #[serde(default)]
    pub expect_absent: Vec<String>,

    /// Expected compile error; its Display string must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// If true, the test expects parsing to fail.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Expected warnings. If present (even empty), warning count and content are checked.
    /// Each entry checks message substring and optionally the source line.
    #[serde(default)]
    pub expect_warnings: Option<Vec<ExpectedWarning>>,
}

fn default_formats() -> Vec<String> {
    vec!["markdown".to_string()]
}

/// Split a `.test.md` file into its TOML config and the manuscript.
///
/// The config sits between two `+++` lines so that manuscripts keep their
/// own `---` front matter.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');
    let rest = content
        .strip_prefix("+++")
        .ok_or("missing opening +++ config delimiter")?;
    let rest = rest.trim_start_matches('\r').strip_prefix('\n').unwrap_or(rest);

    let (config, source) = rest
        .split_once("\n+++")
        .ok_or("missing closing +++ config delimiter")?;
    let source = source.trim_start_matches('\r');
    let source = source.strip_prefix('\n').unwrap_or(source);

    let config: TestConfig = toml::from_str(config.trim_end_matches('\r'))
        .map_err(|e| format!("TOML parse error: {}", e))?;
    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("cannot read file: {}", e)),
            };
        }
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("config error: {}", e)),
            };
        }
    };

    let options = CompileOptions {
        formats: config.formats.clone(),
        ..CompileOptions::for_path(path)
    };
    let result = render::compile(source, &options);

    TestResult {
        path: path.to_path_buf(),
        description: config.description.clone(),
        outcome: match check(&config, source, result) {
            Some(reason) => TestOutcome::Fail(reason),
            None => TestOutcome::Pass,
        },
    }
}

/// Compare a compilation against the expectations. Returns `Some(reason)` on mismatch.
fn check(
    config: &TestConfig,
    source: &str,
    result: Result<Compilation, CompileError>,
) -> Option<String> {
    let compilation = match (result, &config.expect_error, config.expect_parse_error) {
        (Err(CompileError::Parse(_)), _, true) => return None,
        (Err(CompileError::Parse(errors)), _, false) => {
            let msgs: Vec<String> = errors.iter().map(|e| e.message()).collect();
            return Some(format!("unexpected parse error: {}", msgs.join("; ")));
        }
        (_, _, true) => return Some("expected parse error, but parsing succeeded".into()),
        (Err(error), Some(expected), _) => {
            let message = error.to_string();
            return if message.contains(expected.as_str()) {
                None
            } else {
                Some(format!(
                    "expected error containing \"{}\", got: {}",
                    expected, message
                ))
            };
        }
        (Ok(_), Some(expected), _) => {
            return Some(format!(
                "expected error containing \"{}\", but compilation succeeded",
                expected
            ));
        }
        (Err(error), None, _) => return Some(format!("unexpected compile error: {}", error)),
        (Ok(compilation), None, _) => compilation,
    };

    let format = config
        .formats
        .first()
        .and_then(|name| Format::try_from(name.as_str()).ok())
        .unwrap_or(Format::Markdown);
    let Some(output) = compilation.output(format) else {
        return Some(format!("no {} output was produced", format));
    };
    let actual = output.content.trim();

    if let Some(expected) = &config.expect_output {
        let expected = expected.trim();
        if actual != expected {
            return Some(format!(
                "output mismatch\n  expected: {}\n  actual:   {}",
                expected, actual
            ));
        }
    }
    for needle in &config.expect_contains {
        if !actual.contains(needle.as_str()) {
            return Some(format!("output does not contain \"{}\"\n  actual: {}", needle, actual));
        }
    }
    for needle in &config.expect_absent {
        if actual.contains(needle.as_str()) {
            return Some(format!("output unexpectedly contains \"{}\"", needle));
        }
    }

    match &config.expect_warnings {
        Some(expected) => check_warnings(source, &compilation.warnings, expected),
        None => None,
    }
}

/// 1-based line of a byte offset.
fn line_of(source: &str, offset: usize) -> usize {
    source.as_bytes()[..offset.min(source.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// Compare warnings pairwise with their expectations, in order.
fn check_warnings(
    source: &str,
    warnings: &[Warning],
    expected: &[ExpectedWarning],
) -> Option<String> {
    if warnings.len() != expected.len() {
        let listed = if warnings.is_empty() {
            "    (none)".to_string()
        } else {
            warnings
                .iter()
                .map(|w| format!("    - {}", w))
                .collect::<Vec<_>>()
                .join("\n")
        };
        return Some(format!(
            "expected {} warning(s), got {}:\n{}",
            expected.len(),
            warnings.len(),
            listed
        ));
    }

    warnings
        .iter()
        .zip(expected)
        .enumerate()
        .find_map(|(i, (warning, want))| {
            let message = warning.to_string();
            if !message.contains(&want.contains) {
                return Some(format!(
                    "warning {}: wanted \"{}\" in: {}",
                    i, want.contains, message
                ));
            }
            let line = want.line?;
            match &warning.span {
                None => Some(format!("warning {}: wanted line {}, has no location", i, line)),
                Some(span) if line_of(source, span.start) != line => Some(format!(
                    "warning {}: wanted line {}, found line {}",
                    i,
                    line,
                    line_of(source, span.start)
                )),
                Some(_) => None,
            }
        })
}

/// `.test.md` files under `root`, keyed by their directory relative to it.
/// Files directly in `root` have the empty category.
fn discover(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut found = BTreeMap::new();
    walk(root, root, &mut found);
    found.values_mut().for_each(|files: &mut Vec<PathBuf>| files.sort());
    found
}

fn walk(dir: &Path, root: &Path, found: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            walk(&path, root, found);
            continue;
        }
        let is_test = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".test.md"));
        if !is_test {
            continue;
        }
        let category = path
            .parent()
            .and_then(|parent| parent.strip_prefix(root).ok())
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        found.entry(category).or_default().push(path);
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// Print the categories under `path` with their test counts.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("{} is a single test file", path.display());
        return;
    }
    let found = discover(path);
    if found.is_empty() {
        eprintln!("no .test.md files under {}", path.display());
        return;
    }
    for (category, files) in &found {
        eprintln!("{:<24} {} test(s)", category_label(category), files.len());
    }
}

/// ANSI-styled text, or plain text with `--no-color`.
fn paint(text: &str, code: &str, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    }
}

/// Select the categories to run. Unknown names are reported and skipped.
fn select<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a [PathBuf]> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();
    }
    let mut selected = BTreeMap::new();
    for name in requested {
        let name = name.trim_matches('/');
        let prefix = format!("{}/", name);
        let before = selected.len();
        for (category, files) in all {
            if category == name || category.starts_with(&prefix) {
                selected.insert(category.as_str(), files.as_slice());
            }
        }
        if selected.len() == before {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                name,
                available.join(", ")
            );
        }
    }
    selected
}

/// Run all `.test.md` files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let all = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        discover(path)
    };
    if all.is_empty() {
        eprintln!("no .test.md files under {}", path.display());
        return 1;
    }
    let selected = if path.is_file() {
        select(&all, &[])
    } else {
        select(&all, categories)
    };
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();
    for (category, files) in &selected {
        if !path.is_file() {
            eprintln!();
            eprintln!("{}", paint(category_label(category), "1", no_color));
        }
        for file in *files {
            let result = run_single_test(file);
            let label = result
                .description
                .clone()
                .or_else(|| {
                    file.file_stem()
                        .and_then(|s| s.to_str())
                        .map(|s| s.trim_end_matches(".test").to_string())
                })
                .unwrap_or_else(|| "?".to_string());
            match result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", paint("PASS", "32", no_color), label);
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", paint("FAIL", "31", no_color), label);
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    let failed = failures.len();
    if failed == 0 {
        eprintln!("test result: {}. {} passed, 0 failed", paint("ok", "32", no_color), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            paint("FAILED", "31", no_color),
            passed,
            failed,
            passed + failed
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_block_is_split_from_the_manuscript() {
        let content = "+++\ndescription = \"inline\"\nexpect_output = \"4\"\n+++\n---\ntitle: T\n---\n";
        let (config, source) = parse_test_file(content).unwrap();
        assert_eq!(config.description.as_deref(), Some("inline"));
        assert_eq!(config.formats, vec!["markdown"]);
        assert_eq!(source, "---\ntitle: T\n---\n");
    }

    #[test]
    fn missing_config_is_an_error() {
        assert!(parse_test_file("no config here").is_err());
    }

    #[test]
    fn expectations_are_checked() {
        let config: TestConfig = toml::from_str("expect_contains = [\"is 4.\"]").unwrap();
        let source = "It is `{r} 2 + 2`.\n";
        let result = render::compile(source, &CompileOptions {
            formats: config.formats.clone(),
            ..CompileOptions::default()
        });
        assert_eq!(check(&config, source, result), None);

        let config: TestConfig = toml::from_str("expect_error = \"not found\"").unwrap();
        let source = "```{r}\ny\n```\n";
        let result = render::compile(source, &CompileOptions {
            formats: config.formats.clone(),
            ..CompileOptions::default()
        });
        assert_eq!(check(&config, source, result), None);
    }
}
