//! Helpers for reading and writing the Markdown intermediate.

use std::ops::Range;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

/// Extensions every emitter parses the intermediate with.
pub fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH
}

/// Apply `f` to every run of prose text in `markdown`, leaving code, raw HTML,
/// link text and image descriptions untouched.
pub fn rewrite_text(markdown: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut ranges: Vec<Range<usize>> = Vec::new();
    let mut verbatim = 0usize;
    for (event, range) in Parser::new_ext(markdown, options()).into_offset_iter() {
        match event {
            Event::Start(
                Tag::CodeBlock(_) | Tag::HtmlBlock | Tag::Link { .. } | Tag::Image { .. },
            ) => {
                verbatim += 1;
            }
            Event::End(TagEnd::CodeBlock | TagEnd::HtmlBlock | TagEnd::Link | TagEnd::Image) => {
                verbatim = verbatim.saturating_sub(1);
            }
            // Brackets and entities arrive as separate text events; merge
            // adjacent ones so `[@a; @b]` is seen whole.
            Event::Text(_) if verbatim == 0 => match ranges.last_mut() {
                Some(last) if last.end == range.start => last.end = range.end,
                _ => ranges.push(range),
            },
            _ => {}
        }
    }

    let mut out = String::with_capacity(markdown.len());
    let mut cursor = 0;
    for range in ranges {
        if range.start < cursor {
            continue;
        }
        out.push_str(&markdown[cursor..range.start]);
        out.push_str(&f(&markdown[range.clone()]));
        cursor = range.end;
    }
    out.push_str(&markdown[cursor..]);
    out
}

/// A fenced code block whose fence is longer than any backtick run in `body`.
pub fn fence(info: &str, body: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in body.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    let ticks = "`".repeat((longest + 1).max(3));
    format!("{}{}\n{}\n{}", ticks, info, body.trim_end_matches('\n'), ticks)
}

/// Escape HTML special characters.
pub fn escape_html(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#39;".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_prose_only() {
        let md = "Say @hi.\n\n```\n@hi\n```\n\nAnd `@hi` and [@hi](x).\n";
        let out = rewrite_text(md, |t| t.replace("@hi", "hello"));
        assert_eq!(out, "Say hello.\n\n```\n@hi\n```\n\nAnd `@hi` and [@hi](x).\n");
    }

    #[test]
    fn bracketed_text_is_merged() {
        let mut seen = Vec::new();
        rewrite_text("See [@a; @b] here.", |t| {
            seen.push(t.to_string());
            t.to_string()
        });
        assert_eq!(seen, vec!["See [@a; @b] here."]);
    }

    #[test]
    fn fences_outgrow_their_content() {
        assert_eq!(fence("r", "x\n"), "```r\nx\n```");
        assert_eq!(fence("", "```"), "````\n```\n````");
    }

    #[test]
    fn html_escaping() {
        assert_eq!(escape_html("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
    }
}
