use weave::{Block, FragmentKind, ParseErrorKind, ResultHandling, Segment};

fn parse(source: &str) -> weave::Document {
    weave::Parser::new(source.to_string(), 0)
        .parse()
        .expect("parse failed")
}

fn parse_errors(source: &str) -> Vec<weave::ParseError> {
    match weave::Parser::new(source.to_string(), 0).parse() {
        Ok(_) => panic!("expected parse errors"),
        Err(errors) => errors,
    }
}

#[test]
fn metadata_precedes_blocks() {
    let doc = parse("---\ntitle: Demo\noutput: [html, latex]\n---\n\n# Intro\n\nText.\n");
    assert_eq!(doc.metadata.title.as_deref(), Some("Demo"));
    assert_eq!(doc.metadata.format_names(), vec!["html", "latex"]);
    assert_eq!(doc.blocks.len(), 1);
    assert_eq!(doc.to_string(), "\n# Intro\n\nText.\n");
}

#[test]
fn narrative_without_fragments_is_verbatim() {
    let body = "# Heading\n\nSome *emphasis*, a [link](https://example.org), and\n\n- a\n- list\n";
    let doc = parse(&format!("---\ntitle: T\n---\n{}", body));
    assert_eq!(doc.to_string(), body);
    assert!(doc.fragments().is_empty());
}

#[test]
fn block_fragments_split_narrative() {
    let source = "Before.\n\n```{r setup, display=FALSE}\nx <- 1\n```\n\nAfter.\n";
    let doc = parse(source);
    assert_eq!(doc.blocks.len(), 3);

    let Block::Fragment(fragment) = &doc.blocks[1] else {
        panic!("expected a fragment");
    };
    assert_eq!(fragment.engine, "r");
    assert_eq!(fragment.code, "x <- 1\n");
    assert_eq!(fragment.label(), Some("setup"));
    assert!(!fragment.options.display);
    assert_eq!(fragment.kind, FragmentKind::Block);
    assert_eq!(fragment.line, 3);
    assert_eq!(doc.to_string(), source);
}

#[test]
fn plain_code_blocks_stay_narrative() {
    let doc = parse("```r\nx <- 1\n```\n");
    assert!(doc.fragments().is_empty());
}

#[test]
fn inline_fragments_keep_position() {
    let doc = parse("The answer is `{r} 2+2`, or `r 1+1` doubled.\n");
    let Block::Narrative(text) = &doc.blocks[0] else {
        panic!("expected narrative");
    };
    assert_eq!(text.segments.len(), 5);
    assert_eq!(text.segments[0], Segment::Text("The answer is ".into()));
    let Segment::Inline(first) = &text.segments[1] else {
        panic!("expected inline fragment");
    };
    assert_eq!(first.code, "2+2");
    assert_eq!(first.kind, FragmentKind::Inline);
    assert_eq!(text.segments[2], Segment::Text(", or ".into()));
    assert_eq!(text.segments[4], Segment::Text(" doubled.\n".into()));
}

#[test]
fn fragments_are_numbered_in_source_order() {
    let doc = parse("`{r} 1`\n\n```{r}\n2\n```\n\n`{r} 3`\n");
    let fragments = doc.fragments();
    let ids: Vec<usize> = fragments.iter().map(|f| f.id).collect();
    let codes: Vec<&str> = fragments.iter().map(|f| f.code.trim()).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    assert_eq!(codes, vec!["1", "2", "3"]);
}

#[test]
fn option_comment_lines() {
    let doc =
        parse("```{r}\n#| label: fig-means\n#| resultHandling: asis\nbarplot(c(1, 2))\n```\n");
    let fragment = doc.fragments()[0];
    assert_eq!(fragment.label(), Some("fig-means"));
    assert_eq!(fragment.options.result_handling, ResultHandling::Asis);
    assert_eq!(fragment.code, "barplot(c(1, 2))\n");
}

#[test]
fn unterminated_fragment_names_the_line() {
    let errors = parse_errors("Intro\n\n```{r}\nx <- 1\n");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ParseErrorKind::UnterminatedFragment { line: 3 });
}

#[test]
fn malformed_metadata() {
    let errors = parse_errors("---\ntitle: [unclosed\n---\nBody\n");
    assert!(matches!(errors[0].kind, ParseErrorKind::MalformedMetadata(_)));

    let errors = parse_errors("---\ntitle: T\nBody\n");
    assert!(matches!(errors[0].kind, ParseErrorKind::MalformedMetadata(_)));
}

#[test]
fn invalid_option_value() {
    let errors = parse_errors("```{r, display=\"sometimes\"}\n1\n```\n");
    assert!(matches!(
        &errors[0].kind,
        ParseErrorKind::InvalidOption { key, .. } if key == "display"
    ));
}

#[test]
fn labels_that_leave_the_figure_directory() {
    for header in ["{r ../../../escape, echo=FALSE}", "{r, label=\"figs/one\"}"] {
        let errors = parse_errors(&format!("```{}\nplot(c(1, 2))\n```\n", header));
        assert!(
            matches!(&errors[0].kind, ParseErrorKind::InvalidOption { key, .. } if key == "label"),
            "{header}: {errors:?}"
        );
    }
}

#[test]
fn duplicate_labels() {
    let errors = parse_errors("```{r a}\n1\n```\n\n```{r a}\n2\n```\n");
    assert_eq!(errors[0].kind, ParseErrorKind::DuplicateLabel("a".into()));
    assert!(errors[0].notes[0].contains("line 1"));
}
