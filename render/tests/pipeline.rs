use render::{CompileError, CompileOptions, Format, WarningKind, compile, write_all};

fn options(formats: &[&str]) -> CompileOptions {
    CompileOptions {
        stem: "paper".to_string(),
        formats: formats.iter().map(|f| f.to_string()).collect(),
        ..CompileOptions::default()
    }
}

fn markdown(source: &str) -> String {
    let compilation = compile(source, &options(&["markdown"])).unwrap();
    compilation.output(Format::Markdown).unwrap().content.clone()
}

#[test]
fn compiling_twice_is_byte_identical() {
    let source = "---\ntitle: Twice\n---\n\n```{r}\nset.seed(42)\nx <- rnorm(3)\nmean(x)\n```\n\nMean: `{r} mean(x)`.\n";
    let first = compile(source, &options(&["html", "latex", "markdown"])).unwrap();
    let second = compile(source, &options(&["html", "latex", "markdown"])).unwrap();
    assert_eq!(first.artifacts, second.artifacts);
}

#[test]
fn narrative_without_fragments_renders_verbatim() {
    let body = "# Introduction\n\nPlain *narrative* with a [link](https://example.org).\n";
    let source = format!("---\ntitle: Plain\n---\n{}", body);
    let out = markdown(&source);
    assert!(out.ends_with(body));
}

#[test]
fn inline_answer_in_every_format() {
    let source = "The answer is `{r} 2+2`.\n";
    let compilation = compile(source, &options(&["html", "latex", "markdown"])).unwrap();
    for format in [Format::Html, Format::Latex, Format::Markdown] {
        let artifact = compilation.output(format).unwrap();
        assert!(
            artifact.content.contains("The answer is 4."),
            "{} output: {}",
            format,
            artifact.content
        );
    }
}

#[test]
fn hidden_results_stay_out_but_bindings_persist() {
    let source = "```{r, echo=FALSE, results='hide'}\nsecret <- 41 + 1\nsecret\n```\n\nValue: `{r} secret`.\n";
    let out = markdown(source);
    assert!(!out.contains("## [1] 42"));
    assert!(out.contains("Value: 42."));
}

#[test]
fn suppressed_warnings_leave_no_annotation() {
    let source = "```{r, suppressWarnings=TRUE}\nx <- as.numeric(\"abc\")\n```\n";
    let out = markdown(source);
    assert!(!out.contains("Warning"));

    let source = "```{r}\nx <- as.numeric(\"abc\")\n```\n";
    let out = markdown(source);
    assert!(out.contains("## Warning:"));
}

#[test]
fn unknown_citation_is_a_visible_placeholder() {
    let source = "As shown by @nuijten2016, errors are common.\n\nThe end.\n";
    let compilation = compile(source, &options(&["markdown"])).unwrap();
    let out = &compilation.output(Format::Markdown).unwrap().content;
    assert!(out.contains("As shown by ?@nuijten2016, errors are common."));
    assert!(out.contains("The end."));
    assert!(compilation.warnings.iter().any(|w| matches!(
        &w.kind,
        WarningKind::UnknownCitationKey(key) if key == "nuijten2016"
    )));
    let warning = compilation
        .warnings
        .iter()
        .find(|w| matches!(w.kind, WarningKind::UnknownCitationKey(_)))
        .unwrap();
    assert_eq!(warning.span, Some(12..24));
}

#[test]
fn fragment_order_decides_visibility() {
    let forward = "```{r}\nx <- 1\n```\n\n```{r}\nx + 1\n```\n";
    assert!(markdown(forward).contains("## [1] 2"));

    let reversed = "```{r}\nx + 1\n```\n\n```{r}\nx <- 1\n```\n";
    let err = compile(reversed, &options(&["markdown"])).unwrap_err();
    match err {
        CompileError::Evaluation(err) => {
            assert_eq!(err.line, 2);
            assert_eq!(err.error.to_string(), "object 'x' not found");
        }
        other => panic!("expected an evaluation error, got {other:?}"),
    }
}

#[test]
fn figure_cross_references_resolve() {
    let source = "See @fig-trend and @tbl-missing.\n\n```{r trend, echo=FALSE, fig.cap='A trend'}\nplot(1:5, c(2, 4, 3, 5, 6), type = \"l\")\n```\n";
    let compilation = compile(source, &options(&["html", "markdown"])).unwrap();

    let html = &compilation.output(Format::Html).unwrap().content;
    assert!(html.contains("<a href=\"#fig-trend\">Figure 1</a>"));
    assert!(html.contains("<figure id=\"fig-trend\">"));
    assert!(html.contains("<figcaption>Figure 1: A trend</figcaption>"));
    assert!(html.contains("@tbl-missing"));

    let md = &compilation.output(Format::Markdown).unwrap().content;
    assert!(md.contains("[Figure 1](#fig-trend)"));
    assert!(compilation
        .artifacts
        .iter()
        .any(|a| a.path.to_str() == Some("paper_files/figure/trend-1.svg")));

    assert!(compilation.warnings.iter().any(|w| matches!(
        &w.kind,
        WarningKind::UnresolvedReference(id) if id == "tbl-missing"
    )));
}

#[test]
fn bibliography_citations_and_reference_list() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("refs.json"),
        r#"[{"id": "xie2015", "type": "book", "title": "Dynamic Documents with R and knitr",
             "author": [{"family": "Xie", "given": "Yihui"}], "issued": {"date-parts": [[2015]]},
             "publisher": "Chapman and Hall/CRC"}]"#,
    )
    .unwrap();
    let source = "---\nbibliography: refs.json\nlink-citations: true\n---\n\nKnitting [@xie2015].\n";
    let compilation = compile(
        source,
        &CompileOptions {
            base_dir: dir.path().to_path_buf(),
            ..options(&["html"])
        },
    )
    .unwrap();
    assert!(compilation.warnings.is_empty(), "{:?}", compilation.warnings);
    let html = &compilation.output(Format::Html).unwrap().content;
    assert!(html.contains("Knitting (<a href=\"#ref-xie2015\">Xie, 2015</a>)."));
    assert!(html.contains("<div id=\"ref-xie2015\" class=\"csl-entry\">"));
}

#[test]
fn missing_bibliography_file_is_only_a_warning() {
    let source = "---\nbibliography: nowhere.bib\n---\n\nText.\n";
    let compilation = compile(source, &options(&["markdown"])).unwrap();
    assert!(matches!(
        compilation.warnings[0].kind,
        WarningKind::Bibliography { .. }
    ));
}

#[test]
fn artifacts_are_written_next_to_each_other() {
    let source = "```{r hist, echo=FALSE}\nhist(c(1, 2, 2, 3, 3, 3))\n```\n";
    let compilation = compile(source, &options(&["latex", "markdown"])).unwrap();
    // The figure file is emitted once even though two formats link to it.
    assert_eq!(compilation.artifacts.len(), 3);

    let dir = tempfile::tempdir().unwrap();
    write_all(&compilation.artifacts, dir.path()).unwrap();
    assert!(dir.path().join("paper.tex").exists());
    assert!(dir.path().join("paper.md").exists());
    let svg = std::fs::read_to_string(dir.path().join("paper_files/figure/hist-1.svg")).unwrap();
    assert!(svg.starts_with("<svg"));
}

#[test]
fn unknown_format_fails_before_evaluation() {
    let source = "---\noutput: docx\n---\n\n```{r}\nstop(\"never runs\")\n```\n";
    assert!(matches!(
        compile(source, &CompileOptions::default()),
        Err(CompileError::UnknownFormat(name)) if name == "docx"
    ));
}

#[test]
fn parse_errors_halt_compilation() {
    let source = "```{r}\nx <- 1\n";
    match compile(source, &options(&["markdown"])) {
        Err(CompileError::Parse(errors)) => assert_eq!(errors.len(), 1),
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn embedded_errors_do_not_halt() {
    let source = "```{r, error=TRUE}\nstop(\"bad input\")\n```\n\nStill here.\n";
    let out = markdown(source);
    assert!(out.contains("## Error: bad input"));
    assert!(out.contains("Still here."));
}

#[test]
fn labels_cannot_escape_the_figure_directory() {
    let source = "```{r ../../../escape, echo=FALSE}\nplot(c(1, 2))\n```\n";
    match compile(source, &options(&["markdown"])) {
        Err(CompileError::Parse(errors)) => assert_eq!(errors.len(), 1),
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn huge_vectors_become_embedded_errors() {
    let source = "```{r, error=TRUE}\nx <- 1:1e20\n```\n\nStill here.\n";
    let out = markdown(source);
    assert!(out.contains("## Error: result would be too long a vector"));
    assert!(out.contains("Still here."));

    let source = "```{r}\nx <- rep(1, times = 1e19)\n```\n";
    match compile(source, &options(&["markdown"])) {
        Err(CompileError::Evaluation(err)) => {
            assert_eq!(err.error.to_string(), "result would be too long a vector");
        }
        other => panic!("expected an evaluation error, got {other:?}"),
    }
}
