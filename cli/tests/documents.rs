use std::process::Command;

fn weave() -> Command {
    Command::new(env!("CARGO_BIN_EXE_weave"))
}

#[test]
fn test_documents_pass() {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/documents");
    let output = weave().args(["test", "--no-color", dir]).output().unwrap();
    assert!(
        output.status.success(),
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn render_writes_requested_formats() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("paper.Rmd");
    std::fs::write(&input, "The answer is `{r} 6 * 7`.\n").unwrap();
    let out = dir.path().join("out");

    let status = weave()
        .args(["--no-color", "render"])
        .arg(&input)
        .args(["--to", "markdown", "--to", "html", "--output-dir"])
        .arg(&out)
        .status()
        .unwrap();
    assert!(status.success());

    let markdown = std::fs::read_to_string(out.join("paper.md")).unwrap();
    assert!(markdown.contains("The answer is 42."));
    assert!(out.join("paper.html").exists());
}

#[test]
fn bare_file_argument_renders() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("note.Rmd");
    std::fs::write(&input, "Plain text.\n").unwrap();

    let output = weave()
        .arg(&input)
        .args(["--to", "markdown", "--stdout", "--quiet"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Plain text.\n");
}

#[test]
fn options_may_precede_a_bare_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("note.Rmd");
    std::fs::write(&input, "Two is `{r} 1 + 1`.\n").unwrap();

    let output = weave()
        .args(["--no-color", "-t", "markdown", "--stdout"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Two is 2.\n");
}

#[test]
fn failures_exit_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.Rmd");
    std::fs::write(&input, "```{r}\nx <- 1\n").unwrap();

    let check = weave().args(["--no-color", "check"]).arg(&input).output().unwrap();
    assert!(!check.status.success());

    std::fs::write(&input, "```{r}\nstop(\"nope\")\n```\n").unwrap();
    let render = weave()
        .args(["--no-color", "render"])
        .arg(&input)
        .args(["--to", "markdown", "--stdout"])
        .output()
        .unwrap();
    assert!(!render.status.success());
    assert!(String::from_utf8_lossy(&render.stderr).contains("nope"));
}
