mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use interpreter::FragmentEvaluationError;
use render::{CompileError, CompileOptions, Warning};

const SUBCOMMANDS: &[&str] = &["render", "check", "ast", "test", "help"];

#[derive(Parser)]
#[command(name = "weave", version, about = "Reproducible manuscript compiler")]
struct Cli {
    /// Disable colored diagnostics
    #[arg(long, global = true)]
    no_color: bool,

    /// Log pipeline progress (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a manuscript into its output formats
    Render(RenderArgs),

    /// Parse only and report structural errors
    Check(FileArgs),

    /// Dump the parsed document
    Ast(FileArgs),

    /// Run .test.md test documents
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Manuscript to compile
    file: String,

    /// Output format (html, latex, markdown or an alias). Repeatable;
    /// overrides the document's `output` list.
    #[arg(short = 't', long = "to")]
    to: Vec<String>,

    /// Directory to write artifacts into (defaults to the input's directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print the document artifacts instead of writing files
    #[arg(long)]
    stdout: bool,

    /// Only report errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::Args)]
struct FileArgs {
    /// Manuscript to read
    file: String,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

/// Options whose value is the next argument.
const VALUE_OPTIONS: &[&str] = &["-t", "--to", "-o", "--output-dir", "-c", "--category"];

/// `weave paper.Rmd` works like `weave render paper.Rmd`.
fn with_default_subcommand(mut args: Vec<String>) -> Vec<String> {
    let mut i = 1;
    while let Some(arg) = args.get(i) {
        if arg == "--" {
            break;
        }
        if !arg.starts_with('-') {
            if !SUBCOMMANDS.contains(&arg.as_str()) {
                args.insert(1, "render".to_string());
            }
            break;
        }
        i += if VALUE_OPTIONS.contains(&arg.as_str()) { 2 } else { 1 };
    }
    args
}

fn main() {
    let args = with_default_subcommand(std::env::args().collect());
    let cli = Cli::parse_from(&args);
    let quiet = matches!(&cli.command, Command::Render(r) if r.quiet);
    init_tracing(cli.verbose, quiet);

    let code = match cli.command {
        Command::Render(args) => do_render(args, cli.no_color),
        Command::Check(args) => do_check(&args.file, cli.no_color),
        Command::Ast(args) => do_ast(&args.file, cli.no_color),
        Command::Test(args) => {
            let path = Path::new(&args.path);
            if args.list_categories {
                test_runner::list_categories(path);
                0
            } else {
                test_runner::run_tests(path, cli.no_color, &args.category)
            }
        }
    };
    process::exit(code);
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "weave=info,render=info,interpreter=warn",
        (false, 1) => "weave=debug,render=debug,interpreter=debug",
        (false, _) => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(verbose > 0)
        .without_time()
        .init();
}

fn color_choice(no_color: bool) -> ColorChoice {
    if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

/// Source text and its codespan file database.
struct Input {
    files: SimpleFiles<String, String>,
    file_id: usize,
    source: String,
}

fn read_input(file: &str) -> Option<Input> {
    match std::fs::read_to_string(file) {
        Ok(source) => {
            let mut files = SimpleFiles::new();
            let file_id = files.add(file.to_string(), source.clone());
            Some(Input {
                files,
                file_id,
                source,
            })
        }
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", file, e);
            None
        }
    }
}

fn parse(input: &Input, no_color: bool) -> Option<weave::Document> {
    match weave::Parser::new(input.source.clone(), input.file_id).parse() {
        Ok(document) => Some(document),
        Err(errors) => {
            emit_parse_errors(&input.files, &errors, no_color);
            None
        }
    }
}

fn do_check(file: &str, no_color: bool) -> i32 {
    let Some(input) = read_input(file) else {
        return 1;
    };
    match parse(&input, no_color) {
        Some(document) => {
            eprintln!(
                "ok: {} parsed successfully ({} fragments)",
                file,
                document.fragments().len()
            );
            0
        }
        None => 1,
    }
}

fn do_ast(file: &str, no_color: bool) -> i32 {
    let Some(input) = read_input(file) else {
        return 1;
    };
    match parse(&input, no_color) {
        Some(document) => {
            println!("{:#?}", document);
            0
        }
        None => 1,
    }
}

fn do_render(args: RenderArgs, no_color: bool) -> i32 {
    let Some(input) = read_input(&args.file) else {
        return 1;
    };
    let path = Path::new(&args.file);
    let options = CompileOptions {
        formats: args.to.clone(),
        source_id: input.file_id,
        ..CompileOptions::for_path(path)
    };

    let compilation = match render::compile(&input.source, &options) {
        Ok(compilation) => compilation,
        Err(error) => {
            emit_compile_error(&input.files, &error, no_color);
            return 1;
        }
    };

    let writer = StandardStream::stderr(color_choice(no_color));
    let config = term::Config::default();
    for warning in &compilation.warnings {
        emit_warning(&writer, &config, &input.files, input.file_id, warning);
    }

    if args.stdout {
        for artifact in compilation.artifacts.iter().filter(|a| a.is_document()) {
            print!("{}", artifact.content);
        }
        return 0;
    }

    let dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| options.base_dir.clone());
    match render::write_all(&compilation.artifacts, &dir) {
        Ok(written) => {
            if !args.quiet {
                for (path, artifact) in written.iter().zip(&compilation.artifacts) {
                    if artifact.is_document() {
                        eprintln!("output: {}", path.display());
                    }
                }
            }
            0
        }
        Err(error) => {
            eprintln!("error: {}", error);
            1
        }
    }
}

fn emit_parse_errors(
    files: &SimpleFiles<String, String>,
    errors: &[weave::ParseError],
    no_color: bool,
) {
    let writer = StandardStream::stderr(color_choice(no_color));
    let config = term::Config::default();
    for error in errors {
        let diagnostic = error.to_diagnostic();
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, &diagnostic);
    }
}

fn emit_compile_error(files: &SimpleFiles<String, String>, error: &CompileError, no_color: bool) {
    match error {
        CompileError::Parse(errors) => emit_parse_errors(files, errors, no_color),
        CompileError::Evaluation(error) => emit_evaluation_error(files, error, no_color),
        other => eprintln!("error: {}", other),
    }
}

fn emit_evaluation_error(
    files: &SimpleFiles<String, String>,
    error: &FragmentEvaluationError,
    no_color: bool,
) {
    let writer = StandardStream::stderr(color_choice(no_color));
    let config = term::Config::default();
    let diagnostic = Diagnostic::error()
        .with_message(format!("error in {}", error.location))
        .with_labels(vec![
            Label::primary(error.source_id, error.span.clone())
                .with_message(error.error.to_string()),
        ])
        .with_notes(vec![format!("failed at line {}", error.line)]);
    let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, &diagnostic);
}

fn emit_warning(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    file_id: usize,
    warning: &Warning,
) {
    match &warning.span {
        Some(span) => {
            let diagnostic = Diagnostic::new(Severity::Warning)
                .with_message(warning.to_string())
                .with_labels(vec![Label::primary(file_id, span.clone())]);
            let _ = term::emit_to_write_style(&mut writer.lock(), config, files, &diagnostic);
        }
        None => eprintln!("warning: {}", warning),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(args: &[&str]) -> Vec<String> {
        let mut argv = vec!["weave".to_string()];
        argv.extend(args.iter().map(|a| a.to_string()));
        with_default_subcommand(argv)
    }

    #[test]
    fn bare_files_get_the_render_subcommand() {
        assert_eq!(expand(&["doc.Rmd"]), ["weave", "render", "doc.Rmd"]);
        assert_eq!(
            expand(&["-t", "html", "doc.Rmd"]),
            ["weave", "render", "-t", "html", "doc.Rmd"]
        );
        assert_eq!(
            expand(&["--no-color", "--to", "latex", "-o", "out", "doc.Rmd"]),
            ["weave", "render", "--no-color", "--to", "latex", "-o", "out", "doc.Rmd"]
        );
        assert_eq!(expand(&["--to=html", "doc.Rmd"]), ["weave", "render", "--to=html", "doc.Rmd"]);
    }

    #[test]
    fn explicit_subcommands_are_left_alone() {
        assert_eq!(expand(&["check", "doc.Rmd"]), ["weave", "check", "doc.Rmd"]);
        assert_eq!(
            expand(&["--no-color", "render", "doc.Rmd", "-t", "html"]),
            ["weave", "--no-color", "render", "doc.Rmd", "-t", "html"]
        );
        assert_eq!(expand(&["--version"]), ["weave", "--version"]);
    }

    #[test]
    fn option_values_are_not_subcommands() {
        // `render` here is the format value, not a subcommand.
        assert_eq!(
            expand(&["-t", "render", "doc.Rmd"]),
            ["weave", "render", "-t", "render", "doc.Rmd"]
        );
    }
}
