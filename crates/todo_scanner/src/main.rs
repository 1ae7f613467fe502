use clap::Parser;
use console::Style;
use futures::FutureExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use todo_scanner_lib::{
    parser::{
        runes::Charset, scan_paths, todos::Todo, ScanOptions, ScanSummary, DEFAULT_TODO_TYPES,
    },
    Message,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Output {
    /// `path:line:text`
    #[default]
    Default,
    /// GitHub workflow warning annotations
    Github,
    /// One JSON object per line
    Json,
}

#[derive(clap::Parser, Debug)]
#[command(
    version,
    about,
    author,
    help_template(
        "\
{before-help}{name} {version} by {author-with-newline}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}"
    )
)]
struct Cli {
    /// Files or directories to scan.
    #[clap(default_value = ".")]
    paths: Vec<PathBuf>,

    #[clap(
        short,
        long,
        value_delimiter = ',',
        default_values_t = DEFAULT_TODO_TYPES.iter().map(|s| s.to_string())
    )]
    /// Comma separated annotation types to look for.
    todo_types: Vec<String>,

    #[clap(short, long)]
    /// Glob of files or directories to skip, may be supplied multiple times.
    exclude: Vec<String>,

    #[clap(long)]
    /// Scan hidden files and directories.
    hidden: bool,

    #[clap(long)]
    /// Don't honour .gitignore and .ignore files.
    no_ignore: bool,

    #[clap(long, default_value = "auto")]
    /// Encoding of the scanned files: auto, utf-8, utf-16le or utf-16be.
    charset: Charset,

    #[clap(short, long, value_enum, default_value_t)]
    /// How to print the TODOs.
    output: Output,

    #[clap(short, long)]
    /// How many files to scan at once, defaults to the number of CPUs.
    jobs: Option<usize>,
}

impl Cli {
    fn scan_options(&self) -> ScanOptions {
        let defaults = ScanOptions::default();
        ScanOptions {
            todo_types: self.todo_types.clone(),
            charset: self.charset,
            hidden: self.hidden,
            respect_ignore: !self.no_ignore,
            excludes: self.exclude.clone(),
            jobs: self.jobs.unwrap_or(defaults.jobs),
            progress: true,
        }
    }
}

#[derive(Serialize)]
struct JsonTodo<'a> {
    path: String,
    #[serde(flatten)]
    todo: &'a Todo,
}

fn format_todo(output: Output, path: &Path, todo: &Todo) -> String {
    match output {
        Output::Default => format!("{}:{}:{}", path.display(), todo.line, todo.text.trim()),
        Output::Github => format!(
            "::warning file={},line={}::{}",
            path.display(),
            todo.line,
            todo.text.trim()
        ),
        // UNWRAP: safe because strings and numbers always serialize.
        Output::Json => serde_json::to_string(&JsonTodo {
            path: path.display().to_string(),
            todo,
        })
        .unwrap(),
    }
}

struct Printer {
    red: Style,
    yellow: Style,
    green: Style,
    dim: Style,
    unsupported: usize,
    found_todos_progress: ProgressBar,
}

impl Default for Printer {
    fn default() -> Self {
        let spinner_style = ProgressStyle::with_template("{spinner} {wide_msg}")
            .unwrap()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");
        let found_todos_progress = ProgressBar::new_spinner();
        found_todos_progress.set_style(spinner_style);

        Self {
            red: Style::new().red(),
            yellow: Style::new().yellow(),
            green: Style::new().green(),
            dim: Style::new().dim(),
            unsupported: 0,
            found_todos_progress,
        }
    }
}

impl Printer {
    fn print(&mut self, msg: Message) {
        use Message::*;

        match msg {
            Error(err) => {
                self.found_todos_progress.finish_and_clear();
                eprintln!("{}", self.red.apply_to(err.to_string()));
            }

            FindingFiles => eprintln!("Finding files..."),
            FoundFiles { count } => eprintln!("  found {count} files"),

            UnsupportedFile { path } => {
                log::debug!("no known language for {path:?}");
                self.unsupported += 1;
            }
            ScanError { path, error } => {
                self.found_todos_progress.suspend(|| {
                    eprintln!(
                        "{} {}",
                        self.yellow.apply_to(format!("  could not scan {}:", path.display())),
                        self.dim.apply_to(error)
                    );
                });
            }
            ScannedFile { todos } => {
                self.found_todos_progress.inc(todos as u64);
                self.found_todos_progress.set_message(format!(
                    "Found {} TODOs",
                    self.found_todos_progress.position()
                ));
            }
            FoundTodos { files, total } => {
                self.found_todos_progress.finish_and_clear();
                if self.unsupported > 0 {
                    eprintln!(
                        "{}",
                        self.dim.apply_to(format!(
                            "  skipped {} files with no known language",
                            self.unsupported
                        ))
                    );
                }
                eprintln!("Found {total} TODOs in {files} files");
            }

            Goodbye => {
                eprintln!("🏁 {}", self.green.apply_to("All done!"));
            }
        }
    }

    async fn message_loop(&mut self, handle: &tokio::task::JoinHandle<Option<ScanSummary>>) {
        let recv = Message::receiver();
        loop {
            let mut timeout =
                std::pin::pin!(tokio::time::sleep(std::time::Duration::from_secs(1)).fuse());
            let mut get_msg = std::pin::pin!(recv.recv().fuse());
            futures::select! {
                msg = get_msg => if let Ok(msg) = msg {
                    self.print(msg);
                },
                _ = timeout => {}
            }
            if handle.is_finished() {
                break;
            }
        }
        while let Ok(msg) = recv.try_recv() {
            self.print(msg);
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    env_logger::builder().init();

    let cli = Cli::parse();
    let options = cli.scan_options();
    let output = cli.output;
    log::debug!("{cli:#?}");

    eprintln!("🌈 Starting todo_scanner...");

    let mut printer = Printer::default();
    let handle = tokio::task::spawn(async move {
        match scan_paths(&cli.paths, &options).await {
            Ok(summary) => Some(summary),
            Err(err) => {
                Message::Error(err).send();
                None
            }
        }
    });

    // While the scanner is working, print the messages to the terminal
    printer.message_loop(&handle).await;
    let summary = match handle.await {
        Ok(Some(summary)) => summary,
        Ok(None) => return std::process::ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{}", printer.red.apply_to(err.to_string()));
            return std::process::ExitCode::FAILURE;
        }
    };

    for (path, todo) in summary.todos() {
        println!("{}", format_todo(output, path, todo));
    }
    printer.print(Message::Goodbye);

    if summary.has_errors() {
        std::process::ExitCode::FAILURE
    } else {
        std::process::ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo() -> Todo {
        Todo {
            kind: "TODO".into(),
            text: "    // TODO(#4): tidy up".into(),
            label: "#4".into(),
            message: "tidy up".into(),
            line: 7,
            comment_line: 7,
        }
    }

    #[test]
    fn formats_todos() {
        let path = Path::new("src/lib.rs");
        assert_eq!(
            format_todo(Output::Default, path, &todo()),
            "src/lib.rs:7:// TODO(#4): tidy up"
        );
        assert_eq!(
            format_todo(Output::Github, path, &todo()),
            "::warning file=src/lib.rs,line=7::// TODO(#4): tidy up"
        );
        let json: serde_json::Value =
            serde_json::from_str(&format_todo(Output::Json, path, &todo())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "path": "src/lib.rs",
                "type": "TODO",
                "text": "    // TODO(#4): tidy up",
                "label": "#4",
                "message": "tidy up",
                "line": 7,
                "comment_line": 7,
            })
        );
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from(["todo_scanner"]);
        assert_eq!(cli.paths, vec![PathBuf::from(".")]);
        assert_eq!(cli.todo_types.len(), DEFAULT_TODO_TYPES.len());
        assert_eq!(cli.output, Output::Default);

        let cli = Cli::parse_from([
            "todo_scanner",
            "src",
            "tests",
            "--todo-types",
            "TODO,NOTE",
            "--exclude",
            "*.md",
            "--no-ignore",
            "--charset",
            "utf-16le",
            "--output",
            "json",
            "--jobs",
            "2",
        ]);
        let options = cli.scan_options();
        assert_eq!(cli.paths.len(), 2);
        assert_eq!(options.todo_types, vec!["TODO", "NOTE"]);
        assert_eq!(options.excludes, vec!["*.md"]);
        assert!(!options.respect_ignore);
        assert!(!options.hidden);
        assert_eq!(options.jobs, 2);
        assert!(options.progress);
        assert_eq!(cli.output, Output::Json);
    }

    #[test]
    fn rejects_unknown_charsets() {
        assert!(Cli::try_parse_from(["todo_scanner", "--charset", "latin1"]).is_err());
    }
}
