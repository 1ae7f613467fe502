//! # Scanning files for TODOs.
//!
//! Bytes are decoded by [`runes`], split into comments by [`comments`] using
//! the syntax tables in [`langs`], and matched against TODO patterns by
//! [`todos`]. This module glues those together per file.
use futures::StreamExt;
use snafu::prelude::*;
use std::path::{Path, PathBuf};

use crate::{
    finder::FileSearcher, Error, IoSnafu, JoinSnafu, Message, Result, UnsupportedFileSnafu,
};

pub mod comments;
pub mod langs;
pub mod runes;
pub mod todos;

use comments::CommentScanner;
use runes::{Charset, Encoding};
use todos::{Todo, TodoScanner};

pub use todos::DEFAULT_TODO_TYPES;

/// Everything that controls a scan.
#[derive(Clone, Debug)]
pub struct ScanOptions {
    /// Annotation types to look for, eg. "TODO".
    pub todo_types: Vec<String>,
    pub charset: Charset,
    /// Include hidden files and directories.
    pub hidden: bool,
    /// Honour `.gitignore` and `.ignore` files.
    pub respect_ignore: bool,
    /// Globs of files or directories to skip.
    pub excludes: Vec<String>,
    /// How many files to scan at once.
    pub jobs: usize,
    /// Send a [`Message`] for each stage of [`scan_paths`]. Leave this off
    /// unless something drains [`Message::receiver`].
    pub progress: bool,
}

impl ScanOptions {
    pub(crate) fn report(&self, msg: Message) {
        if self.progress {
            msg.send();
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            todo_types: DEFAULT_TODO_TYPES.iter().map(|s| s.to_string()).collect(),
            charset: Charset::Auto,
            hidden: false,
            respect_ignore: true,
            excludes: vec![],
            jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            progress: false,
        }
    }
}

/// The TODOs found in one file.
#[derive(Debug)]
pub struct FileTodos {
    pub path: PathBuf,
    /// Name of the detected language.
    pub language: &'static str,
    pub encoding: Encoding,
    pub todos: Vec<Todo>,
    /// The error that cut the scan short, if any. TODOs found before it are
    /// still in `todos`.
    pub error: Option<Error>,
}

impl FileTodos {
    /// Scan the contents of a file. The language is detected from `path`.
    ///
    /// ```rust
    /// use todo_scanner_lib::parser::{FileTodos, ScanOptions};
    ///
    /// let src = b"# TODO(ops): rotate keys\necho '# TODO: not this one'\n";
    /// let file = FileTodos::from_bytes("deploy.sh", src, &ScanOptions::default()).unwrap();
    /// assert_eq!(file.language, "Shell");
    /// assert_eq!(file.todos.len(), 1);
    /// assert_eq!(file.todos[0].label, "ops");
    /// ```
    pub fn from_bytes(
        path: impl Into<PathBuf>,
        bytes: &[u8],
        options: &ScanOptions,
    ) -> Result<FileTodos> {
        let path = path.into();
        let language =
            langs::language_for_path(&path).context(UnsupportedFileSnafu { path: &path })?;
        let encoding = options.charset.resolve(bytes);
        log::trace!("Scanning {path:?} as {} ({encoding})", language.name);

        let comments = CommentScanner::from_bytes(bytes, encoding, language);
        let mut scanner = TodoScanner::new(comments, options.todo_types.iter());
        let mut todos = vec![];
        let error = loop {
            match scanner.next_todo() {
                Ok(Some(todo)) => todos.push(todo),
                Ok(None) => break None,
                Err(e) => {
                    log::debug!("Scan of {path:?} stopped early: {e}");
                    break Some(e);
                }
            }
        };

        Ok(FileTodos {
            path,
            language: language.name,
            encoding,
            todos,
            error,
        })
    }

    /// Read and scan a file. The scan runs on the blocking thread pool.
    pub async fn from_file(path: impl AsRef<Path>, options: &ScanOptions) -> Result<FileTodos> {
        let path = path.as_ref();
        // Don't bother reading files we can't scan.
        ensure!(
            langs::language_for_path(path).is_some(),
            UnsupportedFileSnafu { path }
        );
        log::trace!("Reading {path:?}");
        let bytes = tokio::fs::read(path).await.context(IoSnafu { path })?;
        let path = path.to_path_buf();
        let options = options.clone();
        tokio::task::spawn_blocking(move || FileTodos::from_bytes(path, &bytes, &options))
            .await
            .context(JoinSnafu)?
    }
}

/// The results of scanning many files.
#[derive(Debug, Default)]
pub struct ScanSummary {
    /// Every scanned file, sorted by path.
    pub files: Vec<FileTodos>,
    /// Files with no known language.
    pub unsupported: Vec<PathBuf>,
    /// Files that could not be scanned at all.
    pub errors: Vec<(PathBuf, Error)>,
}

impl ScanSummary {
    pub fn total(&self) -> usize {
        self.files.iter().map(|file| file.todos.len()).sum()
    }

    /// Whether any file failed to scan, completely or part way.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || self.files.iter().any(|file| file.error.is_some())
    }

    /// All TODOs, in path then line order.
    pub fn todos(&self) -> impl Iterator<Item = (&Path, &Todo)> + '_ {
        self.files.iter().flat_map(|file| {
            file.todos
                .iter()
                .map(move |todo| (file.path.as_path(), todo))
        })
    }
}

/// Find and scan every file under the given paths.
pub async fn scan_paths(paths: &[PathBuf], options: &ScanOptions) -> Result<ScanSummary> {
    options.report(Message::FindingFiles);
    let found = FileSearcher::find(paths, options).await?;
    options.report(Message::FoundFiles { count: found.len() });

    let mut results = futures::stream::iter(found)
        .map(|path| async move {
            let result = FileTodos::from_file(&path, options).await;
            if let Ok(file) = result.as_ref() {
                options.report(Message::ScannedFile {
                    todos: file.todos.len(),
                });
            }
            (path, result)
        })
        .buffer_unordered(options.jobs.max(1))
        .collect::<Vec<_>>()
        .await;
    results.sort_by(|a, b| a.0.cmp(&b.0));

    let mut summary = ScanSummary::default();
    for (path, result) in results.into_iter() {
        match result {
            Ok(file) => {
                if let Some(error) = file.error.as_ref() {
                    options.report(Message::ScanError {
                        path: path.clone(),
                        error: error.to_string(),
                    });
                }
                summary.files.push(file);
            }
            Err(Error::UnsupportedFile { .. }) => {
                log::debug!("Skipping {path:?}, no known language");
                options.report(Message::UnsupportedFile { path: path.clone() });
                summary.unsupported.push(path);
            }
            Err(error) => {
                options.report(Message::ScanError {
                    path: path.clone(),
                    error: error.to_string(),
                });
                summary.errors.push((path, error));
            }
        }
    }

    options.report(Message::FoundTodos {
        files: summary.files.iter().filter(|f| !f.todos.is_empty()).count(),
        total: summary.total(),
    });
    Ok(summary)
}
