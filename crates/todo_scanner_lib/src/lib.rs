use snafu::prelude::*;
use std::{path::PathBuf, sync::LazyLock};

use parser::runes::Encoding;

pub mod finder;
pub mod parser;

static CHAN: LazyLock<(
    async_channel::Sender<Message>,
    async_channel::Receiver<Message>,
)> = LazyLock::new(async_channel::unbounded);

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Could not decode {encoding} at byte {offset}"))]
    Decode { offset: usize, encoding: Encoding },

    #[snafu(display("Cannot look {requested} runes ahead, the maximum is {max}"))]
    PeekTooLarge { requested: usize, max: usize },

    #[snafu(display("Unsupported language '{name}'"))]
    UnsupportedLanguage { name: String },

    #[snafu(display("No known language for {path:?}"))]
    UnsupportedFile { path: PathBuf },

    #[snafu(display("Unknown charset '{name}', expected auto, utf-8, utf-16le or utf-16be"))]
    InvalidCharset { name: String },

    #[snafu(display("IO error at {path:?}: {source}"))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Walk error: {source}"))]
    Walk { source: ignore::Error },

    #[snafu(display("Background task failed: {source}"))]
    Join { source: tokio::task::JoinError },
}

pub(crate) type Result<T, E = Error> = core::result::Result<T, E>;

/// An external progress message sent from the todo scanner.
pub enum Message {
    Error(Error),

    FindingFiles,
    FoundFiles {
        count: usize,
    },

    UnsupportedFile {
        path: PathBuf,
    },
    ScanError {
        path: PathBuf,
        error: String,
    },
    ScannedFile {
        todos: usize,
    },
    FoundTodos {
        files: usize,
        total: usize,
    },

    Goodbye,
}

impl Message {
    /// Send a status message to the outside world.
    pub fn send(self) {
        // UNWRAP: safe because this channel is unbounded.
        CHAN.0.try_send(self).unwrap();
    }

    /// Get a clone of the status message receiver.
    pub fn receiver() -> async_channel::Receiver<Message> {
        CHAN.1.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_display() {
        let err = Error::Decode {
            offset: 3,
            encoding: Encoding::Utf16Le,
        };
        assert_eq!(err.to_string(), "Could not decode UTF-16LE at byte 3");

        let err = "latin1".parse::<parser::runes::Charset>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown charset 'latin1', expected auto, utf-8, utf-16le or utf-16be"
        );
    }
}
