//! Error types for the fallible internals of the shell.
//!
//! None of these ever stop the interpreter. They are rendered into the text
//! written on the error channel of the command that failed.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while turning a segment of input into a command.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParsingError {
    /// The segment contained no words at all.
    #[error("empty command")]
    EmptyCommand,
}

/// Errors raised while running commands or persisting history.
#[derive(Debug, Error)]
pub enum ShellError {
    /// A redirection target could not be opened.
    #[error("{}: {source}", path.display())]
    Redirect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A resolved executable failed to start.
    #[error("{command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Reading or writing a history file failed.
    #[error("history: {}: {source}", path.display())]
    History {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result alias for operations that fail with a [`ShellError`].
pub type Result<T, E = ShellError> = std::result::Result<T, E>;
