//! A small interactive shell built around a pipeline execution engine.
//!
//! A submitted line is split on unquoted pipes, every segment is tokenized and
//! stripped of its redirections, and the resulting stages are run either as
//! in-process builtins or as external programs found on `PATH`. Stages of a
//! pipeline are connected with OS pipes and background pump threads, so
//! builtins and external processes can be freely mixed.
//!
//! The main entry point is [`Interpreter`], which owns the [`env::Environment`]
//! and the [`history::HistoryStore`] and exposes both a line-at-a-time API and
//! an interactive REPL.

mod builtin;
pub mod command;
mod completion;
pub mod env;
pub mod error;
mod external;
pub mod history;
mod interpreter;
mod io_adapters;
pub mod lexer;
pub mod parser;
mod pipeline;

pub use builtin::Builtin;
pub use external::{Resolution, resolve};

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API.
pub use interpreter::Interpreter;
