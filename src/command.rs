/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Exit code reported when the terminal stage of a line names no known command.
pub const EXIT_NOT_FOUND: ExitCode = 127;

/// Exit code reported when a resolved executable could not be started.
pub const EXIT_CANNOT_EXECUTE: ExitCode = 126;

/// One stage of a pipeline, with its redirections already split off.
///
/// For each of stdout and stderr only the last redirection seen on the line
/// is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Command name, never empty.
    pub command: String,
    /// Arguments following the command name.
    pub args: Vec<String>,
    /// Target of a `>`, `1>`, `>>` or `1>>` redirection.
    pub output_file: Option<String>,
    /// Target of a `2>` or `2>>` redirection.
    pub error_file: Option<String>,
    /// Whether `output_file` is opened in append mode.
    pub append_output: bool,
    /// Whether `error_file` is opened in append mode.
    pub append_error: bool,
}

/// Outcome of one builtin invocation or of the terminal stage of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: ExitCode,
    /// Text meant for standard output.
    pub output: Option<String>,
    /// Text meant for standard error.
    pub error: Option<String>,
}

impl CommandResult {
    /// A successful result carrying `output`.
    pub fn output(output: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            output: Some(output.into()),
            error: None,
        }
    }

    /// A result carrying only error text.
    ///
    /// Builtins report their failures this way with exit code 0; the error
    /// channel is what tells the user something went wrong.
    pub fn error(exit_code: ExitCode, error: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: None,
            error: Some(error.into()),
        }
    }

    /// A successful result with no text at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A result carrying only an exit code.
    pub fn with_code(exit_code: ExitCode) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }
}
