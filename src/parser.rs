//! Turns tokenized pipeline segments into [`ParsedCommand`]s.

use crate::command::ParsedCommand;
use crate::error::ParsingError;
use crate::lexer;

/// Redirection waiting for its target word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RedirectKind {
    None,
    Output,
    AppendOutput,
    Error,
    AppendError,
}

impl RedirectKind {
    fn from_operator(token: &str) -> Option<Self> {
        match token {
            ">" | "1>" => Some(RedirectKind::Output),
            ">>" | "1>>" => Some(RedirectKind::AppendOutput),
            "2>" => Some(RedirectKind::Error),
            "2>>" => Some(RedirectKind::AppendError),
            _ => None,
        }
    }
}

/// Builds a command from its words, pulling out redirection operators.
///
/// The first word is always the command name. An operator consumes the next
/// word as its target; an operator at the very end is ignored.
pub fn construct_command(tokens: Vec<String>) -> Result<ParsedCommand, ParsingError> {
    let mut tokens = tokens.into_iter();
    let command = tokens.next().ok_or(ParsingError::EmptyCommand)?;
    let mut parsed = ParsedCommand {
        command,
        ..ParsedCommand::default()
    };

    let mut pending = RedirectKind::None;
    for token in tokens {
        if let Some(kind) = RedirectKind::from_operator(&token) {
            pending = kind;
            continue;
        }
        match pending {
            RedirectKind::None => parsed.args.push(token),
            RedirectKind::Output | RedirectKind::AppendOutput => {
                parsed.append_output = pending == RedirectKind::AppendOutput;
                parsed.output_file = Some(token);
            }
            RedirectKind::Error | RedirectKind::AppendError => {
                parsed.append_error = pending == RedirectKind::AppendError;
                parsed.error_file = Some(token);
            }
        }
        pending = RedirectKind::None;
    }

    Ok(parsed)
}

/// Parses one pipeline segment.
pub fn parse_command(segment: &str) -> Result<ParsedCommand, ParsingError> {
    construct_command(lexer::split_into_tokens(segment))
}

/// Parses a whole line into its pipeline stages.
///
/// A blank line is an [`ParsingError::EmptyCommand`]; the result is otherwise
/// never empty.
pub fn parse_pipeline(line: &str) -> Result<Vec<ParsedCommand>, ParsingError> {
    let stages = lexer::split_pipeline(line)
        .iter()
        .map(|segment| parse_command(segment))
        .collect::<Result<Vec<_>, _>>()?;
    if stages.is_empty() {
        return Err(ParsingError::EmptyCommand);
    }
    Ok(stages)
}
