//! Tab completion of command names for the line editor.

use crate::builtin::Builtin;
use crate::external::is_executable;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use std::collections::BTreeSet;
use std::env;
use std::fs;

/// Completes the command word against builtins and executables on `PATH`.
pub(crate) struct ShellHelper {
    search_path: String,
}

impl ShellHelper {
    pub(crate) fn new(search_path: String) -> Self {
        Self { search_path }
    }
}

/// Every command name starting with `prefix`, each followed by a space,
/// sorted and without duplicates.
pub(crate) fn candidates(prefix: &str, search_path: &str) -> Vec<String> {
    let mut names: BTreeSet<String> = Builtin::ALL
        .iter()
        .map(|builtin| builtin.name())
        .filter(|name| name.starts_with(prefix))
        .map(str::to_string)
        .collect();

    for dir in env::split_paths(search_path) {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with(prefix) && is_executable(&entry.path()) {
                names.insert(name);
            }
        }
    }

    names.into_iter().map(|name| format!("{name} ")).collect()
}

/// Narrow several matches down to their shared prefix when it says more than
/// what has been typed.
pub(crate) fn collapse(typed: &str, matches: Vec<String>) -> Vec<String> {
    if matches.len() < 2 {
        return matches;
    }
    let prefix = common_prefix(&matches);
    if prefix.len() > typed.len() {
        vec![prefix.to_string()]
    } else {
        matches
    }
}

fn common_prefix(words: &[String]) -> &str {
    let Some((first, rest)) = words.split_first() else {
        return "";
    };
    let mut len = first.len();
    for word in rest {
        len = first
            .char_indices()
            .zip(word.chars())
            .take_while(|((_, a), b)| a == b)
            .map(|((i, a), _)| i + a.len_utf8())
            .last()
            .unwrap_or(0)
            .min(len);
    }
    &first[..len]
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let before = &line[..pos];
        let start = before.len() - before.trim_start().len();
        let word = &before[start..];
        // Only the command word is completed.
        if word.contains(char::is_whitespace) {
            return Ok((pos, Vec::new()));
        }

        let pairs = collapse(word, candidates(word, &self.search_path))
            .into_iter()
            .map(|name| Pair {
                display: name.trim_end().to_string(),
                replacement: name,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}
