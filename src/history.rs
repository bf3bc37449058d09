//! In-memory command history with newline-delimited file persistence.

use crate::error::{Result, ShellError};
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Ordered log of submitted command lines.
///
/// Entries are never removed. The store remembers how far the last
/// [`append_to`](HistoryStore::append_to) got so that repeated appends to a
/// file never write the same entry twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStore {
    entries: Vec<String>,
    last_append: Option<usize>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submitted line.
    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push(line.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render entries for display, numbered from 1 and indented by four spaces.
    ///
    /// With `last = Some(n)` only the final `n` entries are shown, keeping
    /// their original numbers.
    pub fn render(&self, last: Option<usize>) -> String {
        let start = last.map_or(0, |n| self.entries.len().saturating_sub(n));
        let mut out = String::new();
        for (index, line) in self.entries.iter().enumerate().skip(start) {
            let _ = writeln!(out, "    {}  {}", index + 1, line);
        }
        out
    }

    /// Append every line of `path` to the store.
    pub fn read_from(&mut self, path: &Path) -> Result<usize> {
        let content = fs::read_to_string(path).map_err(|source| history_error(path, source))?;
        let before = self.entries.len();
        self.entries.extend(content.lines().map(str::to_string));
        let added = self.entries.len() - before;
        tracing::debug!(path = %path.display(), added, "read history");
        Ok(added)
    }

    /// Replace the content of `path` with the whole store.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, join_lines(&self.entries)).map_err(|source| history_error(path, source))?;
        tracing::debug!(path = %path.display(), entries = self.entries.len(), "wrote history");
        Ok(())
    }

    /// Append the entries recorded since the previous call to `path`.
    ///
    /// The first call appends everything. The cursor only moves once the write
    /// succeeded.
    pub fn append_to(&mut self, path: &Path) -> Result<usize> {
        let start = self.last_append.unwrap_or(0);
        let pending = &self.entries[start..];
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| history_error(path, source))?;
        file.write_all(join_lines(pending).as_bytes())
            .map_err(|source| history_error(path, source))?;
        let appended = pending.len();
        self.last_append = Some(self.entries.len());
        tracing::debug!(path = %path.display(), appended, "appended history");
        Ok(appended)
    }
}

fn join_lines(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn history_error(path: &Path, source: std::io::Error) -> ShellError {
    ShellError::History {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(lines: &[&str]) -> HistoryStore {
        let mut history = HistoryStore::new();
        for line in lines {
            history.push(*line);
        }
        history
    }

    #[test]
    fn test_render_all() {
        let history = store(&["echo a", "pwd"]);
        assert_eq!(history.render(None), "    1  echo a\n    2  pwd\n");
    }

    #[test]
    fn test_render_last_n_keeps_numbers() {
        let history = store(&["a", "b", "c"]);
        assert_eq!(history.render(Some(2)), "    2  b\n    3  c\n");
        assert_eq!(history.render(Some(10)), history.render(None));
        assert_eq!(history.render(Some(0)), "");
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hist");
        let original = store(&["echo 'x y'", "ls | wc -l", "history -w f"]);
        original.write_to(&path).unwrap();

        let mut loaded = HistoryStore::new();
        assert_eq!(loaded.read_from(&path).unwrap(), 3);
        assert_eq!(loaded.entries(), original.entries());
    }

    #[test]
    fn test_write_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hist");
        fs::write(&path, "old\nstuff\n").unwrap();
        store(&["new"]).write_to(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[test]
    fn test_read_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let mut history = store(&["a"]);
        let err = history.read_from(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, ShellError::History { .. }));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_append_only_writes_new_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hist");
        let mut history = store(&["first", "history -a hist"]);

        assert_eq!(history.append_to(&path).unwrap(), 2);
        history.push("echo next");
        history.push("history -a hist");
        assert_eq!(history.append_to(&path).unwrap(), 2);
        assert_eq!(history.append_to(&path).unwrap(), 0);

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "first\nhistory -a hist\necho next\nhistory -a hist\n"
        );
    }

    #[test]
    fn test_append_after_one_new_entry_writes_one_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hist");
        let mut history = store(&["a", "b"]);
        history.append_to(&path).unwrap();
        history.push("c");
        assert_eq!(history.append_to(&path).unwrap(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\nc\n");
    }
}
