use crate::builtin::Builtin;
use crate::env::Environment;
use std::borrow::Cow;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// What a command name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// One of the shell's own commands. These shadow executables of the same name.
    Builtin(Builtin),
    /// An executable file.
    External(PathBuf),
    NotFound,
}

/// Resolve a command name in the given environment.
///
/// Builtin names are never looked up on `PATH`. A leading `~` is expanded
/// against `HOME` before any lookup.
pub fn resolve(env: &Environment, name: &str) -> Resolution {
    if let Some(builtin) = Builtin::from_name(name) {
        return Resolution::Builtin(builtin);
    }
    let expanded = env.expand_tilde(name);
    let search_paths = env.search_path();
    let found = find_command_path(OsStr::new(&search_paths), &expanded, &env.current_dir)
        .map(Cow::into_owned);
    match found {
        Some(path) => {
            tracing::debug!(command = name, path = %path.display(), "resolved executable");
            Resolution::External(path)
        }
        None => {
            tracing::debug!(command = name, "command not found");
            Resolution::NotFound
        }
    }
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it is an executable file.
/// - Any path containing a separator (e.g., `bin/sh`, `./foo`): checked
///   relative to `current_dir` and returned if it is an executable file.
/// - Single path component (no separators): search each directory in
///   `search_paths` (PATH) and return the first executable match.
/// - Empty path: returns `None`.
///
/// Returns either a borrowed reference to the provided `path` or an owned `PathBuf`
/// when the result is discovered via PATH lookup or relative to `current_dir`.
pub fn find_command_path<'a>(
    search_paths: &OsStr,
    path: &'a Path,
    current_dir: &Path,
) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        // Empty path -> not found
        (None, _) => None,
        // Single component -> search in PATH
        (Some(x), None) if !path.to_string_lossy().ends_with('/') => {
            find_in_path(search_paths, x.as_os_str()).map(Cow::Owned)
        }
        // Multiple components -> search in current dir
        _ => {
            let joined = current_dir.join(path);
            find_by_path(&joined).map(|p| Cow::Owned(p.to_owned()))
        }
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(cmd))
        .find(|candidate| is_executable(candidate))
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if is_executable(path) { Some(path) } else { None }
}

/// A regular file with an execute bit set.
///
/// Anything that cannot be stat-ed, for example inside a directory we may not
/// search, simply does not count.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Exit code to report for a finished child process.
pub fn exit_code_of(exit_status: ExitStatus) -> i32 {
    match exit_status.code() {
        Some(x) => x,
        None => terminated_by_signal(exit_status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}
