use crate::command::ExitCode;
use crate::completion::ShellHelper;
use crate::env::Environment;
use crate::history::HistoryStore;
use crate::io_adapters::{Sink, open_redirect};
use crate::parser;
use crate::pipeline::{self, Context, Streams};
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

const PROMPT: &str = "$ ";

/// A minimal shell-like interpreter that can execute built-in and external commands.
///
/// The interpreter owns the [`Environment`] commands run in and the
/// [`HistoryStore`] of submitted lines. History is loaded from `HISTFILE` on
/// construction and written back by [`save_history`](Interpreter::save_history).
///
/// Example
/// ```
/// use pipesh::Interpreter;
/// use pipesh::env::Environment;
///
/// let mut sh = Interpreter::new(Environment::new());
/// let mut out = Vec::new();
/// let code = sh.run_line("echo hello 'big world'", &mut out, &mut std::io::sink());
/// assert_eq!(code, 0);
/// assert_eq!(out, b"hello big world\n");
/// ```
pub struct Interpreter {
    env: Environment,
    history: HistoryStore,
}

impl Interpreter {
    /// Create an interpreter, loading history from `HISTFILE` when it exists.
    pub fn new(env: Environment) -> Self {
        let mut history = HistoryStore::new();
        if let Some(path) = env.histfile().filter(|path| path.is_file()) {
            if let Err(err) = history.read_from(&path) {
                tracing::warn!(%err, "could not load history");
            }
        }
        Self { env, history }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Whether `exit` has been run.
    pub fn should_exit(&self) -> bool {
        self.env.should_exit
    }

    /// Record a submitted line in history, then run it.
    pub fn accept_line(&mut self, line: &str, out: &mut dyn Write, err: &mut dyn Write) -> ExitCode {
        if !line.trim().is_empty() {
            self.history.push(line);
        }
        self.run_line(line, out, err)
    }

    /// Run `line` as a whole session: record it, run it, then save history.
    pub fn run_command(&mut self, line: &str, out: &mut dyn Write, err: &mut dyn Write) -> ExitCode {
        let code = self.accept_line(line, out, err);
        self.save_history();
        code
    }

    /// Run one line of input.
    ///
    /// Output of the final stage goes to `out` and its diagnostics to `err`,
    /// unless redirected to files. External programs at the end of a line
    /// write straight to the process stdout instead of `out`.
    pub fn run_line(&mut self, line: &str, out: &mut dyn Write, err: &mut dyn Write) -> ExitCode {
        let stages = match parser::parse_pipeline(line) {
            Ok(stages) => stages,
            Err(parse_err) => {
                tracing::debug!(%parse_err, "nothing to run");
                return 0;
            }
        };
        let Some(last) = stages.last() else {
            return 0;
        };

        let opened = self
            .open_target(last.output_file.as_deref(), last.append_output)
            .and_then(|stdout| {
                let stderr = self.open_target(last.error_file.as_deref(), last.append_error)?;
                Ok((stdout, stderr))
            });
        let (out_file, err_file) = match opened {
            Ok(files) => files,
            Err(open_err) => {
                report(err, &format!("{open_err}\n"));
                return 1;
            }
        };
        let mut streams = Streams {
            stdout: sink_for(out_file, out),
            stderr: sink_for(err_file, err),
        };

        let ctx = Context {
            env: &mut self.env,
            history: &mut self.history,
        };
        let result = pipeline::execute(&stages, ctx, &streams);

        if let Err(write_err) = streams.stdout.emit(result.output.as_deref()) {
            tracing::warn!(%write_err, "failed to write command output");
        }
        if let Err(write_err) = streams.stderr.emit(result.error.as_deref()) {
            tracing::warn!(%write_err, "failed to write command error");
        }
        result.exit_code
    }

    fn open_target(&self, file: Option<&str>, append: bool) -> crate::error::Result<Option<File>> {
        file.map(|f| open_redirect(&self.env.absolutize(Path::new(f)), append))
            .transpose()
    }

    /// Write the whole history to `HISTFILE`, if set.
    pub fn save_history(&self) {
        let Some(path) = self.env.histfile() else {
            return;
        };
        if let Err(err) = self.history.write_to(&path) {
            tracing::warn!(%err, "could not save history");
        }
    }

    /// Read-Eval-Print Loop over an interactive line editor.
    ///
    /// Runs until `exit` or end of input, saves history, and returns the exit
    /// code of the last command.
    pub fn repl(&mut self) -> anyhow::Result<ExitCode> {
        let mut rl: Editor<ShellHelper, DefaultHistory> = Editor::new()?;
        rl.set_helper(Some(ShellHelper::new(self.env.search_path())));
        for entry in self.history.entries() {
            rl.add_history_entry(entry.as_str())?;
        }

        let mut code = 0;
        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    let stdout = io::stdout();
                    let stderr = io::stderr();
                    code = self.accept_line(&line, &mut stdout.lock(), &mut stderr.lock());
                    if self.should_exit() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    self.save_history();
                    return Err(err.into());
                }
            }
        }

        self.save_history();
        Ok(code)
    }
}

impl Default for Interpreter {
    /// An interpreter over the current process environment.
    fn default() -> Self {
        Self::new(Environment::new())
    }
}

fn sink_for(file: Option<File>, fallback: &mut dyn Write) -> Sink<'_> {
    match file {
        Some(file) => Sink::File(file),
        None => Sink::Writer(fallback),
    }
}

fn report(err: &mut dyn Write, text: &str) {
    if let Err(write_err) = err.write_all(text.as_bytes()) {
        tracing::warn!(%write_err, "failed to report error");
    }
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        sh: Interpreter,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_vars(HashMap::new())
        }

        fn with_vars(mut vars: HashMap<String, String>) -> Self {
            let dir = TempDir::new().unwrap();
            if let Ok(path) = std::env::var("PATH") {
                vars.entry("PATH".to_string()).or_insert(path);
            }
            let cwd = fs::canonicalize(dir.path()).unwrap();
            let sh = Interpreter::new(Environment::with_vars(vars, cwd));
            Self { dir, sh }
        }

        /// Submit a line; returns (exit code, stdout, stderr).
        fn submit(&mut self, line: &str) -> (ExitCode, String, String) {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let code = self.sh.accept_line(line, &mut out, &mut err);
            (
                code,
                String::from_utf8(out).unwrap(),
                String::from_utf8(err).unwrap(),
            )
        }

        fn read(&self, name: &str) -> String {
            fs::read_to_string(self.dir.path().join(name)).unwrap()
        }
    }

    #[test]
    fn test_echo_to_writer() {
        let mut fx = Fixture::new();
        let (code, out, err) = fx.submit(r#"echo 'a|b'   "c  d" e\ f"#);
        assert_eq!(code, 0);
        assert_eq!(out, "a|b c  d e f\n");
        assert_eq!(err, "");
    }

    #[test]
    fn test_blank_line_does_nothing() {
        let mut fx = Fixture::new();
        assert_eq!(fx.submit("   "), (0, String::new(), String::new()));
        assert!(fx.sh.history().is_empty());
    }

    #[test]
    fn test_echo_redirect_truncate_then_append() {
        let mut fx = Fixture::new();
        fx.submit("echo foo > out.txt");
        assert_eq!(fx.read("out.txt"), "foo\n");
        fx.submit("echo foo >> out.txt");
        assert_eq!(fx.read("out.txt"), "foo\nfoo\n");
        fx.submit("echo bar 1> out.txt");
        assert_eq!(fx.read("out.txt"), "bar\n");
    }

    #[test]
    fn test_error_redirect_creates_file() {
        let mut fx = Fixture::new();
        let (_, out, _) = fx.submit("echo visible 2> err.txt");
        assert_eq!(out, "visible\n");
        assert_eq!(fx.read("err.txt"), "");

        let (_, _, err) = fx.submit("type nosuchcmd_xyz 2>> err.txt");
        assert_eq!(err, "");
        assert_eq!(fx.read("err.txt"), "nosuchcmd_xyz: not found\n");
    }

    #[test]
    fn test_redirect_to_missing_directory_fails() {
        let mut fx = Fixture::new();
        let (code, out, err) = fx.submit("echo hi > no/such/dir/out.txt");
        assert_eq!(code, 1);
        assert_eq!(out, "");
        assert!(err.contains("no/such/dir/out.txt"));
    }

    #[test]
    fn test_unknown_command() {
        let mut fx = Fixture::new();
        let (code, _, err) = fx.submit("nosuchcmd_xyz --flag");
        assert_eq!(code, 127);
        assert_eq!(err, "nosuchcmd_xyz: command not found\n");
    }

    #[test]
    fn test_external_exit_code_passes_through() {
        let mut fx = Fixture::new();
        let (code, _, _) = fx.submit("sh -c 'exit 5'");
        assert_eq!(code, 5);
    }

    #[test]
    fn test_external_with_redirects() {
        let mut fx = Fixture::new();
        fx.submit("sh -c 'echo to-out; echo to-err >&2' > out.txt 2> err.txt");
        assert_eq!(fx.read("out.txt"), "to-out\n");
        assert_eq!(fx.read("err.txt"), "to-err\n");
    }

    #[test]
    fn test_builtin_into_external() {
        let mut fx = Fixture::new();
        let (code, _, _) = fx.submit("echo hello world | tr a-z A-Z > out.txt");
        assert_eq!(code, 0);
        assert_eq!(fx.read("out.txt"), "HELLO WORLD\n");
    }

    #[test]
    fn test_three_external_stages() {
        let mut fx = Fixture::new();
        fx.submit("sh -c 'echo one; echo two; echo three' | grep o | wc -l > out.txt");
        assert_eq!(fx.read("out.txt").trim(), "2");
    }

    #[test]
    fn test_large_output_does_not_deadlock() {
        let mut fx = Fixture::new();
        let (code, _, _) =
            fx.submit("sh -c 'i=0; while [ $i -lt 20000 ]; do echo line$i; i=$((i+1)); done' | cat | wc -l > out.txt");
        assert_eq!(code, 0);
        assert_eq!(fx.read("out.txt").trim(), "20000");
    }

    #[test]
    fn test_missing_middle_stage_starves_the_rest() {
        let mut fx = Fixture::new();
        let (code, _, err) = fx.submit("echo hi | nosuchcmd_xyz | wc -c > out.txt");
        assert_eq!(code, 0);
        assert_eq!(err, "");
        assert_eq!(fx.read("out.txt").trim(), "0");
    }

    #[test]
    fn test_missing_last_stage() {
        let mut fx = Fixture::new();
        let (code, out, err) = fx.submit("echo hi | nosuchcmd_xyz");
        assert_eq!(code, 127);
        assert_eq!(out, "");
        assert_eq!(err, "nosuchcmd_xyz: command not found\n");
    }

    #[test]
    fn test_last_stage_stderr_is_captured() {
        let mut fx = Fixture::new();
        let (code, _, err) = fx.submit("echo x | sh -c 'cat > /dev/null; echo oops >&2; exit 3'");
        assert_eq!(code, 3);
        assert_eq!(err, "oops\n");
    }

    #[test]
    fn test_external_into_builtin() {
        let mut fx = Fixture::new();
        let (code, out, _) = fx.submit("sh -c 'echo ignored' | echo done");
        assert_eq!(code, 0);
        assert_eq!(out, "done\n");
    }

    #[test]
    fn test_builtin_between_externals() {
        let mut fx = Fixture::new();
        fx.submit("sh -c 'echo dropped' | echo middle | cat > out.txt");
        assert_eq!(fx.read("out.txt"), "middle\n");
    }

    #[test]
    fn test_redirected_middle_stage_feeds_nothing() {
        let mut fx = Fixture::new();
        fx.submit("echo a > mid.txt | wc -c > out.txt");
        assert_eq!(fx.read("mid.txt"), "a\n");
        assert_eq!(fx.read("out.txt").trim(), "0");
    }

    #[test]
    fn test_cd_in_pipeline_leaves_directory() {
        let mut fx = Fixture::new();
        let before = fx.sh.env().current_dir.clone();
        let (_, out, _) = fx.submit("cd / | echo still");
        assert_eq!(out, "still\n");
        assert_eq!(fx.sh.env().current_dir, before);
    }

    #[test]
    fn test_exit_sets_flag_and_code() {
        let mut fx = Fixture::new();
        assert_eq!(fx.submit("exit 7").0, 7);
        assert!(fx.sh.should_exit());
    }

    #[test]
    fn test_exit_in_pipeline_does_not_stop() {
        let mut fx = Fixture::new();
        fx.submit("exit 3 | echo x");
        assert!(!fx.sh.should_exit());
    }

    #[test]
    fn test_history_records_and_lists() {
        let mut fx = Fixture::new();
        fx.submit("echo a");
        fx.submit("   ");
        let (_, out, _) = fx.submit("history");
        assert_eq!(out, "    1  echo a\n    2  history\n");
        let (_, out, _) = fx.submit("history 1");
        assert_eq!(out, "    3  history 1\n");
    }

    #[test]
    fn test_history_append_never_duplicates() {
        let mut fx = Fixture::new();
        fx.submit("echo one");
        fx.submit("history -a hist.txt");
        assert_eq!(fx.read("hist.txt"), "echo one\nhistory -a hist.txt\n");

        fx.submit("echo two");
        fx.submit("history -a hist.txt");
        assert_eq!(
            fx.read("hist.txt"),
            "echo one\nhistory -a hist.txt\necho two\nhistory -a hist.txt\n"
        );
    }

    #[test]
    fn test_history_file_round_trip_through_histfile() {
        let mut fx = Fixture::new();
        fx.submit("echo one");
        fx.submit("echo 'two three'");
        let target = fx.dir.path().join("saved");
        fx.submit(&format!("history -w {}", target.display()));
        let written: Vec<String> = fx.sh.history().entries().to_vec();

        let mut vars = HashMap::new();
        vars.insert("HISTFILE".to_string(), target.display().to_string());
        let fresh = Fixture::with_vars(vars);
        assert_eq!(fresh.sh.history().entries(), written.as_slice());
    }

    #[test]
    fn test_save_history_writes_histfile() {
        let dir = TempDir::new().unwrap();
        let histfile = dir.path().join("histfile");
        let mut vars = HashMap::new();
        vars.insert("HISTFILE".to_string(), histfile.display().to_string());
        let mut fx = Fixture::with_vars(vars);

        fx.submit("echo saved");
        fx.submit("exit");
        fx.sh.save_history();
        assert_eq!(fs::read_to_string(&histfile).unwrap(), "echo saved\nexit\n");
    }

    #[test]
    fn test_run_command_saves_history_on_exit() {
        let dir = TempDir::new().unwrap();
        let histfile = dir.path().join("hist");
        let mut vars = HashMap::new();
        vars.insert("HISTFILE".to_string(), histfile.display().to_string());
        let mut fx = Fixture::with_vars(vars);

        let code = fx.sh.run_command("exit 3", &mut io::sink(), &mut io::sink());
        assert_eq!(code, 3);
        assert!(fx.sh.should_exit());
        assert_eq!(fs::read_to_string(&histfile).unwrap(), "exit 3\n");
    }

    #[test]
    fn test_run_command_keeps_loaded_history() {
        let dir = TempDir::new().unwrap();
        let histfile = dir.path().join("hist");
        fs::write(&histfile, "echo earlier\n").unwrap();
        let mut vars = HashMap::new();
        vars.insert("HISTFILE".to_string(), histfile.display().to_string());
        let mut fx = Fixture::with_vars(vars);

        fx.sh.run_command("echo now", &mut io::sink(), &mut io::sink());
        assert_eq!(fs::read_to_string(&histfile).unwrap(), "echo earlier\necho now\n");
    }

    #[cfg(unix)]
    fn broken_script(fx: &Fixture) {
        use std::os::unix::fs::PermissionsExt;
        let path = fx.dir.path().join("broken.sh");
        fs::write(&path, "#!/nonexistent/interp\necho never\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_failure_single_command() {
        let mut fx = Fixture::new();
        broken_script(&fx);
        let (code, out, err) = fx.submit("./broken.sh arg");
        assert_eq!(code, 126);
        assert_eq!(out, "");
        assert!(err.starts_with("./broken.sh: "), "{err}");
        assert!(err.ends_with('\n'));
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_failure_last_stage() {
        let mut fx = Fixture::new();
        broken_script(&fx);
        let (code, out, err) = fx.submit("echo x | ./broken.sh");
        assert_eq!(code, 126);
        assert_eq!(out, "");
        assert!(err.starts_with("./broken.sh: "), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_failure_middle_stage_successor_runs() {
        let mut fx = Fixture::new();
        broken_script(&fx);
        let (code, _, err) = fx.submit("echo x | ./broken.sh | wc -c > out.txt");
        assert_eq!(code, 0);
        assert_eq!(err, "");
        assert_eq!(fx.read("out.txt").trim(), "0");

        let (code, out, _) = fx.submit("./broken.sh | echo after");
        assert_eq!(code, 0);
        assert_eq!(out, "after\n");
    }

    #[test]
    fn test_missing_histfile_starts_empty() {
        let mut vars = HashMap::new();
        vars.insert("HISTFILE".to_string(), "/definitely/missing/hist".to_string());
        let fx = Fixture::with_vars(vars);
        assert!(fx.sh.history().is_empty());
    }
}
