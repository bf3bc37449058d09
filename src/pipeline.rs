//! Execution of parsed commands, alone or as a multi-stage pipeline.
//!
//! A single command runs on a fast path with its streams attached directly.
//! A pipeline starts every stage left to right, connects external stages with
//! OS pipes, feeds builtin output and upstream process output through pump
//! threads, and only then waits for all children.

use crate::command::{CommandResult, EXIT_CANNOT_EXECUTE, EXIT_NOT_FOUND, ParsedCommand};
use crate::env::Environment;
use crate::error::ShellError;
use crate::external::{Resolution, exit_code_of, resolve};
use crate::history::HistoryStore;
use crate::io_adapters::{Sink, Upstream, collect, open_redirect, pump};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

/// Where the final stage of a line writes.
///
/// These are opened by the caller before anything runs, so an external
/// terminal stage can write into a redirect file directly.
pub(crate) struct Streams<'a> {
    pub stdout: Sink<'a>,
    pub stderr: Sink<'a>,
}

/// Mutable interpreter state a stage may touch.
pub(crate) struct Context<'a> {
    pub env: &'a mut Environment,
    pub history: &'a mut HistoryStore,
}

pub(crate) fn not_found(command: &str) -> CommandResult {
    CommandResult::error(EXIT_NOT_FOUND, format!("{command}: command not found\n"))
}

fn spawn_failed(command: &str, source: io::Error) -> CommandResult {
    let err = ShellError::Spawn {
        command: command.to_string(),
        source,
    };
    CommandResult::error(EXIT_CANNOT_EXECUTE, format!("{err}\n"))
}

/// Prepare a child process for `stage` running the executable at `path`.
fn command_for(path: &Path, stage: &ParsedCommand, env: &Environment) -> Command {
    let mut cmd = Command::new(path);
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.arg0(&stage.command);
    }
    cmd.args(&stage.args)
        .env_clear()
        .envs(&env.vars)
        .current_dir(&env.current_dir);
    cmd
}

/// Run a line made of one command, without any pump machinery.
///
/// Builtins run as the authoritative invocation, so `cd`, `history` and
/// `exit` take effect. External commands share the interpreter's stdin.
pub(crate) fn run_single(
    stage: &ParsedCommand,
    ctx: Context<'_>,
    streams: &Streams<'_>,
) -> CommandResult {
    let path = match resolve(ctx.env, &stage.command) {
        Resolution::Builtin(builtin) => {
            return builtin.execute(&stage.args, ctx.env, ctx.history, false);
        }
        Resolution::NotFound => return not_found(&stage.command),
        Resolution::External(path) => path,
    };

    let spawned = (|| {
        let stdout = streams.stdout.stdio(Stdio::inherit)?;
        let stderr = streams.stderr.stdio(Stdio::inherit)?;
        command_for(&path, stage, ctx.env)
            .stdin(Stdio::inherit())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
    })();
    let mut child = match spawned {
        Ok(child) => child,
        Err(err) => return spawn_failed(&stage.command, err),
    };
    tracing::debug!(command = %stage.command, pid = child.id(), "spawned");

    match child.wait() {
        Ok(status) => CommandResult::with_code(exit_code_of(status)),
        Err(err) => CommandResult::error(1, format!("{}: {err}\n", stage.command)),
    }
}

/// How the result of the last stage is obtained once every child is done.
enum Terminal {
    /// Already known: a builtin ran, or the stage could not start.
    Done(CommandResult),
    /// An external process; its exit code and captured stderr decide.
    Process {
        index: usize,
        stderr: Option<JoinHandle<String>>,
    },
}

/// Redirect files of a non-final stage. Absent ones fall back to the pipe
/// (stdout) or the interpreter's own stderr.
struct StageFiles {
    stdout: Option<File>,
    stderr: Option<File>,
}

impl StageFiles {
    fn open(stage: &ParsedCommand, env: &Environment) -> crate::error::Result<Self> {
        let open = |file: &Option<String>, append: bool| {
            file.as_deref()
                .map(|f| open_redirect(&env.absolutize(Path::new(f)), append))
                .transpose()
        };
        Ok(Self {
            stdout: open(&stage.output_file, stage.append_output)?,
            stderr: open(&stage.error_file, stage.append_error)?,
        })
    }

    /// Report diagnostics of a non-final stage.
    fn report(&mut self, text: Option<&str>) {
        match self.stderr.as_mut() {
            Some(file) => {
                let text = text.unwrap_or_default();
                if let Err(err) = file.write_all(text.as_bytes()) {
                    tracing::warn!(%err, "failed to write stage diagnostics");
                }
            }
            None => report_to_shell(text),
        }
    }
}

fn report_to_shell(text: Option<&str>) {
    let mut stderr = io::stderr().lock();
    if let Err(err) = Sink::Writer(&mut stderr).emit(text) {
        tracing::warn!(%err, "failed to write stage diagnostics");
    }
}

/// Run a pipeline of two or more stages.
///
/// Only the last stage's outcome is returned. Output of earlier stages only
/// ever reaches the next stage (or a redirect file); their diagnostics go to
/// the interpreter's stderr. A stage that cannot be found or started cuts the
/// data flow to its successor without stopping the others.
pub(crate) fn run_pipeline(
    stages: &[ParsedCommand],
    ctx: Context<'_>,
    streams: &Streams<'_>,
) -> CommandResult {
    let Context { env, history } = ctx;
    let last_index = stages.len().saturating_sub(1);
    let mut children: Vec<Child> = Vec::new();
    let mut pumps: Vec<JoinHandle<()>> = Vec::new();
    let mut upstream = Upstream::None;
    let mut terminal = None;

    for (index, stage) in stages.iter().enumerate() {
        let is_last = index == last_index;
        let input = std::mem::replace(&mut upstream, Upstream::None);

        let mut files = if is_last {
            StageFiles {
                stdout: None,
                stderr: None,
            }
        } else {
            match StageFiles::open(stage, env) {
                Ok(files) => files,
                Err(err) => {
                    report_to_shell(Some(&format!("{err}\n")));
                    continue;
                }
            }
        };

        match resolve(env, &stage.command) {
            Resolution::Builtin(builtin) => {
                // Builtins never read their input.
                drop(input);
                let result = builtin.execute(&stage.args, env, history, true);
                if is_last {
                    terminal = Some(Terminal::Done(result));
                } else {
                    files.report(result.error.as_deref());
                    upstream = match files.stdout.take() {
                        Some(file) => {
                            if let Err(err) = Sink::File(file).emit(result.output.as_deref()) {
                                tracing::warn!(%err, "failed to write redirected output");
                            }
                            Upstream::None
                        }
                        None => Upstream::from_output(result.output),
                    };
                }
            }
            Resolution::NotFound => {
                tracing::debug!(command = %stage.command, index, "pipeline stage not found");
                if is_last {
                    terminal = Some(Terminal::Done(not_found(&stage.command)));
                }
            }
            Resolution::External(path) => {
                let has_input = !input.is_none();
                let stdin = if has_input {
                    Stdio::piped()
                } else if index == 0 {
                    Stdio::inherit()
                } else {
                    Stdio::null()
                };
                let spawned = (|| {
                    let (stdout, stderr) = if is_last {
                        (
                            streams.stdout.stdio(Stdio::inherit)?,
                            streams.stderr.stdio(Stdio::piped)?,
                        )
                    } else {
                        (
                            files.stdout.take().map_or_else(Stdio::piped, Stdio::from),
                            files.stderr.take().map_or_else(Stdio::inherit, Stdio::from),
                        )
                    };
                    command_for(&path, stage, env)
                        .stdin(stdin)
                        .stdout(stdout)
                        .stderr(stderr)
                        .spawn()
                })();

                let mut child = match spawned {
                    Ok(child) => child,
                    Err(err) => {
                        let failure = spawn_failed(&stage.command, err);
                        if is_last {
                            terminal = Some(Terminal::Done(failure));
                        } else {
                            files.report(failure.error.as_deref());
                        }
                        continue;
                    }
                };
                tracing::debug!(command = %stage.command, pid = child.id(), index, "spawned stage");

                if let Some(sink) = child.stdin.take() {
                    pumps.push(pump(input, sink, &stage.command));
                }
                if is_last {
                    terminal = Some(Terminal::Process {
                        index: children.len(),
                        stderr: child.stderr.take().map(collect),
                    });
                } else if let Some(stdout) = child.stdout.take() {
                    upstream = Upstream::Process(stdout);
                }
                children.push(child);
            }
        }
    }
    drop(upstream);

    let codes: Vec<i32> = children
        .iter_mut()
        .map(|child| match child.wait() {
            Ok(status) => exit_code_of(status),
            Err(err) => {
                tracing::warn!(%err, "failed to wait for pipeline stage");
                1
            }
        })
        .collect();
    for handle in pumps {
        if handle.join().is_err() {
            tracing::warn!("pump thread panicked");
        }
    }

    match terminal {
        Some(Terminal::Done(result)) => result,
        Some(Terminal::Process { index, stderr }) => {
            let error = stderr
                .and_then(|handle| handle.join().ok())
                .filter(|text| !text.is_empty());
            CommandResult {
                exit_code: codes[index],
                output: None,
                error,
            }
        }
        None => CommandResult::empty(),
    }
}

/// Dispatch a parsed line to the single-command or pipeline path.
pub(crate) fn execute(
    stages: &[ParsedCommand],
    ctx: Context<'_>,
    streams: &Streams<'_>,
) -> CommandResult {
    match stages {
        [] => CommandResult::empty(),
        [single] => run_single(single, ctx, streams),
        _ => run_pipeline(stages, ctx, streams),
    }
}
