use crate::command::{CommandResult, ExitCode};
use crate::env::Environment;
use crate::external::{Resolution, resolve};
use crate::history::HistoryStore;
use argh::{EarlyExit, FromArgs};
use std::path::Path;

/// Commands implemented inside the interpreter process.
///
/// Builtins run on the calling thread and report their outcome as a
/// [`CommandResult`] instead of writing to any stream themselves. The ones
/// that change interpreter state (`cd`, `history`, `exit`) do nothing when run
/// as a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Exit,
    Echo,
    Type,
    Pwd,
    Cd,
    History,
}

impl Builtin {
    /// Every builtin, in the order they are offered for completion.
    pub const ALL: [Builtin; 6] = [
        Builtin::Cd,
        Builtin::Echo,
        Builtin::Exit,
        Builtin::History,
        Builtin::Pwd,
        Builtin::Type,
    ];

    /// Canonical name of the command, e.g. "echo" or "cd".
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Exit => "exit",
            Builtin::Echo => "echo",
            Builtin::Type => "type",
            Builtin::Pwd => "pwd",
            Builtin::Cd => "cd",
            Builtin::History => "history",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    /// Run the builtin with `args` (the command name excluded).
    pub(crate) fn execute(
        self,
        args: &[String],
        env: &mut Environment,
        history: &mut HistoryStore,
        is_pipeline_stage: bool,
    ) -> CommandResult {
        tracing::debug!(builtin = self.name(), ?args, is_pipeline_stage, "running builtin");
        match self {
            Builtin::Exit => exit(args, env, is_pipeline_stage),
            Builtin::Echo => CommandResult::output(format!("{}\n", args.join(" "))),
            Builtin::Type => type_of(&args.join(" "), env),
            Builtin::Pwd => CommandResult::output(format!("{}\n", env.current_dir.display())),
            Builtin::Cd if is_pipeline_stage => CommandResult::empty(),
            Builtin::Cd => cd(args, env),
            Builtin::History if is_pipeline_stage => CommandResult::empty(),
            Builtin::History => run_history(args, env, history),
        }
    }
}

fn exit(args: &[String], env: &mut Environment, is_pipeline_stage: bool) -> CommandResult {
    let code: ExitCode = args
        .first()
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(0);
    if !is_pipeline_stage {
        env.should_exit = true;
    }
    CommandResult::with_code(code)
}

fn type_of(name: &str, env: &Environment) -> CommandResult {
    match resolve(env, name) {
        Resolution::Builtin(_) => CommandResult::output(format!("{name} is a shell builtin\n")),
        Resolution::External(path) => {
            CommandResult::output(format!("{name} is {}\n", path.display()))
        }
        Resolution::NotFound => CommandResult::error(0, format!("{name}: not found\n")),
    }
}

fn cd(args: &[String], env: &mut Environment) -> CommandResult {
    let target = args.join(" ");
    // Without HOME, `cd` and `cd ~` stay where they are.
    let destination = if target.is_empty() || target == "~" {
        match env.home() {
            Some(home) => home,
            None => return CommandResult::empty(),
        }
    } else {
        env.expand_tilde(&target)
    };

    let moved = env.absolutize(&destination).is_dir() && env.change_dir(&destination).is_ok();
    if moved {
        CommandResult::empty()
    } else {
        CommandResult::error(0, format!("cd: {target}: No such file or directory\n"))
    }
}

#[derive(FromArgs, Debug)]
/// Display the command history, or read, write or append it to a file.
struct HistoryArgs {
    #[argh(option, short = 'r')]
    /// append the lines of a file to the history
    read: Option<String>,

    #[argh(option, short = 'w')]
    /// overwrite a file with the whole history
    write: Option<String>,

    #[argh(option, short = 'a')]
    /// append entries added since the last append to a file
    append: Option<String>,

    #[argh(positional)]
    /// only list this many of the most recent entries
    count: Option<usize>,
}

/// One well-formed `history` invocation.
#[derive(Debug, PartialEq, Eq)]
enum HistoryAction {
    List(Option<usize>),
    Read(String),
    Write(String),
    Append(String),
}

impl HistoryAction {
    fn parse(args: &[String]) -> Option<Self> {
        // A lone count may be negative, which argh would take for a flag.
        if let [count] = args {
            if let Ok(count) = count.parse::<i64>() {
                return Some(HistoryAction::List(Some(usize::try_from(count).unwrap_or(0))));
            }
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let parsed = match HistoryArgs::from_args(&["history"], &args) {
            Ok(parsed) => parsed,
            Err(EarlyExit { .. }) => return None,
        };
        match parsed {
            HistoryArgs {
                read: None,
                write: None,
                append: None,
                count,
            } => Some(HistoryAction::List(count)),
            HistoryArgs {
                read: Some(file),
                write: None,
                append: None,
                count: None,
            } => Some(HistoryAction::Read(file)),
            HistoryArgs {
                read: None,
                write: Some(file),
                append: None,
                count: None,
            } => Some(HistoryAction::Write(file)),
            HistoryArgs {
                read: None,
                write: None,
                append: Some(file),
                count: None,
            } => Some(HistoryAction::Append(file)),
            _ => None,
        }
    }
}

fn invalid_history_args(args: &[String]) -> CommandResult {
    CommandResult::error(
        0,
        format!("history: {}: is not a valid argument\n", args.join(" ")),
    )
}

fn run_history(args: &[String], env: &Environment, history: &mut HistoryStore) -> CommandResult {
    let Some(action) = HistoryAction::parse(args) else {
        return invalid_history_args(args);
    };
    let outcome = match action {
        HistoryAction::List(count) => return CommandResult::output(history.render(count)),
        HistoryAction::Read(file) => {
            let path = env.absolutize(Path::new(&file));
            if !path.is_file() {
                return invalid_history_args(args);
            }
            history.read_from(&path).map(drop)
        }
        HistoryAction::Write(file) => history.write_to(&env.absolutize(Path::new(&file))),
        HistoryAction::Append(file) => history
            .append_to(&env.absolutize(Path::new(&file)))
            .map(drop),
    };
    match outcome {
        Ok(()) => CommandResult::empty(),
        Err(err) => CommandResult::error(0, format!("{err}\n")),
    }
}
