use argh::FromArgs;
use pipesh::Interpreter;
use pipesh::env::Environment;
use std::io;

#[derive(FromArgs)]
/// An interactive shell with pipelines, redirections and history.
struct Args {
    #[argh(option, short = 'c')]
    /// run a single command line and exit with its status
    command: Option<String>,

    #[argh(option)]
    /// history file to load and save, overriding HISTFILE
    histfile: Option<String>,
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("PIPESH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args: Args = argh::from_env();

    let mut env = Environment::new();
    if let Some(histfile) = args.histfile {
        env.set_var("HISTFILE", histfile);
    }
    let mut shell = Interpreter::new(env);

    let code = match args.command {
        Some(line) => shell.run_command(&line, &mut io::stdout(), &mut io::stderr()),
        None => shell.repl()?,
    };
    std::process::exit(code)
}
