use crate::error::{Result, ShellError};
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::process::{ChildStdin, ChildStdout, Stdio};
use std::thread::{self, JoinHandle};

/// Data waiting to be fed into the next pipeline stage.
pub(crate) enum Upstream {
    /// Nothing to feed; the stage reads no input.
    None,
    /// Output of a builtin, held in memory.
    Bytes(Cursor<Vec<u8>>),
    /// Standard output of the previous process.
    Process(ChildStdout),
}

impl Upstream {
    /// Wrap a builtin's output. Empty output means no input at all.
    pub(crate) fn from_output(output: Option<String>) -> Self {
        match output {
            Some(text) if !text.is_empty() => Upstream::Bytes(Cursor::new(text.into_bytes())),
            _ => Upstream::None,
        }
    }

    pub(crate) fn is_none(&self) -> bool {
        matches!(self, Upstream::None)
    }
}

impl Read for Upstream {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        match self {
            Upstream::None => Ok(0),
            Upstream::Bytes(cursor) => cursor.read(out),
            Upstream::Process(stdout) => stdout.read(out),
        }
    }
}

/// Copy `source` into a child's stdin on a background thread.
///
/// The child's stdin is dropped once the source is exhausted so that it sees
/// end of input. A consumer that exits early makes the copy stop with a broken
/// pipe, which is not worth reporting.
pub(crate) fn pump(mut source: Upstream, mut sink: ChildStdin, stage: &str) -> JoinHandle<()> {
    let stage = stage.to_string();
    thread::spawn(move || {
        match io::copy(&mut source, &mut sink) {
            Ok(bytes) => tracing::debug!(stage = %stage, bytes, "pump finished"),
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                tracing::debug!(stage = %stage, "consumer closed its input early")
            }
            Err(err) => tracing::warn!(stage = %stage, %err, "failed to feed pipeline stage"),
        }
        drop(sink);
    })
}

/// Read a child's stream to the end on a background thread.
pub(crate) fn collect<R: Read + Send + 'static>(mut source: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(err) = source.read_to_end(&mut buf) {
            tracing::warn!(%err, "failed to read child output");
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Open a redirection target, truncating or appending.
pub(crate) fn open_redirect(path: &Path, append: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options.open(path).map_err(|source| ShellError::Redirect {
        path: path.to_path_buf(),
        source,
    })
}

/// Where one of a command's output streams goes.
pub(crate) enum Sink<'a> {
    File(File),
    Writer(&'a mut dyn Write),
}

impl Sink<'_> {
    /// Write `text` if there is any. Files are created even when it is empty.
    pub(crate) fn emit(&mut self, text: Option<&str>) -> io::Result<()> {
        let Some(text) = text.filter(|t| !t.is_empty()) else {
            return Ok(());
        };
        match self {
            Sink::File(file) => file.write_all(text.as_bytes()),
            Sink::Writer(writer) => {
                writer.write_all(text.as_bytes())?;
                writer.flush()
            }
        }
    }

    /// A handle suitable for a child process.
    pub(crate) fn stdio(&self, inherit: impl FnOnce() -> Stdio) -> io::Result<Stdio> {
        match self {
            Sink::File(file) => Ok(file.try_clone()?.into()),
            Sink::Writer(_) => Ok(inherit()),
        }
    }
}
