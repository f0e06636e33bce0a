//! Running external programs.
//!
//! Audio transcoding and remote downloads are delegated to the `ffmpeg` and
//! `yt-dlp` executables. Both stages describe their invocation as a
//! [`CommandSpec`] and run it through a [`ProcessRunner`], which streams one
//! of the child's outputs back line by line. [`SystemRunner`] spawns real
//! processes; tests provide scripted runners.

use std::{
    ffi::OsString,
    io::{ErrorKind, Read},
    path::PathBuf,
    process::{Command, Stdio},
};

use crate::error::FramegrabError;

/// Which output stream of the child is read for progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments, without the program name.
    pub args: Vec<OsString>,
    /// Stream scraped for progress lines. The other one is discarded.
    pub scrape: OutputStream,
    /// Directory to run in. `None` inherits the current directory.
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Invocation of `program` with no arguments, scraping stdout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            scrape: OutputStream::Stdout,
            working_dir: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Scrape `stream` instead of stdout.
    #[must_use]
    pub fn scraping(mut self, stream: OutputStream) -> Self {
        self.scrape = stream;
        self
    }

    /// Run in `directory`.
    #[must_use]
    pub fn in_dir(mut self, directory: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(directory.into());
        self
    }

    /// Arguments as UTF-8 strings, lossily converted.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }
}

/// Runs a [`CommandSpec`] to completion.
pub trait ProcessRunner: Send + Sync {
    /// Run the command, calling `on_line` for every line of the scraped
    /// stream, and return its exit code (`None` if killed by a signal).
    ///
    /// # Errors
    ///
    /// Returns [`FramegrabError::ToolNotFound`] if the program cannot be
    /// started.
    fn run(
        &self,
        spec: &CommandSpec,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<Option<i32>, FramegrabError>;
}

/// Spawns real child processes with [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(
        &self,
        spec: &CommandSpec,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<Option<i32>, FramegrabError> {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args).stdin(Stdio::null());
        if let Some(directory) = &spec.working_dir {
            command.current_dir(directory);
        }
        match spec.scrape {
            OutputStream::Stdout => command.stdout(Stdio::piped()).stderr(Stdio::null()),
            OutputStream::Stderr => command.stdout(Stdio::null()).stderr(Stdio::piped()),
        };

        log::debug!("Running {} {:?}", spec.program, spec.args_lossy());
        let mut child = command.spawn().map_err(|error| FramegrabError::ToolNotFound {
            program: spec.program.clone(),
            reason: error.to_string(),
        })?;

        let read_result = match spec.scrape {
            OutputStream::Stdout => child.stdout.take().map(|out| split_lines(out, on_line)),
            OutputStream::Stderr => child.stderr.take().map(|err| split_lines(err, on_line)),
        };

        let status = child.wait()?;
        if let Some(Err(error)) = read_result {
            log::warn!("Failed reading output of {}: {error}", spec.program);
        }
        Ok(status.code())
    }
}

/// Feed `reader` to `on_line` one line at a time.
///
/// Lines end at `\n` or `\r`, so carriage-return progress updates arrive as
/// separate lines. Empty lines are skipped and invalid UTF-8 is replaced.
///
/// # Errors
///
/// Returns any read error other than an interruption.
pub fn split_lines<R: Read>(mut reader: R, on_line: &mut dyn FnMut(&str)) -> std::io::Result<()> {
    let mut chunk = [0u8; 4096];
    let mut line = Vec::with_capacity(256);

    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        };
        for &byte in &chunk[..read] {
            if byte == b'\n' || byte == b'\r' {
                if !line.is_empty() {
                    on_line(&String::from_utf8_lossy(&line));
                    line.clear();
                }
            } else {
                line.push(byte);
            }
        }
    }

    if !line.is_empty() {
        on_line(&String::from_utf8_lossy(&line));
    }
    Ok(())
}

/// Check that `program` can be started by running it with `version_arg`.
///
/// # Errors
///
/// Returns [`FramegrabError::ToolNotFound`] if the program cannot be started
/// or exits unsuccessfully.
pub fn ensure_available(
    runner: &dyn ProcessRunner,
    program: &str,
    version_arg: &str,
) -> Result<(), FramegrabError> {
    let spec = CommandSpec::new(program).arg(version_arg);
    match runner.run(&spec, &mut |_| {})? {
        Some(0) => Ok(()),
        code => Err(FramegrabError::ToolNotFound {
            program: program.to_string(),
            reason: format!("`{program} {version_arg}` exited with {code:?}"),
        }),
    }
}
