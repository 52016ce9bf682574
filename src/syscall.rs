// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process invocation.
//!
//! Every side effect localbrew has on the system outside of reading metadata
//! goes through an external process: privilege elevation, mode and ownership
//! changes, the version-control client, the archive pipeline, and the package
//! manager itself. All of them are described as an [`Invocation`] and handed
//! to a [`Syscall`] implementation.
//!
//! A failing invocation is never recovered from. Callers propagate the
//! [`SyscallError`] up to the bootstrap driver, which ends the run.

use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use tracing::debug;

/// Ordered argument vector executed as a child process.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
}

impl Invocation {
    /// Construct new invocation of target program.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a listing of arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the child process inside target directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Wrap invocation so it runs through the privilege elevation tool.
    ///
    /// The working directory is kept as is.
    pub fn elevate(self, elevator: impl Into<OsString>) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);

        Self {
            program: elevator.into(),
            args,
            current_dir: self.current_dir,
        }
    }

    /// Directory the child process runs in, if not inherited.
    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Full argument vector, program first, lossily converted to UTF-8.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|word| word.to_string_lossy().into_owned())
            .collect()
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = self.working_dir() {
            command.current_dir(dir);
        }

        command
    }

    fn expression(&self) -> duct::Expression {
        let expression = duct::cmd(self.program.clone(), &self.args);
        match self.working_dir() {
            Some(dir) => expression.dir(dir),
            None => expression,
        }
    }
}

impl Display for Invocation {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(shell_join(self.argv()).as_str())
    }
}

/// Join words into one human readable command line.
///
/// The first word is taken verbatim. Spaces inside every following word are
/// escaped with a backslash so paths with spaces stay readable as one word.
pub fn shell_join(words: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    let mut words = words.into_iter();
    let mut joined = match words.next() {
        Some(first) => first.as_ref().to_string(),
        None => return String::new(),
    };

    for word in words {
        joined.push(' ');
        joined.push_str(word.as_ref().replace(' ', "\\ ").as_str());
    }

    joined
}

/// Output of a captured invocation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Captured {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    /// Construct successful capture with given standard output.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Construct failed capture with given standard error.
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Standard output followed by standard error.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Layer of indirection for running external processes.
pub trait Syscall {
    /// Run invocation with inherited standard streams.
    ///
    /// # Errors
    ///
    /// - Return [`SyscallError::Spawn`] if process cannot be started.
    /// - Return [`SyscallError::Failed`] if process exits non-zero.
    fn run(&self, invocation: &Invocation) -> Result<()>;

    /// Run invocation and capture its output.
    ///
    /// A non-zero exit is reported through [`Captured::success`], not as an
    /// error, because callers use captures to probe the environment.
    ///
    /// # Errors
    ///
    /// - Return [`SyscallError::Spawn`] if process cannot be started.
    fn capture(&self, invocation: &Invocation) -> Result<Captured>;

    /// Pipe standard output of `source` into standard input of `sink`.
    ///
    /// Fails if either side exits non-zero, so a successful sink never hides
    /// a failed source.
    ///
    /// # Errors
    ///
    /// - Return [`SyscallError::Spawn`] if either process cannot be started.
    /// - Return [`SyscallError::Failed`] if either process exits non-zero.
    fn pipe(&self, source: &Invocation, sink: &Invocation) -> Result<()>;
}

/// Run external processes on the host system.
#[derive(Debug, Default, Clone, Copy)]
pub struct System;

impl Syscall for System {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        debug!("run {invocation}");
        let status = invocation
            .command()
            .status()
            .map_err(|err| SyscallError::Spawn {
                source: err,
                command: invocation.to_string(),
            })?;

        if !status.success() {
            return Err(SyscallError::Failed {
                command: invocation.to_string(),
                code: status.code(),
            });
        }

        Ok(())
    }

    fn capture(&self, invocation: &Invocation) -> Result<Captured> {
        debug!("capture {invocation}");
        let output = invocation
            .command()
            .stdin(Stdio::null())
            .output()
            .map_err(|err| SyscallError::Spawn {
                source: err,
                command: invocation.to_string(),
            })?;

        Ok(Captured {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(output.stdout.as_slice()).into_owned(),
            stderr: String::from_utf8_lossy(output.stderr.as_slice()).into_owned(),
        })
    }

    fn pipe(&self, source: &Invocation, sink: &Invocation) -> Result<()> {
        let command = format!("{source} | {sink}");
        debug!("pipe {command}");

        // INVARIANT: Status of a duct pipe is the sink's if non-zero, otherwise
        // the source's. Thus, a failed fetch is never masked by extraction.
        let output = source
            .expression()
            .pipe(sink.expression())
            .unchecked()
            .run()
            .map_err(|err| SyscallError::Spawn {
                source: err,
                command: command.clone(),
            })?;

        if !output.status.success() {
            return Err(SyscallError::Failed {
                command,
                code: output.status.code(),
            });
        }

        Ok(())
    }
}

/// External process error types.
#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    /// Process could not be started at all.
    #[error("failed to start: {command}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// Process exited with non-zero status.
    #[error("failed during: {command}{}", .code.map(|code| format!(" (exit status {code})")).unwrap_or_default())]
    Failed { command: String, code: Option<i32> },
}

/// Friendly result alias :3
pub type Result<T, E = SyscallError> = std::result::Result<T, E>;

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::{cell::RefCell, collections::HashMap};

    /// Record invocations instead of running them.
    ///
    /// Commands whose shell-joined form contains a registered failure pattern
    /// fail with exit status 1. Captures answer from a table keyed by the exact
    /// shell-joined command, defaulting to a failed empty capture.
    #[derive(Debug, Default)]
    pub(crate) struct Recorder {
        calls: RefCell<Vec<String>>,
        failing: Vec<String>,
        captures: HashMap<String, Captured>,
    }

    impl Recorder {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn fail_on(mut self, pattern: impl Into<String>) -> Self {
            self.failing.push(pattern.into());
            self
        }

        pub(crate) fn respond(mut self, command: impl Into<String>, captured: Captured) -> Self {
            self.captures.insert(command.into(), captured);
            self
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn check(&self, command: String) -> Result<()> {
            self.calls.borrow_mut().push(command.clone());
            if self.failing.iter().any(|pattern| command.contains(pattern)) {
                return Err(SyscallError::Failed {
                    command,
                    code: Some(1),
                });
            }

            Ok(())
        }
    }

    impl Syscall for Recorder {
        fn run(&self, invocation: &Invocation) -> Result<()> {
            self.check(invocation.to_string())
        }

        fn capture(&self, invocation: &Invocation) -> Result<Captured> {
            Ok(self
                .captures
                .get(&invocation.to_string())
                .cloned()
                .unwrap_or_default())
        }

        fn pipe(&self, source: &Invocation, sink: &Invocation) -> Result<()> {
            self.check(format!("{source} | {sink}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn shell_join_escapes_spaces_after_program() {
        let result = shell_join(["/usr/bin/my tool", "a b", "c"]);
        assert_eq!(result, "/usr/bin/my tool a\\ b c");
        assert_eq!(shell_join(Vec::<String>::new()), "");
    }

    #[test]
    fn elevate_prepends_elevator() {
        let invocation = Invocation::new("/bin/chmod")
            .args(["g+rwx", "/opt/x"])
            .current_dir("/tmp")
            .elevate("/usr/bin/sudo");

        assert_eq!(
            invocation.argv(),
            vec!["/usr/bin/sudo", "/bin/chmod", "g+rwx", "/opt/x"]
        );
        assert_eq!(invocation.working_dir(), Some(Path::new("/tmp")));
    }

    #[test]
    fn failed_run_names_command() {
        let error = System
            .run(&Invocation::new("false").arg("some arg"))
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "failed during: false some\\ arg (exit status 1)"
        );
    }

    #[test]
    fn capture_reports_status_without_error() -> anyhow::Result<()> {
        let captured = System.capture(&Invocation::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]))?;
        assert_eq!(
            captured,
            Captured {
                success: false,
                stdout: "out\n".into(),
                stderr: "err\n".into(),
            }
        );

        Ok(())
    }

    #[test]
    fn pipe_propagates_source_failure() {
        let result = System.pipe(&Invocation::new("false"), &Invocation::new("true"));
        assert!(matches!(result, Err(SyscallError::Failed { .. })));
    }

    #[test]
    fn pipe_succeeds_when_both_sides_succeed() -> anyhow::Result<()> {
        System.pipe(
            &Invocation::new("echo").arg("payload"),
            &Invocation::new("sh").args(["-c", "grep -q payload"]),
        )?;

        Ok(())
    }
}
