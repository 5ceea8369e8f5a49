//! External process execution.
//!
//! Buildpacks never spawn processes directly. They go through a [`CommandRunner`] that is passed
//! in by the caller, so that unit tests can replace the real processes with scripted ones (see
//! [`testing::ScriptedCommandRunner`]).

use crossbeam_utils::thread::ScopedJoinHandle;
use std::io::{self, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::{mem, panic, thread};

/// Captured output of a successfully finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("Couldn't run `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}:\n{stderr}")]
    NonZeroExitStatus {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Runs external commands for a buildpack.
pub trait CommandRunner {
    /// Runs the command to completion.
    ///
    /// Returns an error if the command could not be started or exited unsuccessfully.
    fn run(&self, command: &mut Command) -> Result<CommandOutput, CommandError>;
}

/// [`CommandRunner`] that spawns real processes and streams their output to the build log while
/// it is also being captured.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, command: &mut Command) -> Result<CommandOutput, CommandError> {
        let rendered = render_command(command);
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let status = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .and_then(|child| {
                write_child_process_output(
                    child,
                    Tee(&mut stdout, io::stdout()),
                    Tee(&mut stderr, io::stderr()),
                )
            })
            .and_then(|mut child| child.wait())
            .map_err(|source| CommandError::Io {
                command: rendered.clone(),
                source,
            })?;

        let output = CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        };

        if status.success() {
            Ok(output)
        } else {
            Err(CommandError::NonZeroExitStatus {
                command: rendered,
                status,
                stderr: output.stderr,
            })
        }
    }
}

/// Renders a command as `program arg1 arg2 ...` for log output and error messages.
///
/// Environment variables and the working directory are not part of the rendered string.
pub fn render_command(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

struct Tee<A, B>(A, B);

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write_all(buf)?;
        self.1.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()?;
        self.1.flush()
    }
}

fn write_child_process_output<OW: Write + Send, EW: Write + Send>(
    mut child: Child,
    mut stdout_writer: OW,
    mut stderr_writer: EW,
) -> io::Result<Child> {
    // Both streams are copied in parallel so that interleaved stdout and stderr output stays
    // interleaved in the build log. Scoped threads allow writers that borrow local buffers.
    unwind_panic(crossbeam_utils::thread::scope(|scope| {
        let stdout_copy_thread = mem::take(&mut child.stdout)
            .map(|mut stdout| scope.spawn(move |_| io::copy(&mut stdout, &mut stdout_writer)));

        let stderr_copy_thread = mem::take(&mut child.stderr)
            .map(|mut stderr| scope.spawn(move |_| io::copy(&mut stderr, &mut stderr_writer)));

        let stdout_copy_result = stdout_copy_thread.map_or_else(|| Ok(0), join_and_unwind_panic);
        let stderr_copy_result = stderr_copy_thread.map_or_else(|| Ok(0), join_and_unwind_panic);

        stdout_copy_result.and(stderr_copy_result).map(|_| child)
    }))
}

fn join_and_unwind_panic<T>(handle: ScopedJoinHandle<T>) -> T {
    unwind_panic(handle.join())
}

fn unwind_panic<T>(result: thread::Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic::resume_unwind(err),
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::{render_command, CommandError, CommandOutput, CommandRunner};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;
    use std::os::unix::process::ExitStatusExt;
    use std::path::PathBuf;
    use std::process::{Command, ExitStatus};

    /// An expected command invocation and the result it should produce.
    #[derive(Debug, Clone)]
    pub struct MockCommand {
        pattern: String,
        stdout: String,
        stderr: String,
        exit_code: i32,
    }

    impl MockCommand {
        /// Expects a command whose rendered form (see [`render_command`]) contains `pattern`.
        pub fn new(pattern: impl Into<String>) -> Self {
            Self {
                pattern: pattern.into(),
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
            }
        }

        #[must_use]
        pub fn stdout(mut self, stdout: impl Into<String>) -> Self {
            self.stdout = stdout.into();
            self
        }

        #[must_use]
        pub fn stderr(mut self, stderr: impl Into<String>) -> Self {
            self.stderr = stderr.into();
            self
        }

        #[must_use]
        pub fn exit_code(mut self, exit_code: i32) -> Self {
            self.exit_code = exit_code;
            self
        }
    }

    /// A command that was run through a [`ScriptedCommandRunner`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Invocation {
        pub command: String,
        pub current_dir: Option<PathBuf>,
    }

    /// [`CommandRunner`] that answers commands from a script instead of spawning processes.
    ///
    /// Commands must arrive in script order. A command that doesn't match the next scripted entry
    /// fails with an I/O error, as if the program didn't exist.
    #[derive(Debug, Default)]
    pub struct ScriptedCommandRunner {
        script: RefCell<VecDeque<MockCommand>>,
        invocations: RefCell<Vec<Invocation>>,
    }

    impl ScriptedCommandRunner {
        pub fn new(script: impl IntoIterator<Item = MockCommand>) -> Self {
            Self {
                script: RefCell::new(script.into_iter().collect()),
                invocations: RefCell::default(),
            }
        }

        pub fn invocations(&self) -> Vec<Invocation> {
            self.invocations.borrow().clone()
        }

        /// Number of scripted commands that were never run.
        pub fn remaining(&self) -> usize {
            self.script.borrow().len()
        }
    }

    impl CommandRunner for ScriptedCommandRunner {
        fn run(&self, command: &mut Command) -> Result<CommandOutput, CommandError> {
            let rendered = render_command(command);
            self.invocations.borrow_mut().push(Invocation {
                command: rendered.clone(),
                current_dir: command.get_current_dir().map(PathBuf::from),
            });

            let mock = self
                .script
                .borrow_mut()
                .pop_front()
                .filter(|mock| rendered.contains(&mock.pattern))
                .ok_or_else(|| CommandError::Io {
                    command: rendered.clone(),
                    source: io::Error::new(io::ErrorKind::NotFound, "unexpected command"),
                })?;

            if mock.exit_code == 0 {
                Ok(CommandOutput {
                    stdout: mock.stdout,
                    stderr: mock.stderr,
                })
            } else {
                Err(CommandError::NonZeroExitStatus {
                    command: rendered,
                    status: ExitStatus::from_raw(mock.exit_code << 8),
                    stderr: mock.stderr,
                })
            }
        }
    }
}
