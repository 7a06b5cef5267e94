//! Executes external tools and records what they did
//!
//! Every tool call in the pipeline goes through `CommandRunner::run`. A
//! non-zero exit is logged and handed back to the caller; only a missing
//! program, a timeout or an I/O failure becomes an `Err`.

use crate::logging::LogContext;
use crate::structs::{CorrError, ExecOptions, ExecutionResult, Result, ToolCommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs `ToolCommand`s with one set of options
pub struct CommandRunner<'a> {
    log: &'a LogContext,
    options: &'a ExecOptions,
    workdir: Option<&'a Path>,
}

impl<'a> CommandRunner<'a> {
    #[must_use]
    pub fn new(log: &'a LogContext, options: &'a ExecOptions) -> Self {
        Self {
            log,
            options,
            workdir: None,
        }
    }

    /// Run every child with `dir` as its working directory
    #[must_use]
    pub fn in_dir(mut self, dir: &'a Path) -> Self {
        self.workdir = Some(dir);
        self
    }

    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    /// Execute `command`, optionally writing its stdout to `capture_stdout_to`
    /// and its stderr to the same path with an `.err` extension.
    ///
    /// In shell mode stdout is inherited, so the capture file is written
    /// empty.
    ///
    /// # Errors
    /// Returns error if the program cannot be found or spawned, exceeds the
    /// configured timeout, or the capture files cannot be written
    pub fn run(
        &self,
        command: &ToolCommand,
        capture_stdout_to: Option<&Path>,
    ) -> Result<ExecutionResult> {
        let line = command.render();
        let debug = self.log.debug();

        if debug {
            debug!("Running: {line}");
        } else {
            info!("Running: {line}");
        }

        if self.options.dry_run {
            info!("Performing command as dry run");
            return Ok(ExecutionResult::dry_run(self.log.path()));
        }

        let mut cmd = if self.options.shell {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&line).stdout(Stdio::inherit());
            cmd
        } else {
            let mut cmd = Command::new(command.program());
            cmd.args(command.arguments()).stdout(Stdio::piped());
            cmd
        };
        cmd.envs(self.options.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stderr(Stdio::piped());
        if let Some(dir) = self.workdir {
            cmd.current_dir(dir);
        }

        let program = command.program_name();
        let mut child = cmd.spawn().map_err(|e| spawn_error(&program, e))?;
        let stdout_reader = child.stdout.take().map(read_in_background);
        let stderr_reader = child.stderr.take().map(read_in_background);

        let status = self.wait(&mut child, &program)?;
        let out = collect(stdout_reader);
        let err = collect(stderr_reader);
        let exit_code = exit_code(status);

        let (stdout_path, stderr_path) = match capture_stdout_to {
            Some(path) => {
                let err_path = path.with_extension("err");
                fs::write(path, &out)?;
                fs::write(&err_path, &err)?;
                (Some(path.to_path_buf()), Some(err_path))
            }
            None => (None, None),
        };

        if exit_code != 0 {
            error!("command: {line} failed with return code {exit_code}");
        }

        if !out.is_empty() {
            if debug {
                debug!("{out}");
            } else {
                info!("{out}");
            }
        }
        if !err.is_empty() {
            if debug {
                info!("{err}");
            } else {
                warn!("{err}");
            }
        }

        Ok(ExecutionResult {
            exit_code,
            stdout: Some(out),
            stderr: Some(err),
            stdout_path,
            stderr_path,
            log_path: self.log.path().to_path_buf(),
        })
    }

    fn wait(&self, child: &mut Child, program: &str) -> Result<ExitStatus> {
        let Some(timeout) = self.options.timeout else {
            return Ok(child.wait()?);
        };

        let start = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if start.elapsed() > timeout {
                error!("{program} exceeded {timeout:?}, killing it");
                let _ = child.kill();
                let _ = child.wait();
                return Err(CorrError::ToolTimeout {
                    program: program.to_string(),
                    seconds: timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn spawn_error(program: &str, e: io::Error) -> CorrError {
    if e.kind() == io::ErrorKind::NotFound {
        CorrError::ToolNotFound {
            program: program.to_string(),
        }
    } else {
        CorrError::Io(e)
    }
}

fn read_in_background<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Resolve `program` the way spawning it would
#[must_use]
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return is_executable(direct).then(|| direct.to_path_buf());
    }

    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
