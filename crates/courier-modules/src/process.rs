//! Deadline-bounded subprocess execution.
//!
//! [`run_with_deadline`] spawns a command with piped standard streams,
//! feeds it an optional input buffer, captures stdout and stderr on helper
//! threads, and waits for it to exit. A [`ChildGuard`] owns the child for
//! the whole call: whichever way the call returns, the child has been reaped
//! and, on timeout, killed.
//!
//! On Unix every child is placed in its own process group so the timeout
//! kill also reaches anything the handler spawned itself.

use std::io::{self, Read, Write};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

/// Tracing target for process operations.
const PROCESS_TARGET: &str = "courier_modules::process";

/// Interval between exit-status polls.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors raised while running a subprocess.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The process could not be started.
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    /// Communicating with or waiting on the process failed.
    #[error("I/O error while running process: {0}")]
    Io(#[source] io::Error),

    /// The process did not finish before the deadline and was killed.
    #[error("process did not finish within {timeout:?} and was killed")]
    TimedOut {
        /// Deadline that was exceeded.
        timeout: Duration,
    },
}

/// Captured result of one completed subprocess.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    elapsed: Duration,
}

impl ProcessOutput {
    /// Exit status reported by the operating system.
    #[must_use]
    pub const fn status(&self) -> ExitStatus {
        self.status
    }

    /// Returns `true` when the process exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Raw bytes written to stdout.
    #[must_use]
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// Stderr decoded lossily with surrounding whitespace removed.
    #[must_use]
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_owned()
    }

    /// Wall-clock time between spawn and exit.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Runs `command` to completion or until `timeout` elapses.
///
/// When `input` is `Some`, it is written to the child's stdin, which is then
/// closed; otherwise stdin is connected to the null device. The deadline
/// covers both the exit of the child and the closing of its output pipes.
///
/// # Errors
///
/// Returns [`ProcessError::Spawn`] if the command cannot start,
/// [`ProcessError::TimedOut`] if the deadline passes (the child has been
/// killed and reaped by then), or [`ProcessError::Io`] for other failures.
pub fn run_with_deadline(
    mut command: Command,
    input: Option<Vec<u8>>,
    timeout: Duration,
) -> Result<ProcessOutput, ProcessError> {
    command.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    isolate_process_group(&mut command);

    let start = Instant::now();
    let deadline = start + timeout;
    let mut guard = ChildGuard::new(command.spawn().map_err(ProcessError::Spawn)?);

    let (sender, receiver) = mpsc::channel();
    let streams = guard.take_streams()?;
    if let (Some(stdin), Some(bytes)) = (streams.stdin, input) {
        spawn_writer(stdin, bytes);
    }
    spawn_reader(StreamKind::Stdout, streams.stdout, sender.clone());
    spawn_reader(StreamKind::Stderr, streams.stderr, sender);

    let Some(status) = guard.wait_until(deadline)? else {
        return Err(guard.time_out(timeout));
    };

    let captured = match collect_streams(&receiver, deadline) {
        Ok(captured) => captured,
        Err(CollectError::Deadline) => return Err(guard.time_out(timeout)),
        Err(CollectError::Io(error)) => return Err(ProcessError::Io(error)),
    };

    let elapsed = start.elapsed();
    debug!(
        target: PROCESS_TARGET,
        ?status,
        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        stdout_bytes = captured.stdout.len(),
        stderr_bytes = captured.stderr.len(),
        "process finished"
    );

    Ok(ProcessOutput {
        status,
        stdout: captured.stdout,
        stderr: captured.stderr,
        elapsed,
    })
}

/// Owns a spawned child and guarantees it is reaped.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

struct ChildStreams {
    stdin: Option<ChildStdin>,
    stdout: ChildStdout,
    stderr: ChildStderr,
}

impl ChildGuard {
    const fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn take_streams(&mut self) -> Result<ChildStreams, ProcessError> {
        let missing = |stream: &str| {
            ProcessError::Io(io::Error::other(format!("failed to capture child {stream}")))
        };
        let stdout = self.child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = self.child.stderr.take().ok_or_else(|| missing("stderr"))?;
        Ok(ChildStreams {
            stdin: self.child.stdin.take(),
            stdout,
            stderr,
        })
    }

    /// Polls for exit until `deadline`; `None` means the child is still
    /// running.
    fn wait_until(&mut self, deadline: Instant) -> Result<Option<ExitStatus>, ProcessError> {
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    self.reaped = true;
                    return Ok(Some(status));
                }
                Ok(None) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    thread::sleep(POLL_INTERVAL.min(deadline - now));
                }
                Err(error) => return Err(ProcessError::Io(error)),
            }
        }
    }

    fn time_out(&mut self, timeout: Duration) -> ProcessError {
        warn!(
            target: PROCESS_TARGET,
            pid = self.child.id(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "process exceeded its deadline, killing"
        );
        self.terminate();
        ProcessError::TimedOut { timeout }
    }

    /// Kills the child's process group and reaps the child if necessary.
    fn terminate(&mut self) {
        kill_process_group(&self.child);
        if !self.reaped {
            drop(self.child.kill());
            drop(self.child.wait());
            self.reaped = true;
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            self.terminate();
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

#[derive(Default)]
struct Captured {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

enum CollectError {
    Deadline,
    Io(io::Error),
}

type StreamMessage = (StreamKind, io::Result<Vec<u8>>);

fn spawn_writer(mut stdin: ChildStdin, bytes: Vec<u8>) {
    thread::spawn(move || {
        // A handler may exit without reading its input.
        if let Err(error) = stdin.write_all(&bytes).and_then(|()| stdin.flush())
            && error.kind() != io::ErrorKind::BrokenPipe
        {
            debug!(target: PROCESS_TARGET, %error, "failed to write process input");
        }
    });
}

fn spawn_reader(kind: StreamKind, mut stream: impl Read + Send + 'static, sender: Sender<StreamMessage>) {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let result = stream.read_to_end(&mut buffer).map(|_| buffer);
        drop(sender.send((kind, result)));
    });
}

fn collect_streams(
    receiver: &Receiver<StreamMessage>,
    deadline: Instant,
) -> Result<Captured, CollectError> {
    let mut captured = Captured::default();
    let mut pending = 2_u8;
    while pending > 0 {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match receiver.recv_timeout(remaining) {
            Ok((kind, result)) => {
                let bytes = result.map_err(CollectError::Io)?;
                match kind {
                    StreamKind::Stdout => captured.stdout = bytes,
                    StreamKind::Stderr => captured.stderr = bytes,
                }
                pending -= 1;
            }
            Err(RecvTimeoutError::Timeout) => return Err(CollectError::Deadline),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(CollectError::Io(io::Error::other(
                    "output reader stopped unexpectedly",
                )));
            }
        }
    }
    Ok(captured)
}

#[cfg(unix)]
fn isolate_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_command: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(pid) = i32::try_from(child.id()) else {
        return;
    };
    if let Err(errno) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!(target: PROCESS_TARGET, pid, %errno, "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}
