use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::process::{Child, Command as StdCommand, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const READ_CHUNK: usize = 8 * 1024;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_OUTPUT: usize = 64 * 1024;

/// A subprocess invocation with a hard deadline and bounded output capture.
///
/// Arguments are passed straight to the OS as an argv vector; nothing is
/// ever routed through a shell.
#[derive(Debug)]
pub struct Command {
    inner: StdCommand,
    program: String,
    timeout: Duration,
    max_output: usize,
}

/// Output of a finished subprocess.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Captured {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Set when either stream exceeded the capture limit.
    pub truncated: bool,
}

impl Captured {
    pub fn success(&self) -> bool { self.code == Some(0) }

    /// stderr followed by stdout, lossily decoded.
    pub fn diagnostics(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stderr).into_owned();
        if !self.stdout.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&String::from_utf8_lossy(&self.stdout));
        }
        text
    }
}

impl Command {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        let program = program.as_ref();
        Self {
            inner: StdCommand::new(program),
            program: program.to_string_lossy().into_owned(),
            timeout: DEFAULT_TIMEOUT,
            max_output: DEFAULT_MAX_OUTPUT,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.inner.arg(arg);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.inner.args(args);
        self
    }

    pub fn env<K, V>(mut self, key: K, val: V) -> Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.inner.env(key, val);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Per-stream capture limit in bytes.
    pub fn max_output(mut self, bytes: usize) -> Self {
        self.max_output = bytes;
        self
    }

    pub fn get_program(&self) -> &str { &self.program }

    pub fn get_args(&self) -> Vec<OsString> {
        self.inner.get_args().map(OsStr::to_os_string).collect()
    }

    pub fn get_timeout(&self) -> Duration { self.timeout }

    pub fn get_max_output(&self) -> usize { self.max_output }

    /// Run to completion, killing the child once the timeout elapses.
    pub fn capture(self) -> Result<Captured> {
        let Self {
            mut inner,
            program,
            timeout,
            max_output,
        } = self;

        let mut child = inner
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Spawn {
                cmd: program.clone(),
                source: e,
            })?;

        debug!(cmd = %program, pid = child.id(), "spawned subprocess");

        let stdout = child.stdout.take().map(|s| drain_bounded(s, max_output));
        let stderr = child.stderr.take().map(|s| drain_bounded(s, max_output));

        let code = wait_with_deadline(&mut child, &program, timeout)?;

        let (stdout, out_truncated) = join_drain(stdout);
        let (stderr, err_truncated) = join_drain(stderr);

        Ok(Captured {
            code,
            stdout,
            stderr,
            truncated: out_truncated || err_truncated,
        })
    }
}

fn wait_with_deadline(child: &mut Child, program: &str, timeout: Duration) -> Result<Option<i32>> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status.code()),
            Ok(None) if Instant::now() >= deadline => {
                warn!(cmd = %program, timeout_secs = timeout.as_secs(), "subprocess timed out, killing");
                abort(child);
                return Err(Error::TimedOut {
                    cmd: program.to_string(),
                    after: timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                abort(child);
                return Err(Error::Wait {
                    cmd: program.to_string(),
                    source: e,
                });
            }
        }
    }
}

/// Kill the child and reap it so no zombie is left behind.
fn abort(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

type Drain = JoinHandle<(Vec<u8>, bool)>;

/// Keep at most `limit` bytes but read the stream to EOF, so the child never
/// blocks on a full pipe.
fn drain_bounded<R: Read + Send + 'static>(mut reader: R, limit: usize) -> Drain {
    thread::spawn(move || {
        let mut kept = Vec::new();
        let mut truncated = false;
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let room = limit.saturating_sub(kept.len());
                    if n > room {
                        truncated = true;
                    }
                    kept.extend_from_slice(&buf[..n.min(room)]);
                }
            }
        }
        (kept, truncated)
    })
}

fn join_drain(handle: Option<Drain>) -> (Vec<u8>, bool) {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Seam between callers and real process creation, so tests can substitute
/// a scripted runner.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, command: Command) -> Result<Captured>;
}

/// Runs commands as real subprocesses.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, command: Command) -> Result<Captured> { command.capture() }
}
