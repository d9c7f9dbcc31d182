//! Supervision of one external process.
//!
//! [`SupervisedProcess::spawn`] starts the child with piped output and emits
//! `phase{start}`. Two reader tasks forward every stdout/stderr line as a
//! `log` event while capturing the stream (capped at [`MAX_OUTPUT_BYTES`]).
//! [`SupervisedProcess::wait`] drains both readers before emitting
//! `phase{exit}`, so all of a process's log events precede its exit phase.
//!
//! A [`ProcessHandle`] can be cloned out and used to interrupt the child from
//! elsewhere.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use protobench_core::protocol::Protocol;
use protobench_events::{Actor, BenchEvent, EventSender, LogPayload, StreamKind};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::command::CommandSpec;
use crate::config::DEFAULT_TERMINATION_GRACE;

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Lines past the cap are still forwarded as events but no longer captured.
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Longest line forwarded as one `log` event; longer lines arrive in pieces.
pub const MAX_LINE_BYTES: u64 = 64 * 1024;

/// Which run slot a process occupies; labels its events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessMeta {
    pub protocol: Protocol,
    pub actor: Actor,
}

impl ProcessMeta {
    pub fn client(protocol: Protocol) -> Self {
        Self {
            protocol,
            actor: Actor::Client,
        }
    }

    pub fn server(protocol: Protocol) -> Self {
        Self {
            protocol,
            actor: Actor::Server,
        }
    }
}

/// How a process ended, with its captured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("spawn failed: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("wait failed: {0}")]
    Wait(#[source] std::io::Error),

    #[error("process cancelled")]
    Cancelled,
}

#[derive(Debug)]
struct HandleState {
    pid: Option<u32>,
    listeners: CancellationToken,
    exited: AtomicBool,
    signalled: AtomicBool,
}

/// Cloneable control handle of a [`SupervisedProcess`].
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    inner: Arc<HandleState>,
}

impl ProcessHandle {
    fn new(pid: Option<u32>) -> Self {
        Self {
            inner: Arc::new(HandleState {
                pid,
                listeners: CancellationToken::new(),
                exited: AtomicBool::new(false),
                signalled: AtomicBool::new(false),
            }),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    pub fn has_exited(&self) -> bool {
        self.inner.exited.load(Ordering::Acquire)
    }

    /// Send SIGINT to the child and stop forwarding its output as events.
    ///
    /// Idempotent. A no-op once the process has been reaped.
    pub fn terminate(&self) {
        self.inner.listeners.cancel();
        if self.has_exited() || self.inner.signalled.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(pid) = self.inner.pid {
            tracing::debug!(pid, "Sending SIGINT");
            interrupt(pid);
        }
    }

    fn mark_exited(&self) {
        self.inner.exited.store(true, Ordering::Release);
    }

    fn listeners(&self) -> CancellationToken {
        self.inner.listeners.clone()
    }
}

#[cfg(unix)]
fn interrupt(pid: u32) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers and has no memory-safety
    // preconditions.
    let rc = unsafe { libc::kill(pid, libc::SIGINT) };
    if rc != 0 {
        tracing::debug!(
            pid,
            error = %std::io::Error::last_os_error(),
            "SIGINT not delivered"
        );
    }
}

#[cfg(not(unix))]
fn interrupt(_pid: u32) {}

/// A running child process whose output is streamed to an [`EventSender`].
pub struct SupervisedProcess {
    child: Child,
    handle: ProcessHandle,
    meta: ProcessMeta,
    program: String,
    events: EventSender,
    stdout_task: JoinHandle<Vec<u8>>,
    stderr_task: JoinHandle<Vec<u8>>,
    grace: Duration,
}

impl SupervisedProcess {
    /// Spawn `spec` and emit its start phase.
    ///
    /// The child is killed if this value is dropped before it exits.
    pub async fn spawn(
        spec: &CommandSpec,
        meta: ProcessMeta,
        events: EventSender,
    ) -> Result<Self, ProcessError> {
        let program = spec.program_name();
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(spec.env.iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ProcessError::Spawn)?;

        let handle = ProcessHandle::new(child.id());
        tracing::info!(
            program = %program,
            pid = ?handle.pid(),
            protocol = %meta.protocol,
            actor = ?meta.actor,
            "Process started",
        );

        events
            .send(BenchEvent::phase_start(meta.protocol, meta.actor))
            .await;

        let stdout_task = tokio::spawn(forward_lines(
            child.stdout.take(),
            StreamKind::Stdout,
            meta,
            events.clone(),
            handle.listeners(),
        ));
        let stderr_task = tokio::spawn(forward_lines(
            child.stderr.take(),
            StreamKind::Stderr,
            meta,
            events.clone(),
            handle.listeners(),
        ));

        Ok(Self {
            child,
            handle,
            meta,
            program,
            events,
            stdout_task,
            stderr_task,
            grace: DEFAULT_TERMINATION_GRACE,
        })
    }

    /// Time allowed between SIGINT and SIGKILL when cancelled.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn handle(&self) -> ProcessHandle {
        self.handle.clone()
    }

    pub fn meta(&self) -> ProcessMeta {
        self.meta
    }

    /// Wait for the process to exit and emit its exit phase.
    ///
    /// If `cancel` fires first, the child is interrupted, given the grace
    /// period, then killed, and [`ProcessError::Cancelled`] is returned
    /// without an exit phase.
    pub async fn wait(mut self, cancel: &CancellationToken) -> Result<ProcessExit, ProcessError> {
        let waited = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            status = self.child.wait() => Some(status),
        };

        let Some(status) = waited else {
            self.shutdown().await;
            return Err(ProcessError::Cancelled);
        };
        self.handle.mark_exited();
        let status = status.map_err(ProcessError::Wait)?;

        // Descendants may still hold the pipes open after the child exits.
        let readers = async {
            let stdout = (&mut self.stdout_task).await.unwrap_or_default();
            let stderr = (&mut self.stderr_task).await.unwrap_or_default();
            (stdout, stderr)
        };
        let drained = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            output = readers => Some(output),
        };
        let Some((stdout_bytes, stderr_bytes)) = drained else {
            self.stdout_task.abort();
            self.stderr_task.abort();
            tracing::info!(program = %self.program, protocol = %self.meta.protocol, "Output drain cancelled");
            return Err(ProcessError::Cancelled);
        };
        let code = status.code();

        tracing::info!(
            program = %self.program,
            protocol = %self.meta.protocol,
            actor = ?self.meta.actor,
            code = ?code,
            "Process exited",
        );
        self.events
            .send(BenchEvent::phase_exit(self.meta.protocol, self.meta.actor, code))
            .await;

        Ok(ProcessExit {
            code,
            stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        })
    }

    async fn shutdown(&mut self) {
        self.handle.terminate();
        if tokio::time::timeout(self.grace, self.child.wait()).await.is_err() {
            tracing::warn!(
                program = %self.program,
                protocol = %self.meta.protocol,
                grace_ms = self.grace.as_millis() as u64,
                "Process ignored SIGINT, killing",
            );
            if let Err(e) = self.child.kill().await {
                tracing::debug!(program = %self.program, error = %e, "Kill failed");
            }
        }
        self.handle.mark_exited();
        self.stdout_task.abort();
        self.stderr_task.abort();
        tracing::info!(program = %self.program, protocol = %self.meta.protocol, "Process cancelled");
    }
}

/// Forward each line of `stream` as a `log` event and return the captured
/// bytes.
async fn forward_lines<R: AsyncRead + Unpin>(
    stream: Option<R>,
    kind: StreamKind,
    meta: ProcessMeta,
    events: EventSender,
    listeners: CancellationToken,
) -> Vec<u8> {
    let Some(stream) = stream else {
        return Vec::new();
    };
    let mut reader = BufReader::new(stream);
    let mut captured = Vec::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        match (&mut reader).take(MAX_LINE_BYTES).read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let room = MAX_OUTPUT_BYTES.saturating_sub(captured.len());
                captured.extend_from_slice(&line[..line.len().min(room)]);

                if listeners.is_cancelled() {
                    continue;
                }
                let text = String::from_utf8_lossy(trim_line_ending(&line)).into_owned();
                tracing::debug!(
                    protocol = %meta.protocol,
                    actor = ?meta.actor,
                    stream = ?kind,
                    line = %text,
                    "Process output",
                );
                events
                    .send(BenchEvent::Log(LogPayload {
                        protocol: meta.protocol,
                        actor: meta.actor,
                        stream: kind,
                        line: text,
                    }))
                    .await;
            }
            Err(e) => {
                tracing::debug!(stream = ?kind, error = %e, "Output stream read failed");
                break;
            }
        }
    }
    captured
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
