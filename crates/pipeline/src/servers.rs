//! The optional pair of target servers started before a comparison.

use std::time::Duration;

use protobench_core::protocol::Protocol;
use protobench_events::EventSender;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::command::server_command;
use crate::config::EngineConfig;
use crate::error::PipelineError;
use crate::process::{ProcessError, ProcessExit, ProcessHandle, ProcessMeta, SupervisedProcess};

struct RunningServer {
    protocol: Protocol,
    handle: ProcessHandle,
    task: JoinHandle<Result<ProcessExit, ProcessError>>,
}

/// A server that exited before it was asked to stop.
#[derive(Debug)]
struct ServerDown {
    program: String,
    protocol: Protocol,
    exit: ProcessExit,
}

impl From<ServerDown> for PipelineError {
    fn from(down: ServerDown) -> Self {
        PipelineError::ProcessFailure {
            program: down.program,
            protocol: down.protocol,
            code: down.exit.code,
            stderr: down.exit.stderr,
        }
    }
}

enum Settle {
    Ready,
    Cancelled,
    Down(ServerDown),
}

/// Both target servers, each supervised by its own wait task.
///
/// Dropping the pair kills both servers.
pub struct ServerPair {
    servers: Vec<RunningServer>,
    /// Cancels the wait tasks, which interrupt and then kill the servers.
    token: CancellationToken,
    /// Set before a requested shutdown so that exit is not reported as a failure.
    stopping: CancellationToken,
    down: mpsc::Receiver<ServerDown>,
    grace: Duration,
    _kill_on_drop: DropGuard,
}

impl ServerPair {
    /// Start the HTTP/2 and HTTP/3 servers, then wait the settle interval.
    ///
    /// If `cancel` fires, a server fails to spawn, or a server exits before
    /// the interval elapses, anything already started is torn down before
    /// returning.
    pub async fn start(
        config: &EngineConfig,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<Self, PipelineError> {
        let token = cancel.child_token();
        let (down_tx, down_rx) = mpsc::channel(Protocol::ALL.len());
        let mut pair = Self {
            servers: Vec::with_capacity(Protocol::ALL.len()),
            _kill_on_drop: token.clone().drop_guard(),
            token,
            stopping: CancellationToken::new(),
            down: down_rx,
            grace: config.termination_grace,
        };

        for protocol in Protocol::ALL {
            let spec = server_command(config, protocol);
            let program = spec.program_name();
            let proc = match SupervisedProcess::spawn(&spec, ProcessMeta::server(protocol), events.clone()).await {
                Ok(proc) => proc.with_grace(config.termination_grace),
                Err(err) => {
                    pair.abort().await;
                    return Err(PipelineError::from_process(program, protocol, err));
                }
            };
            let handle = proc.handle();
            let token = pair.token.clone();
            let stopping = pair.stopping.clone();
            let down_tx = down_tx.clone();
            let task = tokio::spawn(async move {
                let res = proc.wait(&token).await;
                if let Ok(exit) = &res {
                    if !stopping.is_cancelled() {
                        tracing::warn!(protocol = %protocol, code = ?exit.code, "Server exited unexpectedly");
                        let _ = down_tx
                            .send(ServerDown {
                                program,
                                protocol,
                                exit: exit.clone(),
                            })
                            .await;
                    }
                }
                res
            });
            pair.servers.push(RunningServer {
                protocol,
                handle,
                task,
            });
        }
        drop(down_tx);

        tracing::info!(settle_ms = config.server_settle.as_millis() as u64, "Servers started, settling");
        let settled = tokio::select! {
            _ = cancel.cancelled() => Settle::Cancelled,
            Some(down) = pair.down.recv() => Settle::Down(down),
            _ = tokio::time::sleep(config.server_settle) => Settle::Ready,
        };
        match settled {
            Settle::Ready => Ok(pair),
            Settle::Cancelled => {
                pair.abort().await;
                Err(PipelineError::Cancelled)
            }
            Settle::Down(down) => {
                pair.abort().await;
                Err(down.into())
            }
        }
    }

    /// Resolves once either server exits without being asked to.
    ///
    /// Never resolves if both servers stay up.
    pub async fn failed(&mut self) -> PipelineError {
        match self.down.recv().await {
            Some(down) => down.into(),
            None => std::future::pending().await,
        }
    }

    /// Interrupt both servers and wait for their exit phases.
    ///
    /// A server still running after the grace period is killed.
    pub async fn stop(self) {
        self.stopping.cancel();
        for server in &self.servers {
            server.handle.terminate();
        }
        for server in self.servers {
            let mut task = server.task;
            match tokio::time::timeout(self.grace, &mut task).await {
                Ok(Ok(Ok(exit))) => {
                    tracing::info!(protocol = %server.protocol, code = ?exit.code, "Server stopped");
                }
                Ok(Ok(Err(e))) => {
                    tracing::warn!(protocol = %server.protocol, error = %e, "Server wait failed");
                }
                Ok(Err(e)) => {
                    tracing::warn!(protocol = %server.protocol, error = %e, "Server task failed");
                }
                Err(_) => {
                    self.token.cancel();
                    let _ = task.await;
                }
            }
        }
    }

    /// Tear down without waiting for a clean exit.
    pub async fn abort(self) {
        self.stopping.cancel();
        self.token.cancel();
        for server in self.servers {
            let _ = server.task.await;
        }
    }
}
