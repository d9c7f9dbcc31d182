//! Sequencing of one HTTP/2 vs HTTP/3 comparison.
//!
//! A run moves through [`RunState`]s: optional server start-up, the HTTP/2
//! client (run and parsed), the HTTP/3 client, parsing, comparison and
//! persistence. The two clients never overlap. Every step observes the run's
//! cancellation token, which fires on caller cancellation or when the event
//! consumer goes away.
//!
//! On failure the event channel is sealed, all processes are stopped,
//! leftover artifacts are removed, and the consumer sees one `error` (unless
//! the run was cancelled) followed by `end{ok:false}`. A run future dropped
//! mid-flight sends nothing more, but still kills its processes and removes
//! its artifacts.

use std::path::Path;
use std::sync::Arc;

use protobench_core::comparison::ComparisonResult;
use protobench_core::protocol::Protocol;
use protobench_core::scenario::Scenario;
use protobench_core::store::{NewRun, RunStore};
use protobench_core::summary::{self, Summary};
use protobench_core::types::{DbId, RunConfig};
use protobench_events::{BenchEvent, EventSender, InfoPayload};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::artifact::{self, artifact_path, ArtifactError, ArtifactGuard};
use crate::command::{client_command, CommandSpec};
use crate::config::EngineConfig;
use crate::error::PipelineError;
use crate::process::{ProcessExit, ProcessMeta, SupervisedProcess};
use crate::servers::ServerPair;

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    ServersStarting,
    ServersReady,
    /// HTTP/2 client running, then its artifact parsed.
    RunningA,
    /// HTTP/3 client running.
    RunningB,
    /// HTTP/3 artifact being parsed.
    Parsing,
    Comparing,
    Persisting,
    Done,
    Aborted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        if next == Aborted {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Idle, ServersStarting)
                | (Idle, RunningA)
                | (ServersStarting, ServersReady)
                | (ServersReady, RunningA)
                | (RunningA, RunningB)
                | (RunningB, Parsing)
                | (Parsing, Comparing)
                | (Comparing, Persisting)
                | (Persisting, Done)
        )
    }
}

// ---------------------------------------------------------------------------
// Requests and outputs
// ---------------------------------------------------------------------------

/// What to compare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareRequest {
    pub scenario: Scenario,
    /// Label the run is stored and grouped under; defaults to the scenario name.
    pub ui_scenario: String,
    /// Start the target server pair before the clients.
    pub start_servers: bool,
}

impl CompareRequest {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            ui_scenario: scenario.as_str().to_string(),
            start_servers: false,
        }
    }

    pub fn with_ui_scenario(mut self, ui_scenario: impl Into<String>) -> Self {
        self.ui_scenario = ui_scenario.into();
        self
    }

    pub fn with_servers(mut self, start_servers: bool) -> Self {
        self.start_servers = start_servers;
        self
    }

    /// Parameters recorded alongside the persisted run.
    fn run_config(&self, config: &EngineConfig) -> RunConfig {
        let mut map = RunConfig::new();
        map.insert("h2Addr".into(), config.h2_addr.clone().into());
        map.insert("h3Addr".into(), config.h3_addr.clone().into());
        map.insert("startServers".into(), self.start_servers.into());
        map
    }
}

/// Result of a single-protocol run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleRunOutput {
    pub scenario: Scenario,
    pub protocol: Protocol,
    pub summary: Summary,
    pub stdout: String,
    pub stderr: String,
}

struct RunContext {
    id: uuid::Uuid,
    state: RunState,
    artifacts: ArtifactGuard,
    servers: Option<ServerPair>,
}

impl RunContext {
    fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            state: RunState::Idle,
            artifacts: ArtifactGuard::default(),
            servers: None,
        }
    }

    fn advance(&mut self, next: RunState) {
        if !self.state.can_advance_to(next) {
            tracing::warn!(run_id = %self.id, from = ?self.state, to = ?next, "Unexpected run state transition");
        }
        tracing::debug!(run_id = %self.id, from = ?self.state, to = ?next, "Run state");
        self.state = next;
    }
}

fn checkpoint(abort: &CancellationToken) -> Result<(), PipelineError> {
    if abort.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

/// Seal the channel and abort the run once the consumer drops its receiver.
async fn watch_consumer(events: EventSender, abort: CancellationToken) {
    tokio::select! {
        _ = abort.cancelled() => {}
        _ = events.closed() => {
            tracing::info!("Event consumer disconnected, aborting run");
            events.seal();
            abort.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs benchmark clients and records their comparison.
///
/// Cheap to clone; every run it starts is independent.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<EngineConfig>,
    store: Arc<dyn RunStore>,
}

impl Orchestrator {
    pub fn new(config: EngineConfig, store: Arc<dyn RunStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a full comparison, streaming its events to `events`.
    ///
    /// `end` is always the last event sent. The run is persisted only when
    /// both summaries exist; a persistence failure does not fail the run.
    pub async fn run_comparison(
        &self,
        request: &CompareRequest,
        events: EventSender,
        cancel: CancellationToken,
    ) -> Result<ComparisonResult, PipelineError> {
        let abort = cancel.child_token();
        let watcher = tokio::spawn(watch_consumer(events.clone(), abort.clone()));
        let mut ctx = RunContext::new();

        tracing::info!(
            run_id = %ctx.id,
            scenario = %request.scenario,
            ui_scenario = %request.ui_scenario,
            start_servers = request.start_servers,
            "Comparison started",
        );

        let outcome = self.execute(request, &mut ctx, &events, &abort).await;
        watcher.abort();

        match outcome {
            Ok(result) => {
                if let Some(servers) = ctx.servers.take() {
                    servers.stop().await;
                }
                events.send(BenchEvent::end(true)).await;
                tracing::info!(
                    run_id = %ctx.id,
                    latency_winner = ?result.comparison.latency_winner,
                    throughput_winner = ?result.comparison.throughput_winner,
                    "Comparison complete",
                );
                Ok(result)
            }
            Err(err) => {
                events.seal();
                abort.cancel();
                ctx.advance(RunState::Aborted);
                if let Some(servers) = ctx.servers.take() {
                    servers.abort().await;
                }
                ctx.artifacts.clear();

                if err.is_cancellation() {
                    tracing::info!(run_id = %ctx.id, "Comparison cancelled");
                } else {
                    tracing::warn!(run_id = %ctx.id, error = %err, "Comparison failed");
                    events.send(BenchEvent::error(err.to_string())).await;
                }
                events.send(BenchEvent::end(false)).await;
                Err(err)
            }
        }
    }

    /// Non-streaming comparison: same path, events discarded.
    pub async fn compare(
        &self,
        request: &CompareRequest,
        cancel: CancellationToken,
    ) -> Result<ComparisonResult, PipelineError> {
        self.run_comparison(request, EventSender::discard(), cancel)
            .await
    }

    async fn execute(
        &self,
        request: &CompareRequest,
        ctx: &mut RunContext,
        events: &EventSender,
        abort: &CancellationToken,
    ) -> Result<ComparisonResult, PipelineError> {
        let scenario = request.scenario;
        let path_a = artifact_path(&self.config.artifact_dir, Protocol::H2);
        let path_b = artifact_path(&self.config.artifact_dir, Protocol::H3);
        ctx.artifacts = ArtifactGuard::new(vec![path_a.clone(), path_b.clone()]);

        let cmd_a = client_command(&self.config, scenario, Protocol::H2, &path_a);
        let cmd_b = client_command(&self.config, scenario, Protocol::H3, &path_b);

        events
            .send(BenchEvent::Info(InfoPayload {
                ui_scenario: request.ui_scenario.clone(),
                scenario: scenario.as_str().to_string(),
                cmd_h2: cmd_a.render(),
                cmd_h3: cmd_b.render(),
            }))
            .await;

        if request.start_servers {
            ctx.advance(RunState::ServersStarting);
            ctx.servers = Some(ServerPair::start(&self.config, events, abort).await?);
            ctx.advance(RunState::ServersReady);
        }

        checkpoint(abort)?;
        ctx.advance(RunState::RunningA);
        self.run_client_watched(&cmd_a, Protocol::H2, events, abort, ctx.servers.as_mut())
            .await?;
        let h2 = self.summarize_artifact(Protocol::H2, &path_a, abort).await?;

        checkpoint(abort)?;
        ctx.advance(RunState::RunningB);
        self.run_client_watched(&cmd_b, Protocol::H3, events, abort, ctx.servers.as_mut())
            .await?;

        checkpoint(abort)?;
        ctx.advance(RunState::Parsing);
        let h3 = self.summarize_artifact(Protocol::H3, &path_b, abort).await?;

        checkpoint(abort)?;
        ctx.advance(RunState::Comparing);
        let result = ComparisonResult::new(h2, h3);

        ctx.advance(RunState::Persisting);
        self.persist(request, &result, abort).await?;

        events.send(BenchEvent::Result(result)).await;
        ctx.advance(RunState::Done);
        Ok(result)
    }

    /// Spawn a client and require a zero exit status.
    async fn run_client(
        &self,
        spec: &CommandSpec,
        protocol: Protocol,
        events: &EventSender,
        abort: &CancellationToken,
    ) -> Result<ProcessExit, PipelineError> {
        let program = spec.program_name();
        let proc = SupervisedProcess::spawn(spec, ProcessMeta::client(protocol), events.clone())
            .await
            .map_err(|e| PipelineError::from_process(program.clone(), protocol, e))?
            .with_grace(self.config.termination_grace);

        let exit = proc
            .wait(abort)
            .await
            .map_err(|e| PipelineError::from_process(program.clone(), protocol, e))?;

        if !exit.success() {
            return Err(PipelineError::ProcessFailure {
                program,
                protocol,
                code: exit.code,
                stderr: exit.stderr,
            });
        }
        Ok(exit)
    }

    /// Like [`Self::run_client`], but a target server exiting while the
    /// client runs interrupts the client and fails the run.
    async fn run_client_watched(
        &self,
        spec: &CommandSpec,
        protocol: Protocol,
        events: &EventSender,
        abort: &CancellationToken,
        servers: Option<&mut ServerPair>,
    ) -> Result<ProcessExit, PipelineError> {
        let Some(servers) = servers else {
            return self.run_client(spec, protocol, events, abort).await;
        };
        let client_abort = abort.child_token();
        let client = self.run_client(spec, protocol, events, &client_abort);
        tokio::pin!(client);

        let server_down = tokio::select! {
            res = &mut client => return res,
            err = servers.failed() => err,
        };
        client_abort.cancel();
        let _ = client.await;
        Err(server_down)
    }

    async fn read_artifact(
        &self,
        path: &Path,
        abort: &CancellationToken,
    ) -> Result<Result<Vec<summary::Sample>, ArtifactError>, PipelineError> {
        tokio::select! {
            _ = abort.cancelled() => Err(PipelineError::Cancelled),
            res = artifact::read_samples(path) => Ok(res),
        }
    }

    async fn summarize_artifact(
        &self,
        protocol: Protocol,
        path: &Path,
        abort: &CancellationToken,
    ) -> Result<Summary, PipelineError> {
        let samples = self
            .read_artifact(path, abort)
            .await?
            .map_err(|e| PipelineError::from_artifact(protocol, e))?;
        let summary = summary::compute_with(&samples, &self.config.summary);
        tracing::info!(
            protocol = %protocol,
            samples = summary.samples,
            p50_ms = summary.p50_ms,
            rps = summary.rps,
            "Artifact summarized",
        );
        Ok(summary)
    }

    /// Best-effort write of the run and both results.
    async fn persist(
        &self,
        request: &CompareRequest,
        result: &ComparisonResult,
        abort: &CancellationToken,
    ) -> Result<Option<DbId>, PipelineError> {
        let run = NewRun {
            ui_scenario: request.ui_scenario.clone(),
            backend_scenario: request.scenario.as_str().to_string(),
            config: request.run_config(&self.config),
        };
        let write = self
            .store
            .persist_comparison(&run, &result.h2.summary, &result.h3.summary);

        tokio::select! {
            _ = abort.cancelled() => Err(PipelineError::Cancelled),
            res = write => match res {
                Ok(run_id) => {
                    tracing::info!(run_id, ui_scenario = %run.ui_scenario, "Comparison persisted");
                    Ok(Some(run_id))
                }
                Err(e) => {
                    tracing::warn!(error = %e, ui_scenario = %run.ui_scenario, "Failed to persist comparison");
                    Ok(None)
                }
            },
        }
    }

    /// Run one protocol's client and summarize it. Nothing is persisted.
    ///
    /// A client that produced no samples yields the all-zero summary.
    pub async fn run_single(
        &self,
        scenario: Scenario,
        protocol: Protocol,
        cancel: &CancellationToken,
    ) -> Result<SingleRunOutput, PipelineError> {
        let path = artifact_path(&self.config.artifact_dir, protocol);
        let spec = client_command(&self.config, scenario, protocol, &path);
        tracing::info!(scenario = %scenario, protocol = %protocol, command = %spec.render(), "Single run started");

        let _artifact = ArtifactGuard::new(vec![path.clone()]);
        self.single_inner(scenario, protocol, &spec, &path, cancel).await
    }

    async fn single_inner(
        &self,
        scenario: Scenario,
        protocol: Protocol,
        spec: &CommandSpec,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<SingleRunOutput, PipelineError> {
        let exit = self
            .run_client(spec, protocol, &EventSender::discard(), cancel)
            .await?;

        let summary = match self.read_artifact(path, cancel).await? {
            Ok(samples) => summary::compute_with(&samples, &self.config.summary),
            Err(ArtifactError::Empty) => {
                tracing::info!(protocol = %protocol, "Client produced no samples");
                Summary::default()
            }
            Err(e) => return Err(PipelineError::from_artifact(protocol, e)),
        };

        Ok(SingleRunOutput {
            scenario,
            protocol,
            summary,
            stdout: exit.stdout,
            stderr: exit.stderr,
        })
    }
}
