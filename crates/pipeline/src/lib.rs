//! Benchmark orchestration: launching client and server processes, reading
//! their result artifacts, and driving a full HTTP/2 vs HTTP/3 comparison.
//!
//! - [`process`] supervises one external process and streams its output.
//! - [`artifact`] reads the per-request CSV a client writes.
//! - [`command`] builds client and server invocations.
//! - [`servers`] manages the optional target server pair.
//! - [`orchestrator`] sequences a run and emits its event stream.

pub mod artifact;
pub mod command;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod process;
pub mod servers;

pub use config::{ConfigError, EngineConfig};
pub use error::PipelineError;
pub use orchestrator::{CompareRequest, Orchestrator, RunState, SingleRunOutput};
