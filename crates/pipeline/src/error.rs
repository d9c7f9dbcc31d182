use protobench_core::error::CoreError;
use protobench_core::protocol::Protocol;

use crate::artifact::ArtifactError;
use crate::process::ProcessError;

/// Failure of a benchmark run.
///
/// Every variant except [`Cancelled`](Self::Cancelled) is reported to the
/// event consumer as a single `error` event.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A client exited non-zero or was killed by a signal, or a target server
    /// exited while the run still needed it.
    #[error("{program} ({protocol}) {}: {}", describe_exit(.code), stderr_excerpt(.stderr))]
    ProcessFailure {
        program: String,
        protocol: Protocol,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{protocol} run produced no samples")]
    EmptyResult { protocol: Protocol },

    #[error("Malformed {protocol} result at line {line}: {reason}")]
    MalformedResult {
        protocol: Protocol,
        line: u64,
        reason: String,
    },

    #[error("Failed to read {protocol} result: {source}")]
    ArtifactIo {
        protocol: Protocol,
        #[source]
        source: std::io::Error,
    },

    #[error("Benchmark run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// `true` for caller- or consumer-initiated cancellation, which is not
    /// reported as an error event.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub(crate) fn from_artifact(protocol: Protocol, err: ArtifactError) -> Self {
        match err {
            ArtifactError::Empty => Self::EmptyResult { protocol },
            ArtifactError::Malformed { line, reason } => Self::MalformedResult {
                protocol,
                line,
                reason,
            },
            ArtifactError::Io(source) => Self::ArtifactIo { protocol, source },
        }
    }

    pub(crate) fn from_process(program: String, protocol: Protocol, err: ProcessError) -> Self {
        match err {
            ProcessError::Spawn(source) => Self::Spawn { program, source },
            ProcessError::Wait(source) => Self::ProcessFailure {
                program,
                protocol,
                code: None,
                stderr: format!("wait failed: {source}"),
            },
            ProcessError::Cancelled => Self::Cancelled,
        }
    }
}

impl From<CoreError> for PipelineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput(msg) => Self::InvalidInput(msg),
            other => Self::InvalidInput(other.to_string()),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {code}"),
        None => "was terminated by a signal".to_string(),
    }
}

/// Last non-empty stderr line, which is where Go clients put the fatal error.
fn stderr_excerpt(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no stderr output")
}
