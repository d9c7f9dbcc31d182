//! Event payloads and their JSON shape.
//!
//! Every event serializes as `{"event": "<name>", "data": <payload>}`. Over
//! SSE the same pair becomes the `event:` and `data:` fields.

use protobench_core::comparison::ComparisonResult;
use protobench_core::protocol::Protocol;
use serde::Serialize;

/// Which kind of process a phase or log event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseState {
    Start,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// First event of every run: what is about to be executed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoPayload {
    pub ui_scenario: String,
    pub scenario: String,
    /// Rendered command line of the HTTP/2 client.
    pub cmd_h2: String,
    /// Rendered command line of the HTTP/3 client.
    pub cmd_h3: String,
}

/// A supervised process started or exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhasePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    pub actor: Actor,
    pub state: PhaseState,
    /// Exit code; `None` on start, or when the process died from a signal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
}

/// One line of process output, without its trailing newline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogPayload {
    pub protocol: Protocol,
    pub actor: Actor,
    pub stream: StreamKind,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EndPayload {
    pub ok: bool,
}

/// An event of the orchestration stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum BenchEvent {
    Info(InfoPayload),
    Phase(PhasePayload),
    Log(LogPayload),
    Result(ComparisonResult),
    Error(ErrorPayload),
    End(EndPayload),
}

impl BenchEvent {
    pub fn phase_start(protocol: Protocol, actor: Actor) -> Self {
        Self::Phase(PhasePayload {
            protocol: Some(protocol),
            actor,
            state: PhaseState::Start,
            code: None,
        })
    }

    pub fn phase_exit(protocol: Protocol, actor: Actor, code: Option<i32>) -> Self {
        Self::Phase(PhasePayload {
            protocol: Some(protocol),
            actor,
            state: PhaseState::Exit,
            code,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }

    pub fn end(ok: bool) -> Self {
        Self::End(EndPayload { ok })
    }

    /// The `event` discriminator, e.g. `"phase"`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Info(_) => "info",
            Self::Phase(_) => "phase",
            Self::Log(_) => "log",
            Self::Result(_) => "result",
            Self::Error(_) => "error",
            Self::End(_) => "end",
        }
    }

    /// The payload alone, serialized as JSON (the SSE `data:` field).
    pub fn data_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Info(p) => serde_json::to_string(p),
            Self::Phase(p) => serde_json::to_string(p),
            Self::Log(p) => serde_json::to_string(p),
            Self::Result(p) => serde_json::to_string(p),
            Self::Error(p) => serde_json::to_string(p),
            Self::End(p) => serde_json::to_string(p),
        }
    }

    /// `error` and `end` are the only events allowed through a sealed channel.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::End(_))
    }
}
