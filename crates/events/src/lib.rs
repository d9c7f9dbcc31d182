//! Orchestration event protocol.
//!
//! - [`BenchEvent`] is the closed set of events one benchmark run emits.
//! - [`channel`] creates the ordered, bounded per-run channel that carries
//!   them, with the cardinality rules (`end` exactly once, `error` at most
//!   once, sealing on abort) enforced by [`EventSender`].

pub mod channel;
pub mod event;

pub use channel::{channel, EventReceiver, EventSender, DEFAULT_CAPACITY};
pub use event::{
    Actor, BenchEvent, EndPayload, ErrorPayload, InfoPayload, LogPayload, PhasePayload,
    PhaseState, StreamKind,
};
