//! Ordered, bounded event channel for one benchmark run.
//!
//! Senders await capacity rather than dropping events, so a slow consumer
//! applies backpressure to the run. The sender side enforces the stream's
//! cardinality rules:
//!
//! - `end` is delivered at most once and nothing follows it,
//! - `error` is delivered at most once,
//! - once [sealed](EventSender::seal), only `error` and `end` pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::event::BenchEvent;

/// Default buffer capacity of a run's event channel.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Receiving half handed to the consumer (SSE stream, test collector).
pub type EventReceiver = mpsc::Receiver<BenchEvent>;

#[derive(Debug, Default)]
struct Gate {
    sealed: AtomicBool,
    error_sent: AtomicBool,
    end_sent: AtomicBool,
}

/// Cloneable sending half shared by the orchestrator and its process readers.
#[derive(Debug, Clone)]
pub struct EventSender {
    /// `None` for a [discarding](EventSender::discard) sender.
    tx: Option<mpsc::Sender<BenchEvent>>,
    gate: Arc<Gate>,
}

/// Create a run's event channel with the given capacity.
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        EventSender {
            tx: Some(tx),
            gate: Arc::default(),
        },
        rx,
    )
}

impl EventSender {
    /// A sender with no consumer. Used by the non-streaming entry points;
    /// the cardinality rules still apply.
    pub fn discard() -> Self {
        Self {
            tx: None,
            gate: Arc::default(),
        }
    }

    /// Send one event, waiting for buffer space.
    ///
    /// Returns `true` if the event was accepted by the channel. Events
    /// rejected by the gate, or sent after the consumer went away, return
    /// `false`.
    pub async fn send(&self, event: BenchEvent) -> bool {
        if !self.admit(&event) {
            tracing::trace!(event = event.name(), "Event suppressed by channel gate");
            return false;
        }
        match &self.tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => true,
        }
    }

    fn admit(&self, event: &BenchEvent) -> bool {
        let gate = &self.gate;
        if gate.end_sent.load(Ordering::Acquire) {
            return false;
        }
        match event {
            BenchEvent::End(_) => {
                let first = gate
                    .end_sent
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok();
                if first {
                    gate.sealed.store(true, Ordering::Release);
                }
                first
            }
            BenchEvent::Error(_) => gate
                .error_sent
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok(),
            _ => !gate.sealed.load(Ordering::Acquire),
        }
    }

    /// Stop accepting anything but `error` and `end`. Idempotent.
    pub fn seal(&self) {
        self.gate.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.gate.sealed.load(Ordering::Acquire)
    }

    /// Whether an `error` event has been accepted.
    pub fn error_sent(&self) -> bool {
        self.gate.error_sent.load(Ordering::Acquire)
    }

    /// Whether the `end` event has been accepted.
    pub fn end_sent(&self) -> bool {
        self.gate.end_sent.load(Ordering::Acquire)
    }

    /// Whether the consumer has dropped its receiver. Always `false` for a
    /// discarding sender.
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.is_closed())
    }

    /// Resolve once the consumer drops its receiver. Never resolves for a
    /// discarding sender.
    pub async fn closed(&self) {
        match &self.tx {
            Some(tx) => tx.closed().await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use protobench_core::protocol::Protocol;

    use super::*;
    use crate::event::Actor;

    fn drain(rx: &mut EventReceiver) -> Vec<&'static str> {
        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        names
    }

    #[tokio::test]
    async fn events_arrive_in_send_order() {
        let (tx, mut rx) = channel(DEFAULT_CAPACITY);
        assert!(tx.send(BenchEvent::phase_start(Protocol::H2, Actor::Client)).await);
        assert!(tx.send(BenchEvent::phase_exit(Protocol::H2, Actor::Client, Some(0))).await);
        assert!(tx.send(BenchEvent::end(true)).await);
        assert_eq!(drain(&mut rx), vec!["phase", "phase", "end"]);
    }

    #[tokio::test]
    async fn end_is_delivered_exactly_once_and_is_last() {
        let (tx, mut rx) = channel(8);
        assert!(tx.send(BenchEvent::end(false)).await);
        assert!(!tx.send(BenchEvent::end(true)).await);
        assert!(!tx.send(BenchEvent::error("late")).await);
        assert!(!tx.send(BenchEvent::phase_start(Protocol::H3, Actor::Client)).await);
        assert!(tx.end_sent());
        assert_eq!(drain(&mut rx), vec!["end"]);
    }

    #[tokio::test]
    async fn error_is_delivered_at_most_once() {
        let (tx, mut rx) = channel(8);
        assert!(tx.send(BenchEvent::error("first")).await);
        assert!(!tx.send(BenchEvent::error("second")).await);
        assert!(tx.error_sent());
        assert_eq!(drain(&mut rx), vec!["error"]);
    }

    #[tokio::test]
    async fn sealed_channel_only_passes_error_and_end() {
        let (tx, mut rx) = channel(8);
        tx.seal();
        assert!(tx.is_sealed());
        assert!(!tx.send(BenchEvent::phase_start(Protocol::H2, Actor::Server)).await);
        assert!(tx.send(BenchEvent::error("aborted")).await);
        assert!(tx.send(BenchEvent::end(false)).await);
        assert_eq!(drain(&mut rx), vec!["error", "end"]);
    }

    #[tokio::test]
    async fn clones_share_the_gate() {
        let (tx, mut rx) = channel(8);
        let reader = tx.clone();
        tx.seal();
        assert!(!reader.send(BenchEvent::phase_start(Protocol::H2, Actor::Client)).await);
        assert!(reader.send(BenchEvent::end(true)).await);
        assert!(!tx.send(BenchEvent::end(true)).await);
        assert_eq!(drain(&mut rx), vec!["end"]);
    }

    #[tokio::test]
    async fn closed_resolves_when_receiver_dropped() {
        let (tx, rx) = channel(8);
        assert!(!tx.is_closed());
        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), tx.closed())
            .await
            .expect("closed() should resolve");
        assert!(tx.is_closed());
        assert!(!tx.send(BenchEvent::end(true)).await);
    }

    #[tokio::test]
    async fn discard_sender_accepts_and_never_closes() {
        let tx = EventSender::discard();
        assert!(tx.send(BenchEvent::phase_start(Protocol::H2, Actor::Client)).await);
        assert!(tx.send(BenchEvent::end(true)).await);
        assert!(!tx.send(BenchEvent::end(true)).await);
        assert!(!tx.is_closed());

        let closed = tokio::time::timeout(Duration::from_millis(20), tx.closed()).await;
        assert!(closed.is_err());
    }
}
