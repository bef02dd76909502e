//! Sequence-numbered event emission.
//!
//! Every observable transition funnels through one [`Emitter`] per run, which
//! stamps a monotonically increasing sequence number and pushes onto the
//! run's single-subscriber channel. Delivery order therefore equals emission
//! order equals causal order.

use fx_protocol::{AnalysisEvent, SequencedEvent};
use tokio::sync::mpsc::Sender;

/// Single point of emission for one run's event stream.
///
/// The emitter never drops or reorders events. A closed receiver is
/// tolerated silently (the subscriber walked away); the engine keeps its own
/// authoritative `RunState` regardless.
pub struct Emitter {
    tx: Sender<SequencedEvent>,
    next_seq: u64,
}

impl Emitter {
    pub fn new(tx: Sender<SequencedEvent>) -> Self {
        Self { tx, next_seq: 0 }
    }

    /// Stamp the next sequence number onto `event` and push it.
    pub async fn emit(&mut self, event: AnalysisEvent) {
        let sequenced = SequencedEvent {
            seq: self.next_seq,
            event,
        };
        self.next_seq += 1;
        let _ = self.tx.send(sequenced).await;
    }

    /// Sequence number the next emitted event will carry.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_sequence_numbers_are_dense() {
        let (tx, mut rx) = mpsc::channel(10);
        let mut emitter = Emitter::new(tx);

        for _ in 0..3 {
            emitter
                .emit(AnalysisEvent::Start {
                    query: "EUR/USD".to_string(),
                    timestamp: Utc::now(),
                })
                .await;
        }

        for expected in 0..3 {
            let event = rx.recv().await.expect("event");
            assert_eq!(event.seq, expected);
        }
        assert_eq!(emitter.next_seq(), 3);
    }

    #[tokio::test]
    async fn test_closed_receiver_is_tolerated() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut emitter = Emitter::new(tx);

        // Must not panic or error; the send result is discarded.
        emitter
            .emit(AnalysisEvent::Start {
                query: "EUR/USD".to_string(),
                timestamp: Utc::now(),
            })
            .await;
        assert_eq!(emitter.next_seq(), 1);
    }
}
