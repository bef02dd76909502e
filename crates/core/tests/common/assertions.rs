//! Event-stream assertion helpers.

use fx_protocol::{AnalysisEvent, SequencedEvent};
use tokio::sync::mpsc;

/// Drain the channel until the sender side closes.
pub async fn collect(mut rx: mpsc::Receiver<SequencedEvent>) -> Vec<SequencedEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

/// Sequence numbers must start at 0 and increase by exactly 1.
pub fn assert_dense_sequence(events: &[SequencedEvent]) {
    for (index, event) in events.iter().enumerate() {
        assert_eq!(
            event.seq, index as u64,
            "gap in sequence numbers at position {index}"
        );
    }
}

/// Exactly one terminal event, and it must be last.
pub fn assert_single_terminal(events: &[SequencedEvent]) {
    let terminal_count = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminal_count, 1, "expected exactly one terminal event");
    assert!(
        events.last().is_some_and(SequencedEvent::is_terminal),
        "terminal event must be last"
    );
}

/// Count events matching a predicate.
pub fn count_matching(
    events: &[SequencedEvent],
    pred: impl Fn(&AnalysisEvent) -> bool,
) -> usize {
    events.iter().filter(|e| pred(&e.event)).count()
}

/// Index of the first event matching a predicate.
pub fn position_of(
    events: &[SequencedEvent],
    pred: impl Fn(&AnalysisEvent) -> bool,
) -> Option<usize> {
    events.iter().position(|e| pred(&e.event))
}
