//! Stream consumption with reconnect and resume.
//!
//! A [`StreamConsumer`] pulls sequenced events from an [`EventSource`] and
//! folds them into a [`ClientAnalysisState`]. When the stream drops before a
//! terminal event, the consumer resubscribes from `last_seq + 1` with
//! exponential backoff; overlap delivered by the source is absorbed by the
//! fold's idempotency. Exhausted attempts synthesize a local terminal error
//! so downstream consumers always observe an ending.

use async_trait::async_trait;
use fx_protocol::{AnalysisEvent, ErrorCategory, SequencedEvent};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::state::{ClientAnalysisState, ConnectionStatus};

/// Errors surfaced by stream consumption.
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// The source refused a subscription.
    #[error("Subscription failed: {0}")]
    Subscribe(String),

    /// Every reconnect attempt failed or ended without a terminal event.
    #[error("Stream lost after {attempts} reconnect attempts")]
    StreamLost { attempts: u32 },
}

/// A subscribable source of sequenced events.
///
/// `from_seq` lets a resuming consumer skip events it has already folded;
/// a source without replay support may ignore it and deliver overlap, which
/// the client fold absorbs.
#[async_trait]
pub trait EventSource: Send {
    async fn subscribe(
        &mut self,
        from_seq: u64,
    ) -> Result<mpsc::Receiver<SequencedEvent>, ConsumerError>;
}

/// One-shot source wrapping a live run's channel. No replay: the channel can
/// be subscribed exactly once, so a dropped stream cannot be resumed.
pub struct ChannelEventSource {
    rx: Option<mpsc::Receiver<SequencedEvent>>,
}

impl ChannelEventSource {
    pub fn new(rx: mpsc::Receiver<SequencedEvent>) -> Self {
        Self { rx: Some(rx) }
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn subscribe(
        &mut self,
        _from_seq: u64,
    ) -> Result<mpsc::Receiver<SequencedEvent>, ConsumerError> {
        self.rx
            .take()
            .ok_or_else(|| ConsumerError::Subscribe("channel already consumed".to_string()))
    }
}

/// Exponential backoff schedule for resubscription.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// No reconnection at all; the first drop is final.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before the given attempt (1-based), doubling up to the cap.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Folds one run's event stream into a client replica, reconnecting on drops.
pub struct StreamConsumer<S: EventSource> {
    source: S,
    policy: ReconnectPolicy,
    state: ClientAnalysisState,
    observer: Option<Box<dyn FnMut(&SequencedEvent, &ClientAnalysisState) + Send>>,
}

impl<S: EventSource> StreamConsumer<S> {
    pub fn new(source: S, policy: ReconnectPolicy) -> Self {
        Self {
            source,
            policy,
            state: ClientAnalysisState::new(),
            observer: None,
        }
    }

    /// Invoke `observer` after each newly applied event.
    pub fn with_observer(
        mut self,
        observer: impl FnMut(&SequencedEvent, &ClientAnalysisState) + Send + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> &ClientAnalysisState {
        &self.state
    }

    /// Consume until a terminal event or until reconnects are exhausted.
    ///
    /// Always returns a replica in a terminal or lost state: on exhaustion a
    /// local `error` event with the stream category is folded in before the
    /// error is returned alongside the replica.
    pub async fn run(mut self) -> Result<ClientAnalysisState, (ClientAnalysisState, ConsumerError)> {
        let mut attempt: u32 = 0;
        loop {
            let mut rx = match self.source.subscribe(self.state.next_resume_seq()).await {
                Ok(rx) => {
                    self.state.connection = ConnectionStatus::Connected;
                    attempt = 0;
                    rx
                }
                Err(err) => {
                    warn!(error = %err, attempt, "subscription failed");
                    match self.next_attempt(attempt).await {
                        Some(next) => {
                            attempt = next;
                            continue;
                        }
                        None => return Err(self.lost(attempt)),
                    }
                }
            };

            while let Some(event) = rx.recv().await {
                let terminal = event.is_terminal();
                if self.state.apply(&event) {
                    if let Some(observer) = self.observer.as_mut() {
                        observer(&event, &self.state);
                    }
                } else {
                    debug!(seq = event.seq, "skipped replayed event");
                }
                if terminal {
                    return Ok(self.state);
                }
            }

            // Stream closed without a terminal event.
            warn!(resume_from = self.state.next_resume_seq(), "stream dropped");
            match self.next_attempt(attempt).await {
                Some(next) => attempt = next,
                None => return Err(self.lost(attempt)),
            }
        }
    }

    /// Advance the attempt counter and sleep out the backoff, or signal
    /// exhaustion with `None`.
    async fn next_attempt(&mut self, attempt: u32) -> Option<u32> {
        let next = attempt + 1;
        if next > self.policy.max_attempts {
            return None;
        }
        self.state.connection = ConnectionStatus::Reconnecting { attempt: next };
        tokio::time::sleep(self.policy.delay(next)).await;
        Some(next)
    }

    fn lost(mut self, attempts: u32) -> (ClientAnalysisState, ConsumerError) {
        self.state.connection = ConnectionStatus::Lost;
        let local_error = SequencedEvent {
            seq: self.state.next_resume_seq(),
            event: AnalysisEvent::Error {
                error: format!("event stream lost after {attempts} reconnect attempts"),
                category: ErrorCategory::Stream,
                timestamp: chrono::Utc::now(),
            },
        };
        self.state.apply(&local_error);
        (self.state, ConsumerError::StreamLost { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fx_protocol::{RunStage, RunState};

    fn start_event(seq: u64) -> SequencedEvent {
        SequencedEvent {
            seq,
            event: AnalysisEvent::Start {
                query: "EUR/USD".to_string(),
                timestamp: Utc::now(),
            },
        }
    }

    fn progress_event(seq: u64, agent: &str, progress: u8) -> SequencedEvent {
        SequencedEvent {
            seq,
            event: AnalysisEvent::AgentProgress {
                agent: agent.to_string(),
                step: None,
                message: format!("{agent} at {progress}"),
                progress,
                snapshot: None,
                started_at: None,
                completed_at: None,
            },
        }
    }

    fn complete_event(seq: u64) -> SequencedEvent {
        let mut snapshot = RunState::new("EUR/USD");
        snapshot.stage = RunStage::Done;
        SequencedEvent {
            seq,
            event: AnalysisEvent::Complete {
                result: Box::new(snapshot),
            },
        }
    }

    /// Scripted source: each subscribe call serves the next segment,
    /// replaying from `from_seq` (with deliberate overlap if the segment
    /// starts earlier).
    struct ScriptedSource {
        segments: Vec<Vec<SequencedEvent>>,
        subscribe_seqs: std::sync::Arc<std::sync::Mutex<Vec<u64>>>,
    }

    impl ScriptedSource {
        fn new(segments: Vec<Vec<SequencedEvent>>) -> Self {
            Self {
                segments,
                subscribe_seqs: std::sync::Arc::default(),
            }
        }

        fn subscribe_log(&self) -> std::sync::Arc<std::sync::Mutex<Vec<u64>>> {
            std::sync::Arc::clone(&self.subscribe_seqs)
        }
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn subscribe(
            &mut self,
            from_seq: u64,
        ) -> Result<mpsc::Receiver<SequencedEvent>, ConsumerError> {
            if let Ok(mut log) = self.subscribe_seqs.lock() {
                log.push(from_seq);
            }
            if self.segments.is_empty() {
                return Err(ConsumerError::Subscribe("no more segments".to_string()));
            }
            let segment = self.segments.remove(0);
            let (tx, rx) = mpsc::channel(segment.len().max(1));
            tokio::spawn(async move {
                for event in segment {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            });
            Ok(rx)
        }
    }

    fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let policy = ReconnectPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_secs(1));
        assert_eq!(policy.delay(3), Duration::from_secs(2));
        assert_eq!(policy.delay(4), Duration::from_secs(3));
        assert_eq!(policy.delay(5), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_channel_source_consumes_to_terminal() {
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            let _ = tx.send(start_event(0)).await;
            let _ = tx.send(progress_event(1, "news", 40)).await;
            let _ = tx.send(complete_event(2)).await;
        });

        let consumer = StreamConsumer::new(
            ChannelEventSource::new(rx),
            ReconnectPolicy::none(),
        );
        let state = consumer.run().await.expect("terminal reached");

        assert_eq!(state.stage, RunStage::Done);
        assert_eq!(state.connection, ConnectionStatus::Connected);
        assert_eq!(state.last_seq, Some(2));
    }

    #[tokio::test]
    async fn test_resume_with_overlap_after_drop() {
        // First segment drops mid-run; second segment replays one event and
        // then finishes. The fold must skip the overlap exactly.
        let source = ScriptedSource::new(vec![
            vec![start_event(0), progress_event(1, "news", 40)],
            vec![progress_event(1, "news", 40), progress_event(2, "news", 80), complete_event(3)],
        ]);

        let consumer = StreamConsumer::new(source, fast_policy(3));
        let state = consumer.run().await.expect("terminal reached");

        assert_eq!(state.stage, RunStage::Done);
        assert_eq!(state.last_seq, Some(3));
    }

    #[tokio::test]
    async fn test_resume_requests_next_sequence() {
        let source = ScriptedSource::new(vec![
            vec![start_event(0), progress_event(1, "news", 40)],
            vec![progress_event(2, "news", 80), complete_event(3)],
        ]);
        let log = source.subscribe_log();

        let consumer = StreamConsumer::new(source, fast_policy(3));
        let state = consumer.run().await.expect("terminal reached");

        assert_eq!(state.last_seq, Some(3));
        let seqs = log.lock().expect("log").clone();
        assert_eq!(seqs, vec![0, 2], "resume must ask for last_seq + 1");
    }

    #[tokio::test]
    async fn test_exhausted_reconnects_synthesize_stream_error() {
        let source = ScriptedSource::new(vec![vec![start_event(0)]]);

        let consumer = StreamConsumer::new(source, fast_policy(2));
        let (state, err) = consumer.run().await.expect_err("stream is lost");

        assert!(matches!(err, ConsumerError::StreamLost { attempts: 2 }));
        assert_eq!(state.connection, ConnectionStatus::Lost);
        assert_eq!(state.stage, RunStage::Failed);
        let (message, category) = state.error.expect("synthesized error");
        assert_eq!(category, ErrorCategory::Stream);
        assert!(message.contains("reconnect"));
    }

    #[tokio::test]
    async fn test_observer_sees_each_applied_event() {
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            let _ = tx.send(start_event(0)).await;
            let _ = tx.send(complete_event(1)).await;
        });

        let (count_tx, mut count_rx) = mpsc::unbounded_channel();
        let consumer = StreamConsumer::new(
            ChannelEventSource::new(rx),
            ReconnectPolicy::none(),
        )
        .with_observer(move |event, _state| {
            let _ = count_tx.send(event.seq);
        });

        consumer.run().await.expect("terminal reached");

        let mut seen = Vec::new();
        while let Ok(seq) = count_rx.try_recv() {
            seen.push(seq);
        }
        assert_eq!(seen, vec![0, 1]);
    }
}
