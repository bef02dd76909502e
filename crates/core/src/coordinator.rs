//! Parallel task coordination.
//!
//! Each analysis task runs in its own tokio task and reports through a
//! shared mailbox. A single consumer loop owns all state mutation and event
//! emission, so per-task updates are serialized without locks. The mailbox
//! closing (every sender dropped) is the join barrier: once `recv` returns
//! `None`, every task has finished or panicked.

use fx_protocol::{AgentTaskState, AnalysisEvent, QueryContext, RunState, TaskResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::collaborators::base::{now, AnalysisTask, ProgressSink, TaskError, TaskSignal};
use crate::emitter::Emitter;
use crate::error::EngineError;

/// Drive all analysis tasks to completion, folding their signals into
/// `state` and emitting the per-task event stream.
///
/// Failures are isolated: a task that errors, times out, or panics is
/// recorded as failed while its siblings keep running. The only error this
/// function returns is cancellation.
pub async fn run_tasks(
    tasks: &[Arc<dyn AnalysisTask>],
    context: &QueryContext,
    state: &mut RunState,
    emitter: &mut Emitter,
    task_deadline: Option<Duration>,
    cancel: &CancelToken,
) -> Result<(), EngineError> {
    let (tx, mut rx) = mpsc::channel::<TaskSignal>(tasks.len().max(1) * 8);

    let mut handles = Vec::with_capacity(tasks.len());
    for task in tasks {
        let name = task.name().to_string();
        state
            .tasks
            .insert(name.clone(), AgentTaskState::new(name.clone()));

        let task = Arc::clone(task);
        let pair = context.pair.clone();
        let context = context.clone();
        let sink = ProgressSink::new(name.clone(), tx.clone());
        handles.push((
            name,
            tokio::spawn(async move {
                sink.started().await;
                let work = task.run(&pair, &context, sink.clone());
                let outcome = match task_deadline {
                    Some(deadline) => match tokio::time::timeout(deadline, work).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(TaskError::ExecutionError(format!(
                            "deadline of {}ms exceeded",
                            deadline.as_millis()
                        ))),
                    },
                    None => work.await,
                };
                match outcome {
                    Ok(data) => sink.terminal(TaskResult::ok(data)).await,
                    Err(err) => sink.terminal(TaskResult::failed(err.to_string())).await,
                }
            }),
        ));
    }
    // The consumer must not hold a sender, or recv would never return None.
    drop(tx);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                for (name, handle) in &handles {
                    debug!(task = %name, "aborting task on cancellation");
                    handle.abort();
                }
                return Err(EngineError::Cancelled);
            }
            signal = rx.recv() => {
                let Some(signal) = signal else { break };
                apply_signal(signal, state, emitter).await;
            }
        }
    }

    // A task that panicked dropped its sender without a terminal signal;
    // surface it as a failure like any other.
    for (name, handle) in handles {
        let panicked = matches!(handle.await, Err(err) if err.is_panic());
        if let Some(task_state) = state.tasks.get_mut(&name) {
            if !task_state.status.is_terminal() {
                if panicked {
                    warn!(task = %name, "task panicked");
                }
                let reason = if panicked {
                    "task panicked"
                } else {
                    "task ended without reporting a result"
                };
                task_state.finish(TaskResult::failed(reason), now());
                emitter
                    .emit(AnalysisEvent::AgentUpdate {
                        agent: name,
                        result: TaskResult::failed(reason),
                    })
                    .await;
            }
        }
    }

    Ok(())
}

async fn apply_signal(signal: TaskSignal, state: &mut RunState, emitter: &mut Emitter) {
    match signal {
        TaskSignal::Started { agent } => {
            let timestamp = now();
            if let Some(task) = state.tasks.get_mut(&agent) {
                task.start(timestamp);
            }
            emitter
                .emit(AnalysisEvent::AgentStart { agent, timestamp })
                .await;
        }
        TaskSignal::Progress {
            agent,
            step,
            message,
            percent,
            snapshot,
        } => {
            let Some(task) = state.tasks.get_mut(&agent) else {
                return;
            };
            task.record_progress(step.clone(), message.clone(), percent, snapshot.clone());
            emitter
                .emit(AnalysisEvent::AgentProgress {
                    agent,
                    step,
                    message,
                    progress: task.progress,
                    snapshot,
                    started_at: task.started_at,
                    completed_at: task.completed_at,
                })
                .await;
        }
        TaskSignal::Search { agent, record } => {
            if let Some(task) = state.tasks.get_mut(&agent) {
                task.record_search(record.clone());
            }
            emitter
                .emit(AnalysisEvent::WebSearch {
                    agent,
                    queries: record.queries,
                    references: record.references,
                })
                .await;
        }
        TaskSignal::Terminal { agent, result } => {
            if let Some(task) = state.tasks.get_mut(&agent) {
                task.finish(result.clone(), now());
            }
            emitter
                .emit(AnalysisEvent::AgentUpdate { agent, result })
                .await;
        }
    }
}
