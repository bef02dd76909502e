//! Cooperative cancellation for runs.
//!
//! A subscriber may cancel a run at any point before the terminal event. The
//! engine and coordinator poll the token at their await points; in-flight
//! analysis tasks are aborted best-effort. A cancelled run closes its stream
//! without emitting a terminal event.

use tokio::sync::watch;

/// Create a linked cancellation handle/token pair.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx: Some(rx) })
}

/// Subscriber-side handle used to request cancellation.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signal every holder of the linked token.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Engine-side token observed at await points.
#[derive(Clone)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// A token that can never fire, for runs without a cancelling subscriber.
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Whether cancellation has already been requested.
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolve once cancellation is requested; pend forever otherwise.
    pub async fn cancelled(&self) {
        let Some(rx) = self.rx.as_ref() else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        // Handle dropped without firing: never resolves.
        std::future::pending().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_fires_waiters() {
        let (handle, token) = cancel_pair();
        assert!(!token.is_cancelled());

        let waiter = tokio::spawn({
            let token = token.clone();
            async move {
                token.cancelled().await;
            }
        });

        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should resolve after cancel")
            .expect("waiter task panicked");
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_never_token_pends() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());

        let result =
            tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(result.is_err(), "never-token must not resolve");
    }

    #[tokio::test]
    async fn test_already_cancelled_resolves_immediately() {
        let (handle, token) = cancel_pair();
        handle.cancel();
        tokio::time::timeout(Duration::from_millis(50), token.cancelled())
            .await
            .expect("pre-cancelled token should resolve at once");
    }
}
