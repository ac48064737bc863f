//! Pending calls waiting for their session to terminate.
//!
//! Each `open` registers a oneshot continuation under its [`SessionId`].
//! Whichever terminal event reaches [`PendingCalls::settle`] first removes the
//! entry and wins; anything later finds nothing and is dropped.
use dashmap::DashMap;
use gleaner_common::{ImportResult, SessionId};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Default, Clone)]
pub struct PendingCalls {
    calls: Arc<DashMap<SessionId, oneshot::Sender<ImportResult>>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a continuation for `id`. Registering the same id twice
    /// replaces the earlier continuation, whose receiver then sees a closed
    /// channel.
    pub fn register(&self, id: SessionId) -> oneshot::Receiver<ImportResult> {
        let (tx, rx) = oneshot::channel();
        self.calls.insert(id, tx);
        rx
    }

    /// Deliver the terminal result for `id`.
    ///
    /// Returns `false` when the call was already settled or never registered.
    pub fn settle(&self, id: SessionId, result: ImportResult) -> bool {
        let Some((_, tx)) = self.calls.remove(&id) else {
            debug!(target: "gleaner.bridge", session = %id, outcome = ?result.outcome, "late result discarded");
            return false;
        };
        if tx.send(result).is_err() {
            debug!(target: "gleaner.bridge", session = %id, "caller stopped waiting before settlement");
        }
        true
    }

    pub fn is_pending(&self, id: SessionId) -> bool {
        self.calls.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Settles a pending call with "no data" unless settled explicitly.
///
/// Owned by the task running a session, so an aborted or panicking session
/// still releases its caller.
pub struct SettleGuard {
    calls: PendingCalls,
    id: SessionId,
    settled: bool,
}

impl SettleGuard {
    pub fn new(calls: PendingCalls, id: SessionId) -> Self {
        Self {
            calls,
            id,
            settled: false,
        }
    }

    pub fn settle(mut self, result: ImportResult) -> bool {
        self.settled = true;
        self.calls.settle(self.id, result)
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.calls.settle(self.id, ImportResult::no_data());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gleaner_common::Outcome;

    #[tokio::test]
    async fn first_settlement_wins() {
        let calls = PendingCalls::new();
        let id = SessionId::new();
        let rx = calls.register(id);
        assert!(calls.is_pending(id));

        assert!(calls.settle(id, ImportResult::cancelled()));
        assert!(!calls.settle(id, ImportResult::completed("late")));
        assert!(calls.is_empty());

        assert_eq!(rx.await.unwrap().outcome, Outcome::Cancelled);
    }

    #[tokio::test]
    async fn unknown_ids_are_ignored() {
        let calls = PendingCalls::new();
        assert!(!calls.settle(SessionId::new(), ImportResult::no_data()));
    }

    #[tokio::test]
    async fn dropped_guard_reports_no_data() {
        let calls = PendingCalls::new();
        let id = SessionId::new();
        let rx = calls.register(id);
        drop(SettleGuard::new(calls.clone(), id));
        assert_eq!(rx.await.unwrap(), ImportResult::no_data());
        assert_eq!(calls.len(), 0);
    }

    #[tokio::test]
    async fn explicit_settle_disarms_guard() {
        let calls = PendingCalls::new();
        let id = SessionId::new();
        let rx = calls.register(id);
        let guard = SettleGuard::new(calls.clone(), id);
        assert!(guard.settle(ImportResult::completed("text")));
        assert_eq!(rx.await.unwrap(), ImportResult::completed("text"));
    }

    #[tokio::test]
    async fn panicking_task_still_settles() {
        let calls = PendingCalls::new();
        let id = SessionId::new();
        let rx = calls.register(id);
        let guard = SettleGuard::new(calls.clone(), id);
        let task = tokio::spawn(async move {
            let _guard = guard;
            panic!("session crashed");
        });
        assert!(task.await.is_err());
        assert_eq!(rx.await.unwrap().outcome, Outcome::Failed);
    }
}
