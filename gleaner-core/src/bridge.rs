//! Caller-facing entry point.
//!
//! [`ImportBridge::open`] validates the request, launches one session on a
//! background task, and suspends the caller on a registered continuation until
//! that session settles it. Every path settles exactly once: the session's own
//! result, or "no data" if the task ends any other way. Dropping the `open`
//! future tears its session down and frees the slot.
use crate::registry::{PendingCalls, SettleGuard};
use crate::session::ImportSession;
use crate::surface::SurfaceLauncher;
use gleaner_common::{
    BridgeError, ImportRequest, ImportResult, LaunchPayload, OkPayload, Result, SessionId,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Foreground slots; a session holds one for its whole lifetime.
    pub max_concurrent_sessions: usize,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 1,
        }
    }
}

pub struct ImportBridge {
    launcher: Arc<dyn SurfaceLauncher>,
    pending: PendingCalls,
    slots: Arc<Semaphore>,
    reclaim: CancellationToken,
}

impl ImportBridge {
    pub fn new(launcher: Arc<dyn SurfaceLauncher>, options: BridgeOptions) -> Self {
        Self {
            launcher,
            pending: PendingCalls::new(),
            slots: Arc::new(Semaphore::new(options.max_concurrent_sessions.max(1))),
            reclaim: CancellationToken::new(),
        }
    }

    /// Tie live sessions to a host-wide token; cancelling it tears them down.
    pub fn with_reclaim(mut self, token: CancellationToken) -> Self {
        self.reclaim = token;
        self
    }

    /// Tear down every live session. Their callers are rejected with
    /// [`BridgeError::NoData`].
    pub fn shutdown(&self) {
        info!(target: "gleaner.bridge", pending = self.pending.len(), "host reclaiming all surfaces");
        self.reclaim.cancel();
    }

    /// Calls still waiting for their session.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Import the visible text of `request.url`, driven by the user.
    pub async fn open(&self, request: ImportRequest) -> Result<OkPayload> {
        let Some(url) = request.target_url() else {
            warn!(target: "gleaner.bridge", "rejected request without a usable url");
            return Err(BridgeError::InvalidRequest);
        };

        let id = SessionId::new();
        let launch = LaunchPayload {
            url: url.to_string(),
        };
        let continuation = self.pending.register(id);
        let guard = SettleGuard::new(self.pending.clone(), id);

        info!(target: "gleaner.bridge", session = %id, url = %launch.url, "opening import session");

        let launcher = Arc::clone(&self.launcher);
        let slots = Arc::clone(&self.slots);
        let session_token = self.reclaim.child_token();
        // A caller that stops waiting takes its session down with it.
        let _abandon = session_token.clone().drop_guard();
        tokio::spawn(async move {
            let result = run_session(launcher, slots, id, launch, session_token).await;
            guard.settle(result);
        });

        let result = continuation.await.unwrap_or_else(|_| {
            error!(target: "gleaner.bridge", session = %id, "session vanished without settling");
            ImportResult::no_data()
        });
        debug!(target: "gleaner.bridge", session = %id, outcome = ?result.outcome, "call settled");
        BridgeError::settle(result)
    }

    /// JSON form of [`open`](Self::open): `{ "url": .. }` in, `{ "text": .. }` out.
    ///
    /// A missing or non-string `url` is an invalid request.
    pub async fn call(&self, args: Value) -> Result<Value> {
        let request = ImportRequest {
            url: args.get("url").and_then(Value::as_str).map(str::to_owned),
        };
        let payload = self.open(request).await?;
        Ok(json!({ "text": payload.text }))
    }
}

async fn run_session(
    launcher: Arc<dyn SurfaceLauncher>,
    slots: Arc<Semaphore>,
    id: SessionId,
    launch: LaunchPayload,
    reclaim: CancellationToken,
) -> ImportResult {
    let _slot = tokio::select! {
        permit = slots.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return ImportResult::no_data(),
        },
        _ = reclaim.cancelled() => {
            debug!(target: "gleaner.bridge", session = %id, "reclaimed while waiting for a slot");
            return ImportResult::no_data();
        }
    };

    let handle = match launcher.launch(id, &launch).await {
        Ok(handle) => handle,
        Err(error) => {
            error!(target: "gleaner.bridge", session = %id, %error, "surface launch failed");
            return ImportResult::no_data();
        }
    };

    ImportSession::new(id, launch).run(handle, reclaim).await
}
