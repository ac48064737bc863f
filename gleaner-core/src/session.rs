//! One import session: a rendered surface driven to exactly one result.
//!
//! ```text
//! Launched ──nav done──▶ Loaded ──confirm──▶ Extracting ──value──▶ Completed
//!    │                     │                     │
//!    └──────confirm────────┼─────────────────────┘
//!    any non-terminal ──cancel──▶ Cancelled
//!    any non-terminal ──destroyed / host reclaim──▶ TornDown
//! ```
//!
//! The user may act before the first render finishes, so `Launched` and
//! `Loaded` both accept intents. Further in-surface navigation is logged and
//! otherwise ignored.
use crate::extract::{normalize_extraction, EXTRACTION_SCRIPT};
use crate::surface::{Surface, SurfaceError, SurfaceEvent, SurfaceHandle, UserIntent};
use gleaner_common::{ImportResult, LaunchPayload, SessionId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Launched,
    Loaded,
    Extracting,
    Completed,
    Cancelled,
    TornDown,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::TornDown
        )
    }

    /// Whether user intents are accepted in this state.
    pub fn awaits_intent(self) -> bool {
        matches!(self, SessionState::Launched | SessionState::Loaded)
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Launched, Loaded) => true,
            (Launched | Loaded, Extracting) => true,
            (Extracting, Completed) => true,
            (Launched | Loaded | Extracting, Cancelled | TornDown) => true,
            _ => false,
        }
    }
}

enum IntentWait {
    Confirmed,
    Finished(ImportResult),
}

pub struct ImportSession {
    id: SessionId,
    target_url: String,
    state: SessionState,
}

impl ImportSession {
    pub fn new(id: SessionId, launch: LaunchPayload) -> Self {
        Self {
            id,
            target_url: launch.url,
            state: SessionState::Launched,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the surface until a terminal state and return its result.
    ///
    /// The surface is closed before this returns, and also if the returned
    /// future is dropped early.
    pub async fn run(mut self, handle: SurfaceHandle, reclaim: CancellationToken) -> ImportResult {
        let SurfaceHandle {
            surface,
            mut events,
        } = handle;
        let guard = SurfaceGuard::new(self.id, Arc::clone(&surface));

        let result = match self.await_intent(&surface, &mut events, &reclaim).await {
            IntentWait::Finished(result) => result,
            IntentWait::Confirmed => self.extract(&surface, &mut events, &reclaim).await,
        };

        guard.release().await;
        info!(
            target: "gleaner.session",
            session = %self.id,
            state = ?self.state,
            outcome = ?result.outcome,
            chars = result.text.chars().count(),
            "session finished"
        );
        result
    }

    async fn await_intent(
        &mut self,
        surface: &Arc<dyn Surface>,
        events: &mut mpsc::Receiver<SurfaceEvent>,
        reclaim: &CancellationToken,
    ) -> IntentWait {
        let nav_surface = Arc::clone(surface);
        let url = self.target_url.clone();
        let navigation = async move { nav_surface.navigate(&url).await };
        tokio::pin!(navigation);
        let mut navigating = true;

        info!(target: "gleaner.session", session = %self.id, url = %self.target_url, "surface launched");

        loop {
            tokio::select! {
                biased;
                _ = reclaim.cancelled() => {
                    return IntentWait::Finished(self.tear_down("surface reclaimed"));
                }
                event = events.recv() => match event {
                    Some(SurfaceEvent::Intent(UserIntent::Cancel)) => {
                        return IntentWait::Finished(self.cancel());
                    }
                    Some(SurfaceEvent::Intent(UserIntent::Confirm)) => {
                        self.advance(SessionState::Extracting);
                        return IntentWait::Confirmed;
                    }
                    Some(SurfaceEvent::Navigated { url }) => {
                        debug!(target: "gleaner.session", session = %self.id, %url, "in-surface navigation");
                    }
                    Some(SurfaceEvent::Destroyed) | None => {
                        return IntentWait::Finished(self.tear_down("surface destroyed"));
                    }
                },
                outcome = &mut navigation, if navigating => {
                    navigating = false;
                    match outcome {
                        Ok(()) => {
                            self.advance(SessionState::Loaded);
                        }
                        Err(SurfaceError::Closed) => {
                            return IntentWait::Finished(self.tear_down("surface closed while loading"));
                        }
                        Err(error) => {
                            warn!(target: "gleaner.session", session = %self.id, %error, "initial navigation failed; surface stays open");
                        }
                    }
                }
            }
        }
    }

    async fn extract(
        &mut self,
        surface: &Arc<dyn Surface>,
        events: &mut mpsc::Receiver<SurfaceEvent>,
        reclaim: &CancellationToken,
    ) -> ImportResult {
        debug!(target: "gleaner.session", session = %self.id, "evaluating extraction script");
        let evaluation = surface.evaluate(EXTRACTION_SCRIPT);
        tokio::pin!(evaluation);

        loop {
            tokio::select! {
                biased;
                _ = reclaim.cancelled() => {
                    return self.tear_down("surface reclaimed");
                }
                event = events.recv() => match event {
                    Some(SurfaceEvent::Intent(UserIntent::Cancel)) => return self.cancel(),
                    Some(SurfaceEvent::Intent(UserIntent::Confirm)) => {
                        debug!(target: "gleaner.session", session = %self.id, "extraction already running");
                    }
                    Some(SurfaceEvent::Navigated { url }) => {
                        debug!(target: "gleaner.session", session = %self.id, %url, "navigation during extraction");
                    }
                    Some(SurfaceEvent::Destroyed) | None => {
                        return self.tear_down("surface destroyed during extraction");
                    }
                },
                value = &mut evaluation => {
                    return match value {
                        Ok(value) => self.complete(normalize_extraction(&value)),
                        Err(SurfaceError::Closed) => self.tear_down("surface closed during extraction"),
                        Err(error) => {
                            warn!(target: "gleaner.extract", session = %self.id, %error, "extraction failed; using empty text");
                            self.complete(String::new())
                        }
                    };
                }
            }
        }
    }

    fn advance(&mut self, next: SessionState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(target: "gleaner.session", session = %self.id, from = ?self.state, to = ?next, "illegal transition ignored");
            return false;
        }
        debug!(target: "gleaner.session", session = %self.id, from = ?self.state, to = ?next, "transition");
        self.state = next;
        true
    }

    fn complete(&mut self, text: String) -> ImportResult {
        self.advance(SessionState::Completed);
        ImportResult::completed(text)
    }

    fn cancel(&mut self) -> ImportResult {
        self.advance(SessionState::Cancelled);
        ImportResult::cancelled()
    }

    fn tear_down(&mut self, reason: &str) -> ImportResult {
        info!(target: "gleaner.session", session = %self.id, reason, "session torn down without a result");
        self.advance(SessionState::TornDown);
        ImportResult::no_data()
    }
}

/// Closes the surface on every exit path.
struct SurfaceGuard {
    id: SessionId,
    surface: Option<Arc<dyn Surface>>,
}

impl SurfaceGuard {
    fn new(id: SessionId, surface: Arc<dyn Surface>) -> Self {
        Self {
            id,
            surface: Some(surface),
        }
    }

    async fn release(mut self) {
        if let Some(surface) = self.surface.take() {
            if let Err(error) = surface.close().await {
                warn!(target: "gleaner.surface", session = %self.id, %error, "surface close failed");
            }
        }
    }
}

impl Drop for SurfaceGuard {
    fn drop(&mut self) {
        let Some(surface) = self.surface.take() else {
            return;
        };
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(error) = surface.close().await {
                        warn!(target: "gleaner.surface", session = %id, %error, "surface close failed");
                    }
                });
            }
            Err(_) => {
                warn!(target: "gleaner.surface", session = %id, "no runtime to release surface");
            }
        }
    }
}
