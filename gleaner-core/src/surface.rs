//! Contract between an import session and the rendering surface it drives.
//!
//! A surface renders one URL, lets the user browse, and reports two intents
//! (`confirm`, `cancel`) plus its own destruction. Script evaluation happens
//! inside the rendered document and comes back as a JSON value.
use async_trait::async_trait;
use gleaner_common::{LaunchPayload, SessionId};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Which of the two user-facing controls was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIntent {
    Confirm,
    Cancel,
}

/// Signals emitted by a live surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Intent(UserIntent),
    /// The user navigated inside the surface. Sessions treat this as transparent.
    Navigated { url: String },
    /// The surface was closed by the user or the host without an intent.
    Destroyed,
}

#[derive(thiserror::Error, Debug)]
pub enum SurfaceError {
    #[error("surface launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("driver command failed: {0}")]
    Driver(String),

    /// The surface no longer exists.
    #[error("surface closed")]
    Closed,
}

/// One rendered browsing surface, exclusively owned by one session.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Start loading `url`. Resolves once the initial render completed.
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError>;

    /// Evaluate a JavaScript expression in the rendered document.
    async fn evaluate(&self, expression: &str) -> Result<Value, SurfaceError>;

    /// Release the surface. Calling it more than once is harmless.
    async fn close(&self) -> Result<(), SurfaceError>;
}

/// A freshly launched surface together with its event stream.
///
/// A closed event channel means the surface is gone.
pub struct SurfaceHandle {
    pub surface: Arc<dyn Surface>,
    pub events: mpsc::Receiver<SurfaceEvent>,
}

/// Creates a new surface for every session.
#[async_trait]
pub trait SurfaceLauncher: Send + Sync {
    async fn launch(
        &self,
        id: SessionId,
        payload: &LaunchPayload,
    ) -> Result<SurfaceHandle, SurfaceError>;
}
