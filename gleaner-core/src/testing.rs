//! In-memory rendering surface for exercising sessions without a browser.
//!
//! [`FakeLauncher`] hands out one [`FakeSurface`] per launch and publishes a
//! [`FakeSurfaceController`] for it, which tests use to play the user: finish
//! loading, navigate, press the controls, or close the window.
//!
//! ```ignore
//! let (launcher, mut sessions) = FakeLauncher::new(FakeDocument::with_body("hi"));
//! let bridge = ImportBridge::new(Arc::new(launcher), BridgeOptions::default());
//! let call = tokio::spawn(async move { bridge.open(ImportRequest::new("https://x")).await });
//! sessions.next().await.unwrap().confirm().await;
//! assert_eq!(call.await??.text, "hi");
//! ```
use crate::extract::EXTRACTION_SCRIPT;
use crate::surface::{
    Surface, SurfaceError, SurfaceEvent, SurfaceHandle, SurfaceLauncher, UserIntent,
};
use async_trait::async_trait;
use gleaner_common::{LaunchPayload, SessionId};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};

/// What [`EXTRACTION_SCRIPT`] picks, computed on the host.
///
/// Takes the inner text of the first preformatted element and of the body, as
/// a document would report them.
pub fn select_text<'a>(pre: Option<&'a str>, body: Option<&'a str>) -> &'a str {
    if let Some(pre) = pre.filter(|p| !p.trim().is_empty()) {
        return pre;
    }
    body.filter(|b| !b.is_empty()).unwrap_or("")
}

/// The parts of a document the extraction step looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeDocument {
    pub pre: Option<String>,
    pub body: Option<String>,
}

impl FakeDocument {
    /// `<body></body>`
    pub fn empty() -> Self {
        Self::default()
    }

    /// `<body>{text}</body>`
    pub fn with_body(text: impl Into<String>) -> Self {
        Self {
            pre: None,
            body: Some(text.into()),
        }
    }

    /// `<body><pre>{text}</pre></body>`; the body's inner text is the same text.
    pub fn with_pre(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            pre: Some(text.clone()),
            body: Some(text),
        }
    }

    pub fn inner_text(&self) -> String {
        select_text(self.pre.as_deref(), self.body.as_deref()).to_string()
    }
}

/// What evaluating the extraction script returns.
#[derive(Debug, Clone)]
pub enum Evaluation {
    /// Run the extraction policy against the current document.
    Document,
    /// Return this value verbatim.
    Raw(Value),
    /// Fail inside the page.
    Error(String),
    /// Fail because the surface is gone.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Open,
    Held,
}

#[derive(Debug, Clone)]
struct FakeSettings {
    document: FakeDocument,
    evaluation: Evaluation,
    navigation: Gate,
    evaluation_gate: Gate,
    fail_navigation: bool,
    fail_launch: bool,
}

struct SurfaceState {
    document: FakeDocument,
    evaluation: Evaluation,
    fail_navigation: bool,
    navigated_to: Vec<String>,
    evaluations: usize,
    closes: usize,
}

/// Launches [`FakeSurface`]s and reports a controller for each.
#[derive(Clone)]
pub struct FakeLauncher {
    settings: Arc<Mutex<FakeSettings>>,
    launches: Arc<AtomicUsize>,
    sessions: mpsc::UnboundedSender<FakeSurfaceController>,
}

/// Stream of controllers, one per launched surface, in launch order.
pub struct FakeSessions {
    rx: mpsc::UnboundedReceiver<FakeSurfaceController>,
}

impl FakeSessions {
    pub async fn next(&mut self) -> Option<FakeSurfaceController> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<FakeSurfaceController> {
        self.rx.try_recv().ok()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeLauncher {
    pub fn new(document: FakeDocument) -> (Self, FakeSessions) {
        let (tx, rx) = mpsc::unbounded_channel();
        let launcher = Self {
            settings: Arc::new(Mutex::new(FakeSettings {
                document,
                evaluation: Evaluation::Document,
                navigation: Gate::Open,
                evaluation_gate: Gate::Open,
                fail_navigation: false,
                fail_launch: false,
            })),
            launches: Arc::new(AtomicUsize::new(0)),
            sessions: tx,
        };
        (launcher, FakeSessions { rx })
    }

    /// Keep initial navigation pending until [`FakeSurfaceController::finish_loading`].
    pub fn hold_navigation(self) -> Self {
        lock(&self.settings).navigation = Gate::Held;
        self
    }

    /// Keep evaluations pending until [`FakeSurfaceController::release_evaluation`].
    pub fn hold_evaluation(self) -> Self {
        lock(&self.settings).evaluation_gate = Gate::Held;
        self
    }

    pub fn evaluation(self, evaluation: Evaluation) -> Self {
        lock(&self.settings).evaluation = evaluation;
        self
    }

    pub fn fail_navigation(self) -> Self {
        lock(&self.settings).fail_navigation = true;
        self
    }

    pub fn fail_launch(self) -> Self {
        lock(&self.settings).fail_launch = true;
        self
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SurfaceLauncher for FakeLauncher {
    async fn launch(
        &self,
        id: SessionId,
        payload: &LaunchPayload,
    ) -> Result<SurfaceHandle, SurfaceError> {
        let settings = lock(&self.settings).clone();
        if settings.fail_launch {
            return Err(SurfaceError::Launch("fake launcher refused".into()));
        }
        self.launches.fetch_add(1, Ordering::SeqCst);

        let (events_tx, events_rx) = mpsc::channel(32);
        let (loaded_tx, loaded_rx) = watch::channel(settings.navigation == Gate::Open);
        let (eval_tx, eval_rx) = watch::channel(settings.evaluation_gate == Gate::Open);
        let state = Arc::new(Mutex::new(SurfaceState {
            document: settings.document,
            evaluation: settings.evaluation,
            fail_navigation: settings.fail_navigation,
            navigated_to: Vec::new(),
            evaluations: 0,
            closes: 0,
        }));

        let surface = FakeSurface {
            state: Arc::clone(&state),
            _events: events_tx.clone(),
            loaded: loaded_rx,
            evaluation_gate: eval_rx,
        };
        let controller = FakeSurfaceController {
            id,
            url: payload.url.clone(),
            state,
            events: events_tx,
            loaded: Arc::new(loaded_tx),
            evaluation_gate: Arc::new(eval_tx),
        };
        let _ = self.sessions.send(controller);

        Ok(SurfaceHandle {
            surface: Arc::new(surface),
            events: events_rx,
        })
    }
}

pub struct FakeSurface {
    state: Arc<Mutex<SurfaceState>>,
    // Keeps the event channel open for as long as the surface exists.
    _events: mpsc::Sender<SurfaceEvent>,
    loaded: watch::Receiver<bool>,
    evaluation_gate: watch::Receiver<bool>,
}

async fn wait_open(gate: &watch::Receiver<bool>) -> Result<(), SurfaceError> {
    let mut gate = gate.clone();
    gate.wait_for(|open| *open)
        .await
        .map(|_| ())
        .map_err(|_| SurfaceError::Closed)
}

#[async_trait]
impl Surface for FakeSurface {
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        lock(&self.state).navigated_to.push(url.to_string());
        wait_open(&self.loaded).await?;
        if lock(&self.state).fail_navigation {
            return Err(SurfaceError::Navigation {
                url: url.to_string(),
                reason: "fake network error".into(),
            });
        }
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, SurfaceError> {
        lock(&self.state).evaluations += 1;
        wait_open(&self.evaluation_gate).await?;

        let state = lock(&self.state);
        if expression != EXTRACTION_SCRIPT {
            return Err(SurfaceError::Evaluation("unexpected script".into()));
        }
        match &state.evaluation {
            Evaluation::Document => serde_json::to_string(&state.document.inner_text())
                .map(Value::String)
                .map_err(|e| SurfaceError::Evaluation(e.to_string())),
            Evaluation::Raw(value) => Ok(value.clone()),
            Evaluation::Error(message) => Err(SurfaceError::Evaluation(message.clone())),
            Evaluation::Closed => Err(SurfaceError::Closed),
        }
    }

    async fn close(&self) -> Result<(), SurfaceError> {
        lock(&self.state).closes += 1;
        Ok(())
    }
}

/// Plays the user (and the host window manager) for one fake surface.
#[derive(Clone)]
pub struct FakeSurfaceController {
    id: SessionId,
    url: String,
    state: Arc<Mutex<SurfaceState>>,
    events: mpsc::Sender<SurfaceEvent>,
    loaded: Arc<watch::Sender<bool>>,
    evaluation_gate: Arc<watch::Sender<bool>>,
}

impl FakeSurfaceController {
    pub fn session_id(&self) -> SessionId {
        self.id
    }

    /// URL from the launch payload.
    pub fn launch_url(&self) -> &str {
        &self.url
    }

    pub fn finish_loading(&self) {
        let _ = self.loaded.send(true);
    }

    pub fn release_evaluation(&self) {
        let _ = self.evaluation_gate.send(true);
    }

    pub fn set_document(&self, document: FakeDocument) {
        lock(&self.state).document = document;
    }

    pub async fn confirm(&self) {
        self.emit(SurfaceEvent::Intent(UserIntent::Confirm)).await;
    }

    pub async fn cancel(&self) {
        self.emit(SurfaceEvent::Intent(UserIntent::Cancel)).await;
    }

    pub async fn navigate(&self, url: impl Into<String>) {
        self.emit(SurfaceEvent::Navigated { url: url.into() }).await;
    }

    /// Close the window without using either control.
    pub async fn destroy(&self) {
        self.emit(SurfaceEvent::Destroyed).await;
    }

    /// Send an event; a session that already finished is not an error.
    pub async fn emit(&self, event: SurfaceEvent) {
        let _ = self.events.send(event).await;
    }

    pub fn navigations(&self) -> Vec<String> {
        lock(&self.state).navigated_to.clone()
    }

    pub fn evaluations(&self) -> usize {
        lock(&self.state).evaluations
    }

    pub fn closes(&self) -> usize {
        lock(&self.state).closes
    }

    pub fn is_closed(&self) -> bool {
        self.closes() > 0
    }
}
