use crate::gleaner_browser::overlay::{as_function_body, poll_script, PollReport, INSTALL_SCRIPT};
use async_trait::async_trait;
use fantoccini::Client;
use gleaner_common::SessionId;
use gleaner_core::{Surface, SurfaceError, SurfaceEvent};
use serde_json::Value;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Driver messages meaning the browser window or session is gone.
const WINDOW_LOST_MARKERS: &[&str] = &[
    "no such window",
    "target window already closed",
    "invalid session id",
    "session deleted",
    "chrome not reachable",
    "disconnected",
    "browsing context has been discarded",
    "connection refused",
    "webdriver session was lost",
];

/// Whether a driver error means the surface no longer exists.
pub fn is_window_lost(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    WINDOW_LOST_MARKERS.iter().any(|m| message.contains(m))
}

pub(crate) fn launch_error(error: impl Display) -> SurfaceError {
    SurfaceError::Launch(error.to_string())
}

fn command_error(error: impl Display, otherwise: impl FnOnce(String) -> SurfaceError) -> SurfaceError {
    let message = error.to_string();
    if is_window_lost(&message) {
        SurfaceError::Closed
    } else {
        otherwise(message)
    }
}

/// One browser window driven over WebDriver.
///
/// A background task polls the injected controls and reports intents,
/// in-window navigation, and loss of the window on the session's event channel.
pub struct WebDriverSurface {
    id: SessionId,
    client: Client,
    poller: CancellationToken,
    closed: AtomicBool,
}

impl WebDriverSurface {
    pub(crate) fn start(
        id: SessionId,
        client: Client,
        events: mpsc::Sender<SurfaceEvent>,
        interval: Duration,
    ) -> Self {
        let poller = CancellationToken::new();
        tokio::spawn(poll_controls(
            id,
            client.clone(),
            events,
            poller.clone(),
            interval,
        ));
        Self {
            id,
            client,
            poller,
            closed: AtomicBool::new(false),
        }
    }

    async fn install_controls(&self) {
        match self.client.execute(&as_function_body(INSTALL_SCRIPT), vec![]).await {
            Ok(_) => {}
            Err(error) => {
                debug!(target: "gleaner.surface", session = %self.id, %error, "controls not installed yet");
            }
        }
    }
}

#[async_trait]
impl Surface for WebDriverSurface {
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        self.client.goto(url).await.map_err(|error| {
            command_error(error, |reason| SurfaceError::Navigation {
                url: url.to_string(),
                reason,
            })
        })?;
        self.install_controls().await;
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, SurfaceError> {
        self.client
            .execute(&as_function_body(expression), vec![])
            .await
            .map_err(|error| command_error(error, SurfaceError::Evaluation))
    }

    async fn close(&self) -> Result<(), SurfaceError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.poller.cancel();
        match self.client.clone().close().await {
            Ok(()) => {
                info!(target: "gleaner.surface", session = %self.id, "browser window closed");
                Ok(())
            }
            Err(error) if is_window_lost(&error.to_string()) => Ok(()),
            Err(error) => Err(SurfaceError::Driver(error.to_string())),
        }
    }
}

/// Events for one poll of the controls, in delivery order.
///
/// The first URL seen is the baseline; every later change is a navigation.
/// A pressed control is reported after any navigation found by the same poll.
pub(crate) fn poll_events(last_url: &mut Option<String>, report: &PollReport) -> Vec<SurfaceEvent> {
    let mut events = Vec::with_capacity(2);
    if last_url.as_deref() != Some(report.url.as_str()) {
        if last_url.is_some() {
            events.push(SurfaceEvent::Navigated {
                url: report.url.clone(),
            });
        }
        *last_url = Some(report.url.clone());
    }
    if let Some(intent) = report.user_intent() {
        events.push(SurfaceEvent::Intent(intent));
    }
    events
}

async fn poll_controls(
    id: SessionId,
    client: Client,
    events: mpsc::Sender<SurfaceEvent>,
    stop: CancellationToken,
    interval: Duration,
) {
    let script = as_function_body(&poll_script());
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_url: Option<String> = None;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let value = match client.execute(&script, vec![]).await {
            Ok(value) => value,
            Err(error) if is_window_lost(&error.to_string()) => {
                if !stop.is_cancelled() {
                    warn!(target: "gleaner.surface", session = %id, %error, "browser window lost");
                    let _ = events.send(SurfaceEvent::Destroyed).await;
                }
                break;
            }
            Err(error) => {
                // Pages mid-navigation reject scripts; the next tick retries.
                debug!(target: "gleaner.surface", session = %id, %error, "poll failed");
                continue;
            }
        };

        let report: PollReport = match serde_json::from_value(value) {
            Ok(report) => report,
            Err(error) => {
                debug!(target: "gleaner.surface", session = %id, %error, "unexpected poll report");
                continue;
            }
        };

        for event in poll_events(&mut last_url, &report) {
            if let SurfaceEvent::Intent(intent) = &event {
                debug!(target: "gleaner.surface", session = %id, ?intent, "control pressed");
            }
            if events.send(event).await.is_err() {
                return;
            }
        }
    }
    debug!(target: "gleaner.surface", session = %id, "control polling stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use gleaner_core::UserIntent;

    #[test]
    fn window_loss_messages_are_recognised() {
        for message in [
            "no such window: target window already closed",
            "invalid session id",
            "Webdriver session was lost",
            "unknown error: chrome not reachable",
            "Browsing context has been discarded",
        ] {
            assert!(is_window_lost(message), "{message}");
        }
    }

    #[test]
    fn script_errors_are_not_window_loss() {
        for message in [
            "javascript error: pick is not defined",
            "script timeout",
            "unknown error: net::ERR_NAME_NOT_RESOLVED",
        ] {
            assert!(!is_window_lost(message), "{message}");
        }
    }

    fn report(url: &str, intent: Option<&str>) -> PollReport {
        PollReport {
            intent: intent.map(str::to_owned),
            url: url.to_string(),
            installed: true,
        }
    }

    #[test]
    fn first_url_is_a_baseline() {
        let mut last = None;
        assert!(poll_events(&mut last, &report("https://a/", None)).is_empty());
        assert_eq!(last.as_deref(), Some("https://a/"));
        assert!(poll_events(&mut last, &report("https://a/", None)).is_empty());
    }

    #[test]
    fn url_changes_become_navigations() {
        let mut last = Some("https://a/".to_string());
        assert_eq!(
            poll_events(&mut last, &report("https://a/guides", None)),
            vec![SurfaceEvent::Navigated {
                url: "https://a/guides".into()
            }]
        );
        assert_eq!(last.as_deref(), Some("https://a/guides"));
    }

    #[test]
    fn intent_follows_navigation_from_the_same_poll() {
        let mut last = Some("https://a/".to_string());
        assert_eq!(
            poll_events(&mut last, &report("https://a/2", Some("confirm"))),
            vec![
                SurfaceEvent::Navigated {
                    url: "https://a/2".into()
                },
                SurfaceEvent::Intent(UserIntent::Confirm),
            ]
        );
        assert_eq!(
            poll_events(&mut last, &report("https://a/2", Some("cancel"))),
            vec![SurfaceEvent::Intent(UserIntent::Cancel)]
        );
    }

    #[test]
    fn intent_on_first_poll_is_reported() {
        let mut last = None;
        assert_eq!(
            poll_events(&mut last, &report("https://a/", Some("cancel"))),
            vec![SurfaceEvent::Intent(UserIntent::Cancel)]
        );
    }

    #[test]
    fn command_errors_classify() {
        assert!(matches!(
            command_error("no such window", SurfaceError::Evaluation),
            SurfaceError::Closed
        ));
        match command_error("javascript error: boom", SurfaceError::Evaluation) {
            SurfaceError::Evaluation(message) => assert!(message.contains("boom")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
