use crate::gleaner_browser::surface::{launch_error, WebDriverSurface};
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder};
use gleaner_common::{LaunchPayload, SessionId};
use gleaner_config::{BrowserKind, WebDriverConfig};
use gleaner_core::{SurfaceError, SurfaceHandle, SurfaceLauncher};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use webdriver::capabilities::Capabilities;

const EVENT_BUFFER: usize = 16;

/// Opens a fresh WebDriver session (one browser window) per import.
///
/// The WebDriver service itself (chromedriver, geckodriver) must already be
/// listening on `config.endpoint`.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    config: WebDriverConfig,
}

impl WebDriverLauncher {
    pub fn new(config: WebDriverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WebDriverConfig {
        &self.config
    }

    /// Session capabilities for the configured browser.
    pub fn capabilities(&self) -> Capabilities {
        let width = self.config.window_width;
        let height = self.config.window_height;
        let mut caps = Capabilities::new();

        match self.config.browser {
            BrowserKind::Chrome => {
                let mut args = vec![json!(format!("--window-size={width},{height}"))];
                if self.config.headless {
                    args.push(json!("--headless"));
                    args.push(json!("--disable-gpu"));
                }
                caps.insert("browserName".to_string(), json!("chrome"));
                caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
            }
            BrowserKind::Firefox => {
                let mut args = vec![
                    json!("-width"),
                    json!(width.to_string()),
                    json!("-height"),
                    json!(height.to_string()),
                ];
                if self.config.headless {
                    args.push(json!("-headless"));
                }
                caps.insert("browserName".to_string(), json!("firefox"));
                caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
            }
        }
        caps
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms.max(10))
    }

    async fn connect(&self) -> Result<Client, SurfaceError> {
        ClientBuilder::native()
            .capabilities(self.capabilities())
            .connect(&self.config.endpoint)
            .await
            .map_err(launch_error)
    }
}

#[async_trait]
impl SurfaceLauncher for WebDriverLauncher {
    async fn launch(
        &self,
        id: SessionId,
        payload: &LaunchPayload,
    ) -> Result<SurfaceHandle, SurfaceError> {
        let client = self.connect().await?;
        info!(
            target: "gleaner.surface",
            session = %id,
            endpoint = %self.config.endpoint,
            browser = ?self.config.browser,
            url = %payload.url,
            "browser window opened"
        );

        let (events_tx, events) = tokio::sync::mpsc::channel(EVENT_BUFFER);
        let surface = WebDriverSurface::start(id, client, events_tx, self.poll_interval());
        Ok(SurfaceHandle {
            surface: Arc::new(surface),
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher(browser: BrowserKind, headless: bool) -> WebDriverLauncher {
        WebDriverLauncher::new(WebDriverConfig {
            browser,
            headless,
            window_width: 900,
            window_height: 700,
            ..WebDriverConfig::default()
        })
    }

    #[test]
    fn chrome_capabilities_carry_window_size() {
        let caps = launcher(BrowserKind::Chrome, false).capabilities();
        assert_eq!(caps["browserName"], "chrome");
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert_eq!(args, &vec![json!("--window-size=900,700")]);
    }

    #[test]
    fn chrome_headless_adds_flags() {
        let caps = launcher(BrowserKind::Chrome, true).capabilities();
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.contains(&json!("--headless")));
        assert!(args.contains(&json!("--disable-gpu")));
    }

    #[test]
    fn firefox_capabilities() {
        let caps = launcher(BrowserKind::Firefox, true).capabilities();
        assert_eq!(caps["browserName"], "firefox");
        assert!(caps.get("goog:chromeOptions").is_none());
        let args = caps["moz:firefoxOptions"]["args"].as_array().unwrap();
        assert_eq!(args[..4], [json!("-width"), json!("900"), json!("-height"), json!("700")]);
        assert_eq!(args.last(), Some(&json!("-headless")));
    }

    #[test]
    fn poll_interval_has_a_floor() {
        let launcher = WebDriverLauncher::new(WebDriverConfig {
            poll_interval_ms: 0,
            ..WebDriverConfig::default()
        });
        assert_eq!(launcher.poll_interval(), Duration::from_millis(10));
        assert_eq!(
            WebDriverLauncher::new(WebDriverConfig::default()).poll_interval(),
            Duration::from_millis(250)
        );
    }
}
