//! Loader for gleaner configuration with YAML + environment overlays.
//!
//! Sources are merged in order: YAML files or snippets, then `GLEANER__`
//! prefixed environment variables (`GLEANER__WEBDRIVER__ENDPOINT` maps to
//! `webdriver.endpoint`). `${VAR}` placeholders in string values are expanded
//! afterwards. Every key has a default, so an empty document is valid.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GleanerConfig {
    pub version: Option<String>,
    pub webdriver: WebDriverConfig,
    pub bridge: BridgeConfig,
    pub logging: LoggingConfig,
}

/// Where and how the rendering surface is launched.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    pub endpoint: String,
    pub browser: BrowserKind,
    pub headless: bool,
    /// How often the surface checks its controls for user intent.
    pub poll_interval_ms: u64,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9515".into(),
            browser: BrowserKind::Chrome,
            headless: false,
            poll_interval_ms: 250,
            window_width: 1100,
            window_height: 800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chrome,
    Firefox,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Sessions allowed on screen at once; further calls wait for a slot.
    pub max_concurrent_sessions: usize,
    /// Rewrite known guide hosts to their print view before opening.
    pub normalize_guide_urls: bool,
    /// Treat a blank import as an error at the host.
    pub require_text: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 1,
            normalize_guide_urls: true,
            require_text: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormatKind,
    pub emit_stderr: bool,
    pub filter: String,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormatKind::Text,
            emit_stderr: false,
            filter: "info".into(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatKind {
    Text,
    Json,
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring.
pub struct GleanerConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    files: Vec<(PathBuf, bool)>,
    snippets: Vec<String>,
}

impl Default for GleanerConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl GleanerConfigLoader {
    /// Start with no files; `GLEANER__` environment overrides always apply last.
    ///
    /// ```
    /// use gleaner_config::GleanerConfigLoader;
    ///
    /// let config = GleanerConfigLoader::new()
    ///     .with_yaml_str("version: '1'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.bridge.max_concurrent_sessions, 1);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            files: Vec::new(),
            snippets: Vec::new(),
        }
    }

    /// Attach a required YAML/TOML/JSON file; the format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files.push((path.as_ref().to_path_buf(), true));
        self
    }

    /// Attach a file that is skipped when absent, for env-only setups.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files.push((path.as_ref().to_path_buf(), false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use gleaner_config::{BrowserKind, GleanerConfigLoader};
    ///
    /// let cfg = GleanerConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// webdriver:
    ///   endpoint: "http://127.0.0.1:4444"
    ///   browser: firefox
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.webdriver.endpoint, "http://127.0.0.1:4444");
    /// assert_eq!(cfg.webdriver.browser, BrowserKind::Firefox);
    /// assert_eq!(cfg.webdriver.poll_interval_ms, 250);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.snippets.push(yaml.to_string());
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders, and deserialize.
    pub fn load(self) -> Result<GleanerConfig, ConfigError> {
        let mut builder = self.builder;
        for (path, required) in &self.files {
            builder = builder.add_source(File::from(path.as_path()).required(*required));
        }
        for yaml in &self.snippets {
            builder = builder.add_source(File::from_str(yaml, config::FileFormat::Yaml));
        }
        builder = builder.add_source(
            Environment::with_prefix("GLEANER")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("GLEANER_TEST_HOST", Some("grid"), || {
            let mut v = json!("http://${GLEANER_TEST_HOST}:4444");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("http://grid:4444"));
        });
    }

    #[test]
    fn expands_nested_values() {
        temp_env::with_vars(
            [("LOG_ROOT", Some("/var/log")), ("APP", Some("gleaner"))],
            || {
                let mut v = json!({
                    "logging": { "dir": "${LOG_ROOT}/${APP}" },
                    "list": ["$APP", 3, false, null]
                });
                expand_env_in_value(&mut v);
                assert_eq!(
                    v,
                    json!({
                        "logging": { "dir": "/var/log/gleaner" },
                        "list": ["gleaner", 3, false, null]
                    })
                );
            },
        );
    }

    #[test]
    fn stops_on_cycles() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${GLEANER_DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${GLEANER_DOES_NOT_EXIST}"));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = GleanerConfigLoader::new().with_yaml_str("{}").load().unwrap();
        assert_eq!(cfg.version, None);
        assert_eq!(cfg.webdriver.endpoint, "http://localhost:9515");
        assert!(!cfg.webdriver.headless);
        assert!(cfg.bridge.normalize_guide_urls);
        assert!(cfg.bridge.require_text);
        assert_eq!(cfg.logging.format, LogFormatKind::Text);
    }
}
