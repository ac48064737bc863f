//! The Import/Cancel controls injected into every rendered document.
//!
//! The bar is mounted on the root element, outside `<body>`, so the body's
//! inner text never contains the control labels.
//!
//! Pressing a control only records the intent in `window.__gleaner_intent`;
//! [`POLL_SCRIPT`] reads and clears it, re-injecting the controls when a
//! navigation has replaced the document.
use gleaner_core::UserIntent;
use serde::Deserialize;

pub const CONTROLS_ID: &str = "__gleaner_controls";

/// Installs the controls if the document does not have them yet. Idempotent.
pub const INSTALL_SCRIPT: &str = r#"(function () {
  var root = document.documentElement;
  if (!root || document.getElementById('__gleaner_controls')) { return false; }
  var bar = document.createElement('div');
  bar.id = '__gleaner_controls';
  bar.style.cssText = 'position:fixed;top:8px;right:8px;z-index:2147483647;display:flex;gap:6px;font:13px sans-serif;';
  function control(label, intent) {
    var b = document.createElement('button');
    b.type = 'button';
    b.textContent = label;
    b.style.cssText = 'padding:4px 10px;cursor:pointer;';
    b.addEventListener('click', function (e) {
      e.preventDefault();
      e.stopPropagation();
      window.__gleaner_intent = intent;
    });
    return b;
  }
  bar.appendChild(control('Import', 'confirm'));
  bar.appendChild(control('Cancel', 'cancel'));
  root.appendChild(bar);
  return true;
})()"#;

/// Re-installs the controls, then reports and clears any pending intent.
pub const POLL_SCRIPT: &str = r#"(function () {
  var installed = document.getElementById('__gleaner_controls') !== null;
  if (!installed && document.documentElement) {
    INSTALL;
  }
  var intent = window.__gleaner_intent || null;
  window.__gleaner_intent = null;
  return { intent: intent, url: String(location.href), installed: installed };
})()"#;

/// The poll script with the install step inlined.
pub fn poll_script() -> String {
    POLL_SCRIPT.replace("INSTALL", INSTALL_SCRIPT)
}

/// Wrap an expression for WebDriver's `execute`, which runs a function body.
pub fn as_function_body(expression: &str) -> String {
    format!("return ({expression});")
}

/// What one poll of the controls found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PollReport {
    #[serde(default)]
    pub intent: Option<String>,
    pub url: String,
    #[serde(default)]
    pub installed: bool,
}

impl PollReport {
    pub fn user_intent(&self) -> Option<UserIntent> {
        match self.intent.as_deref()? {
            "confirm" => Some(UserIntent::Confirm),
            "cancel" => Some(UserIntent::Cancel),
            _ => None,
        }
    }
}
