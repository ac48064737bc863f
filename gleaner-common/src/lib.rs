//! Common types and utilities shared across gleaner crates.
//!
//! This crate defines the import data model, the caller-visible error
//! taxonomy, and observability helpers used throughout the gleaner
//! workspace. It stays dependency-light so every crate can depend on it.
//!
//! # Overview
//!
//! - [`ImportRequest`]: what a caller hands to the bridge
//! - [`ImportResult`] and [`Outcome`]: what a session reports exactly once
//! - [`OkPayload`]: the value an `open` call resolves with
//! - [`LaunchPayload`]: what the bridge passes to a freshly launched session
//! - [`SessionId`]: key under which a pending call waits for its session
//! - [`BridgeError`] and [`Result`]: caller-visible rejections
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use gleaner_common::{ImportRequest, ImportResult, Outcome};
//!
//! let req = ImportRequest::new("  https://example.com/guide  ");
//! assert_eq!(req.target_url(), Some("  https://example.com/guide  "));
//! assert_eq!(ImportRequest::new("   ").target_url(), None);
//!
//! let done = ImportResult::completed("hello");
//! assert_eq!(done.outcome, Outcome::Ok);
//! assert_eq!(ImportResult::cancelled().text, "");
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod observability;

/// A caller's request to import the visible text of a page.
///
/// `url` is optional on the wire so that a missing field can be rejected the
/// same way as a blank one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub url: Option<String>,
}

impl ImportRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }

    /// The URL to load, or `None` when it is missing or blank after trimming.
    ///
    /// The returned slice is the caller's original, untrimmed value.
    pub fn target_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

/// Identifier of one import session; each request gets a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload passed from the bridge to a session at launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchPayload {
    pub url: String,
}

/// Terminal status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Ok,
    Cancelled,
    Failed,
}

/// The single message a session hands back when it terminates.
///
/// `text` is only meaningful when `outcome` is [`Outcome::Ok`]; it may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub outcome: Outcome,
    pub text: String,
}

impl ImportResult {
    pub fn completed(text: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Ok,
            text: text.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            outcome: Outcome::Cancelled,
            text: String::new(),
        }
    }

    /// Session ended without a result payload.
    pub fn no_data() -> Self {
        Self {
            outcome: Outcome::Failed,
            text: String::new(),
        }
    }
}

/// Resolve value of a successful `open` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkPayload {
    pub text: String,
}

/// Rejections a caller of the bridge can observe.
///
/// The display strings are the identifiers hosts match on.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    /// The URL was missing or blank; no session was started.
    #[error("Invalid URL")]
    InvalidRequest,

    /// The user dismissed the surface with the cancel control.
    #[error("User cancelled")]
    UserCancelled,

    /// The session ended without producing a result payload.
    #[error("Import returned no data")]
    NoData,
}

impl BridgeError {
    /// Map a terminal session result onto the caller-visible resolution.
    pub fn settle(result: ImportResult) -> Result<OkPayload> {
        match result.outcome {
            Outcome::Ok => Ok(OkPayload { text: result.text }),
            Outcome::Cancelled => Err(BridgeError::UserCancelled),
            Outcome::Failed => Err(BridgeError::NoData),
        }
    }
}

/// Convenient alias for results that use [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;
