//! Interactive extraction bridge.
//!
//! A caller asks for the visible text of a page; the user navigates to it in a
//! rendering surface and either imports or cancels. Three pieces cooperate:
//!
//! - [`bridge::ImportBridge`]: validates the request, launches a session, and
//!   settles the caller's pending call exactly once
//! - [`session::ImportSession`]: drives one surface through its lifecycle
//! - [`extract`]: the script evaluated inside the rendered document and the
//!   decoding of its result
//!
//! Surfaces are supplied by a [`surface::SurfaceLauncher`]; `gleaner-drivers`
//! provides a WebDriver-backed one and [`testing`] an in-memory fake.
pub mod bridge;
pub mod extract;
pub mod registry;
pub mod session;
pub mod surface;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bridge::{BridgeOptions, ImportBridge};
pub use session::{ImportSession, SessionState};
pub use surface::{Surface, SurfaceError, SurfaceEvent, SurfaceHandle, SurfaceLauncher, UserIntent};
