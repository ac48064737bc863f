//! WebDriver-backed rendering surfaces.
//!
//! - [`gleaner_browser::driver::WebDriverLauncher`]: opens one browser session per import
//! - [`gleaner_browser::surface::WebDriverSurface`]: the [`gleaner_core::Surface`] over that session
//! - [`gleaner_browser::overlay`]: in-page Import/Cancel controls and their polling script
pub mod gleaner_browser;

pub use gleaner_browser::driver::WebDriverLauncher;
pub use gleaner_browser::surface::WebDriverSurface;
