pub mod driver;
pub mod overlay;
pub mod surface;
