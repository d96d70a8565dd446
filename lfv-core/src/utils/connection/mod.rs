//! Module Exports
//!
//! Outward-facing surfaces of the vehicle.
//!
//! - `display`: character display pages and the main-loop refresh
//! - `telemetry`: serial status lines and remote setpoints

/// Display pages, splash screen and watchdog-feeding main loop.
pub mod display;
pub mod telemetry;

pub use display::{Display, Frontend};
pub use telemetry::{NoLink, StatusFrame, Telemetry};
