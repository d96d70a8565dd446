//! Utility re-exports and helper macros for the line-following vehicle.
//!
//! - `config`: tunable constants and feature switches
//! - `state`: state shared between the interrupt contexts and the main loop
//! - `hw`: hardware seams not covered by `embedded-hal`
//! - `inputs`: analog sampler, input debouncer, speed sensor
//! - `controllers`: PID, menu state machine, actuation mapper, parameter store
//! - `connection`: display refresh and telemetry framing
//! - `sched`: periodic task table and deterministic dispatcher
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod config;
pub mod connection;
pub mod controllers;
pub mod hw;
pub mod inputs;
pub mod sched;
pub mod state;

pub use config::Config;
pub use controllers::Vehicle;
pub use embassy_time::{Duration, Instant};
pub use sched::{Scheduler, TaskKind};
pub use state::SharedState;

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: $crate::static_cell::StaticCell<$t> =
            $crate::static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
