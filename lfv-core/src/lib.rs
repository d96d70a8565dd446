//! Real-time control core for a differential-drive, servo-steered line-following vehicle.
//!
//! Everything here is `no_std` and allocation-free on the control path. The
//! hardware is reached only through `embedded-hal` traits and the small seams
//! declared in [`utils::hw`], so the same tasks run on the MCU and in the
//! host-side simulator.
#![no_std]

#[cfg(test)]
extern crate std;

pub mod utils;

#[doc(hidden)]
pub use static_cell;
