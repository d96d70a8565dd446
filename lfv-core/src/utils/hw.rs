//! Hardware seams that `embedded-hal` 1.0 does not cover.
//!
//! Digital inputs, PWM outputs and delays use the `embedded-hal` traits
//! directly; the analog converter and the watchdog are declared here.

use embassy_time::Duration;

use crate::utils::state::Channel;

/// Single shared analog-to-digital converter with a channel multiplexer.
///
/// `start` selects the channel and triggers one conversion; the completion
/// interrupt then calls `read` exactly once.
pub trait Converter {
    type Error: core::fmt::Debug;

    fn start(
        &mut self,
        channel: Channel,
    ) -> Result<(), Self::Error>;

    /// Result of the conversion that just completed, 10-bit right aligned.
    fn read(&mut self) -> Result<u16, Self::Error>;
}

/// Hardware watchdog. Off until enabled; afterwards it must be fed at least
/// once per timeout or the MCU resets.
pub trait Watchdog {
    fn enable(
        &mut self,
        timeout: Duration,
    );

    fn feed(&mut self);
}
