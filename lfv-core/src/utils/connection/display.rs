//! Character display pages and the non-blocking main loop.
//!
//! The display driver itself lives outside this crate behind [`Display`]. The
//! main loop only feeds the watchdog and repaints; it never waits on input.

use core::fmt::Write as _;

use embassy_time::Duration;
use embedded_hal::delay::DelayNs;
use heapless::String;

use crate::utils::{
    config::SplashConfig,
    controllers::{
        menu::{page, PageKind},
        params::PersistentParameters,
    },
    hw::Watchdog,
    state::{ActuatorOutputs, Channel, ChannelReadings, ControlState, SharedState},
};

/// Width of one display row in characters.
pub const COLUMNS: u8 = 16;

/// Character display collaborator.
pub trait Display {
    type Error: core::fmt::Debug;

    fn clear(&mut self) -> Result<(), Self::Error>;

    fn set_cursor(
        &mut self,
        col: u8,
        row: u8,
    ) -> Result<(), Self::Error>;

    fn write_str(
        &mut self,
        text: &str,
    ) -> Result<(), Self::Error>;

    /// Horizontal bar gauge, `percent` in 0..=100.
    fn bar(
        &mut self,
        col: u8,
        row: u8,
        width: u8,
        percent: u8,
    ) -> Result<(), Self::Error>;

    fn home(&mut self) -> Result<(), Self::Error> {
        self.set_cursor(0, 0)
    }

    /// Signed integer right-justified in a `width`-character field.
    fn write_int(
        &mut self,
        value: i32,
        width: u8,
    ) -> Result<(), Self::Error> {
        let mut digits: String<12> = String::new();
        let _ = write!(digits, "{}", value);
        let mut field: String<{ COLUMNS as usize }> = String::new();
        for _ in digits.len()..width.min(COLUMNS) as usize {
            let _ = field.push(' ');
        }
        let _ = field.push_str(&digits);
        self.write_str(&field)
    }
}

/// Copy of everything a page may show, taken once per refresh.
#[derive(Debug, Clone, Copy)]
pub struct View {
    pub control: ControlState,
    pub readings: ChannelReadings,
    pub params: PersistentParameters,
    pub outputs: ActuatorOutputs,
    pub speed: u8,
}

impl View {
    pub fn capture(shared: &SharedState) -> Self {
        Self {
            control: shared.control(),
            readings: shared.readings(),
            params: shared.params(),
            outputs: shared.outputs(),
            speed: shared.speed().speed,
        }
    }
}

/// Paint the current page. With `redraw` the screen is cleared and the page
/// title rewritten first.
pub fn render<D: Display>(
    display: &mut D,
    view: &View,
    redraw: bool,
) -> Result<(), D::Error> {
    display.home()?;

    let Some(page) = page(view.control.menu_index) else {
        return Ok(());
    };

    if redraw {
        display.clear()?;
        display.write_str(page.label)?;
    }

    match page.kind {
        PageKind::Overview => {
            display.write_str(view.control.mode.label())?;
            display.write_str("  S:")?;
            display.write_int(view.outputs.steering as i32, 6)?;
            display.set_cursor(0, 1)?;
            display.write_str("V:")?;
            display.write_int(view.speed as i32, 5)?;
            display.write_str(" D:")?;
            display.write_int(view.outputs.drive as i32, 6)?;
        }
        PageKind::Parameter(slot) => {
            display.set_cursor(0, 1)?;
            display.write_int(view.params.get(slot) as i32, COLUMNS)?;
        }
        PageKind::Reading(ch @ (Channel::SensorLeft | Channel::SensorRight)) => {
            let value = view.readings.get(ch);
            display.set_cursor(0, 1)?;
            display.write_int(value as i32, 5)?;
            display.bar(6, 1, 10, (value / 10).clamp(0, 100) as u8)?;
        }
        PageKind::Reading(ch) => {
            display.set_cursor(10, 1)?;
            display.write_int(view.readings.get(ch) as i32, 6)?;
        }
    }
    Ok(())
}

/// Main-loop side of the firmware: display, watchdog and boot splash.
pub struct Frontend<D, W> {
    display: D,
    watchdog: W,
}

impl<D, W> Frontend<D, W>
where
    D: Display,
    W: Watchdog,
{
    pub fn new(
        display: D,
        watchdog: W,
    ) -> Self {
        Self { display, watchdog }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// Two-line splash, held for `hold_ms`, then cleared.
    pub fn splash<T: DelayNs>(
        &mut self,
        splash: &SplashConfig,
        delay: &mut T,
    ) -> Result<(), D::Error> {
        self.display.clear()?;
        self.display.write_str(&splash.lines[0])?;
        self.display.set_cursor(0, 1)?;
        self.display.write_str(&splash.lines[1])?;
        delay.delay_ms(splash.hold_ms);
        self.display.clear()
    }

    /// Arm the watchdog. Called once the splash is gone; from here on every
    /// [`Frontend::poll`] must come within `timeout`.
    pub fn enable_watchdog(
        &mut self,
        timeout: Duration,
    ) {
        self.watchdog.enable(timeout);
        tracing::info!(timeout_ms = timeout.as_millis(), "watchdog enabled");
    }

    /// One main-loop iteration.
    pub fn poll(
        &mut self,
        shared: &SharedState,
    ) -> Result<(), D::Error> {
        self.watchdog.feed();
        let redraw = shared.take_redraw();
        let view = View::capture(shared);
        render(&mut self.display, &view, redraw)
    }
}
