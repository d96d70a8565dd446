//! State shared between interrupt contexts and the main loop.
//!
//! Each datum lives in its own `blocking_mutex::Mutex<CriticalSectionRawMutex, Cell<T>>`.
//! Readers take a copy inside the critical section, so multi-byte values
//! (readings, gains, duty values) are never observed half-written. Task-local
//! state (debounce counters, sampler cursor, PID history) stays inside the
//! task objects and never appears here.

use core::cell::Cell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use serde::{Deserialize, Serialize};

use crate::utils::controllers::params::PersistentParameters;

/// Number of analog channels wired to the converter.
pub const CHANNEL_COUNT: usize = 4;

/// Vehicle operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Halt,
    Auto,
    Manual,
}

impl Mode {
    /// Fixed-width label for the overview page.
    pub fn label(self) -> &'static str {
        match self {
            Mode::Halt => "Stop  ",
            Mode::Auto => "Auto  ",
            Mode::Manual => "Manual",
        }
    }
}

/// Analog input channels, in converter multiplexer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Channel {
    SensorLeft = 0,
    SensorRight = 1,
    BattLogic = 2,
    BattDrive = 3,
}

impl Channel {
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::SensorLeft,
        Channel::SensorRight,
        Channel::BattLogic,
        Channel::BattDrive,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Channel> {
        Self::ALL.get(index).copied()
    }
}

/// Latest raw reading per channel (0..=1023).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelReadings {
    raw: [i16; CHANNEL_COUNT],
}

impl ChannelReadings {
    pub const fn new() -> Self {
        Self {
            raw: [0; CHANNEL_COUNT],
        }
    }

    #[inline]
    pub fn get(
        &self,
        channel: Channel,
    ) -> i16 {
        self.raw[channel.index()]
    }

    #[inline]
    pub fn set(
        &mut self,
        channel: Channel,
        value: i16,
    ) {
        self.raw[channel.index()] = value;
    }

    /// `right - left`, the steering process value.
    pub fn sensor_diff(&self) -> i16 {
        self.get(Channel::SensorRight)
            .saturating_sub(self.get(Channel::SensorLeft))
    }

    /// Combined line-sensor signal used for loss-of-track detection.
    pub fn sensor_sum(&self) -> u16 {
        let sum = self.get(Channel::SensorLeft) as i32 + self.get(Channel::SensorRight) as i32;
        sum.clamp(0, u16::MAX as i32) as u16
    }
}

/// Mode, menu position and edit flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub mode: Mode,
    pub menu_index: u8,
    pub editing: bool,
    pub needs_redraw: bool,
}

impl ControlState {
    pub const fn new() -> Self {
        Self {
            mode: Mode::Halt,
            menu_index: 0,
            editing: false,
            needs_redraw: true,
        }
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

/// Values computed by the last control tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActuatorOutputs {
    /// Drive command before the duty mapping.
    pub drive: u8,
    /// Steering command before the duty mapping.
    pub steering: i8,
    /// Compare value written to the servo channel.
    pub servo_duty: u16,
    /// Duty written to the motor channel.
    pub motor_duty: u8,
}

/// Speed-sensor period counter and the last computed speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedState {
    pub count: u16,
    pub overflow: bool,
    pub speed: u8,
}

impl SpeedState {
    pub const fn new() -> Self {
        Self {
            count: 0,
            overflow: true,
            speed: 0,
        }
    }
}

impl Default for SpeedState {
    fn default() -> Self {
        Self::new()
    }
}

type Shared<T> = Mutex<CriticalSectionRawMutex, Cell<T>>;

/// Everything the interrupt contexts and the main loop exchange.
///
/// Create once (usually through `mk_static!`) and hand a shared reference to
/// every task.
pub struct SharedState {
    control: Shared<ControlState>,
    readings: Shared<ChannelReadings>,
    params: Shared<PersistentParameters>,
    outputs: Shared<ActuatorOutputs>,
    speed: Shared<SpeedState>,
}

impl SharedState {
    pub const fn new(params: PersistentParameters) -> Self {
        Self {
            control: Mutex::new(Cell::new(ControlState::new())),
            readings: Mutex::new(Cell::new(ChannelReadings::new())),
            params: Mutex::new(Cell::new(params)),
            outputs: Mutex::new(Cell::new(ActuatorOutputs {
                drive: 0,
                steering: 0,
                servo_duty: 0,
                motor_duty: 0,
            })),
            speed: Mutex::new(Cell::new(SpeedState::new())),
        }
    }

    pub fn control(&self) -> ControlState {
        self.control.lock(|c| c.get())
    }

    /// Read-modify-write the control state inside one critical section.
    pub fn update_control<R>(
        &self,
        f: impl FnOnce(&mut ControlState) -> R,
    ) -> R {
        self.control.lock(|c| {
            let mut state = c.get();
            let r = f(&mut state);
            c.set(state);
            r
        })
    }

    /// Mutate control state and the parameter mirror atomically with respect
    /// to every other context.
    pub fn update_console<R>(
        &self,
        f: impl FnOnce(&mut ControlState, &mut PersistentParameters) -> R,
    ) -> R {
        self.control.lock(|c| {
            self.params.lock(|p| {
                let mut state = c.get();
                let mut params = p.get();
                let r = f(&mut state, &mut params);
                c.set(state);
                p.set(params);
                r
            })
        })
    }

    /// Return the redraw flag and clear it.
    pub fn take_redraw(&self) -> bool {
        self.update_control(|c| core::mem::replace(&mut c.needs_redraw, false))
    }

    pub fn readings(&self) -> ChannelReadings {
        self.readings.lock(|r| r.get())
    }

    pub fn store_reading(
        &self,
        channel: Channel,
        value: i16,
    ) {
        self.readings.lock(|r| {
            let mut readings = r.get();
            readings.set(channel, value);
            r.set(readings);
        });
    }

    pub fn params(&self) -> PersistentParameters {
        self.params.lock(|p| p.get())
    }

    pub fn update_params<R>(
        &self,
        f: impl FnOnce(&mut PersistentParameters) -> R,
    ) -> R {
        self.params.lock(|p| {
            let mut params = p.get();
            let r = f(&mut params);
            p.set(params);
            r
        })
    }

    pub fn outputs(&self) -> ActuatorOutputs {
        self.outputs.lock(|o| o.get())
    }

    pub fn set_outputs(
        &self,
        outputs: ActuatorOutputs,
    ) {
        self.outputs.lock(|o| o.set(outputs));
    }

    pub fn speed(&self) -> SpeedState {
        self.speed.lock(|s| s.get())
    }

    pub fn update_speed<R>(
        &self,
        f: impl FnOnce(&mut SpeedState) -> R,
    ) -> R {
        self.speed.lock(|s| {
            let mut speed = s.get();
            let r = f(&mut speed);
            s.set(speed);
            r
        })
    }
}
