//! Persisted tuning parameters.
//!
//! The in-memory mirror in [`SharedState`](crate::utils::SharedState) is the
//! working copy. Non-volatile storage is touched only at boot and on an
//! explicit load or save from the menu.

use serde::{Deserialize, Serialize};

/// Fixed non-volatile slot of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Slot {
    DriveP = 0,
    DriveI = 1,
    SteeringP = 2,
    SteeringI = 3,
    DrivePwm = 4,
    SteeringPwm = 5,
}

impl Slot {
    pub const ALL: [Slot; 6] = [
        Slot::DriveP,
        Slot::DriveI,
        Slot::SteeringP,
        Slot::SteeringI,
        Slot::DrivePwm,
        Slot::SteeringPwm,
    ];

    /// Byte address of the slot in EEPROM.
    #[inline]
    pub fn address(self) -> u16 {
        (self as u16) * 2
    }

    /// Value programmed into the slot with the firmware image.
    pub fn boot_default(self) -> i16 {
        match self {
            Slot::SteeringP => 39,
            _ => 0,
        }
    }
}

/// Errors reported by a [`ParamStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// A previous write has not finished yet.
    Busy,
    /// The device rejected the access.
    Device,
}

/// Word-addressed non-volatile storage, one signed 16-bit value per slot.
pub trait ParamStore {
    fn read_word(
        &mut self,
        slot: Slot,
    ) -> Result<i16, StoreError>;

    fn write_word(
        &mut self,
        slot: Slot,
        value: i16,
    ) -> Result<(), StoreError>;
}

/// RAM-backed store, seeded with the boot defaults.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    words: [i16; 6],
    writes: u32,
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut words = [0; 6];
        for slot in Slot::ALL {
            words[slot as usize] = slot.boot_default();
        }
        Self { words, writes: 0 }
    }

    /// Number of completed writes, useful to check that nothing is saved implicitly.
    pub fn writes(&self) -> u32 {
        self.writes
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamStore for MemoryStore {
    fn read_word(
        &mut self,
        slot: Slot,
    ) -> Result<i16, StoreError> {
        Ok(self.words[slot as usize])
    }

    fn write_word(
        &mut self,
        slot: Slot,
        value: i16,
    ) -> Result<(), StoreError> {
        self.words[slot as usize] = value;
        self.writes += 1;
        Ok(())
    }
}

/// The six tunables, as held in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentParameters {
    pub drive_pwm: i16,
    pub steering_pwm: i16,
    pub steering_p: i16,
    pub steering_i: i16,
    pub drive_p: i16,
    pub drive_i: i16,
}

impl PersistentParameters {
    pub const BOOT_DEFAULTS: Self = Self {
        drive_pwm: 0,
        steering_pwm: 0,
        steering_p: 39,
        steering_i: 0,
        drive_p: 0,
        drive_i: 0,
    };

    pub fn get(
        &self,
        slot: Slot,
    ) -> i16 {
        match slot {
            Slot::DriveP => self.drive_p,
            Slot::DriveI => self.drive_i,
            Slot::SteeringP => self.steering_p,
            Slot::SteeringI => self.steering_i,
            Slot::DrivePwm => self.drive_pwm,
            Slot::SteeringPwm => self.steering_pwm,
        }
    }

    pub fn set(
        &mut self,
        slot: Slot,
        value: i16,
    ) {
        let field = match slot {
            Slot::DriveP => &mut self.drive_p,
            Slot::DriveI => &mut self.drive_i,
            Slot::SteeringP => &mut self.steering_p,
            Slot::SteeringI => &mut self.steering_i,
            Slot::DrivePwm => &mut self.drive_pwm,
            Slot::SteeringPwm => &mut self.steering_pwm,
        };
        *field = value;
    }

    /// Read every slot individually. A slot that fails to read keeps its boot default.
    pub fn load_all<S: ParamStore>(store: &mut S) -> Self {
        let mut params = Self::BOOT_DEFAULTS;
        for slot in Slot::ALL {
            match store.read_word(slot) {
                Ok(v) => params.set(slot, v),
                Err(e) => tracing::error!(?slot, ?e, "parameter read failed, keeping default"),
            }
        }
        tracing::info!(?params, "parameters loaded");
        params
    }
}

impl Default for PersistentParameters {
    fn default() -> Self {
        Self::BOOT_DEFAULTS
    }
}
