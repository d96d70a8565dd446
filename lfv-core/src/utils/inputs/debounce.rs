//! Rotary encoder decoding and push-button debouncing.
//!
//! [`Debouncer::update`] runs once per input tick on a snapshot of the five
//! active-low lines and yields at most one [`InputEvent`].
//!
//! Encoder: line A has to read low for `encoder_debounce_ticks` consecutive
//! samples before a step is armed. The level of line B at that instant picks
//! the direction, and nothing else is reported until A returns high, so every
//! detent yields exactly one step however long the contacts bounce.
//!
//! Buttons: a run-length counter grows while the line is low and saturates at
//! `button_hold_ticks`. Releasing a saturated button emits one press; releasing
//! before saturation discards the run.

use embedded_hal::digital::InputPin;
use serde::{Deserialize, Serialize};

use crate::utils::config::InputConfig;

/// Discrete user input, produced once per debounced transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputEvent {
    #[default]
    None,
    StepCw,
    StepCcw,
    RotaryPress,
    /// Green button.
    ButtonA,
    /// Blue button.
    ButtonB,
}

impl InputEvent {
    pub fn is_none(self) -> bool {
        self == InputEvent::None
    }
}

/// One sample of the input lines, `true` meaning the line reads low.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSample {
    pub enc_a_low: bool,
    pub enc_b_low: bool,
    pub rotary_low: bool,
    pub green_low: bool,
    pub blue_low: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct HoldCounter {
    held: u8,
}

impl HoldCounter {
    fn update(
        &mut self,
        low: bool,
        hold_ticks: u8,
    ) -> bool {
        if low {
            if self.held < hold_ticks {
                self.held += 1;
            }
            false
        } else {
            let pressed = self.held >= hold_ticks;
            self.held = 0;
            pressed
        }
    }
}

/// Debounce state for the encoder and the three buttons.
#[derive(Debug, Clone)]
pub struct Debouncer {
    encoder_ticks: u8,
    hold_ticks: u8,
    low_a: u8,
    trigger: bool,
    ready: bool,
    rotary: HoldCounter,
    green: HoldCounter,
    blue: HoldCounter,
}

impl Debouncer {
    pub fn new(cfg: &InputConfig) -> Self {
        Self {
            encoder_ticks: cfg.encoder_debounce_ticks.max(1),
            hold_ticks: cfg.button_hold_ticks.max(1),
            low_a: 0,
            trigger: false,
            ready: false,
            rotary: HoldCounter::default(),
            green: HoldCounter::default(),
            blue: HoldCounter::default(),
        }
    }

    /// Feed one sample. When several inputs complete in the same tick the
    /// later source in encoder, rotary, green, blue order wins.
    pub fn update(
        &mut self,
        sample: InputSample,
    ) -> InputEvent {
        let mut event = InputEvent::None;

        if !self.trigger {
            if sample.enc_a_low {
                if self.low_a + 1 < self.encoder_ticks {
                    self.low_a += 1;
                } else {
                    self.trigger = true;
                    self.low_a = 0;
                }
            } else {
                self.low_a = 0;
            }
        }

        if self.trigger && !self.ready {
            event = if sample.enc_b_low {
                InputEvent::StepCcw
            } else {
                InputEvent::StepCw
            };
            self.ready = true;
        }

        if self.ready && !sample.enc_a_low {
            self.ready = false;
            self.trigger = false;
        }

        if self.rotary.update(sample.rotary_low, self.hold_ticks) {
            event = InputEvent::RotaryPress;
        }
        if self.green.update(sample.green_low, self.hold_ticks) {
            event = InputEvent::ButtonA;
        }
        if self.blue.update(sample.blue_low, self.hold_ticks) {
            event = InputEvent::ButtonB;
        }

        if !event.is_none() {
            tracing::trace!(?event, "input");
        }
        event
    }
}

/// The five input lines, pulled up and active low.
pub struct InputPins<P> {
    pub enc_a: P,
    pub enc_b: P,
    pub rotary: P,
    pub green: P,
    pub blue: P,
}

impl<P: InputPin> InputPins<P> {
    /// Read every line once, in A, B, rotary, green, blue order.
    pub fn sample(&mut self) -> Result<InputSample, P::Error> {
        Ok(InputSample {
            enc_a_low: self.enc_a.is_low()?,
            enc_b_low: self.enc_b.is_low()?,
            rotary_low: self.rotary.is_low()?,
            green_low: self.green.is_low()?,
            blue_low: self.blue.is_low()?,
        })
    }
}
