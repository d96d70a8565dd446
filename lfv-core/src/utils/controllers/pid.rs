//! Fixed-point discrete PID controller.
//!
//! Gains are integers pre-scaled by `SCALING_FACTOR` (128), so a gain of 128
//! means 1.0. Every intermediate is bounded before it is multiplied, which
//! keeps the arithmetic overflow free without runtime checks.
//!
//! ```rust
//! use lfv_core::utils::controllers::pid::PidState;
//! let mut pid = PidState::new(39, 0, 0);
//! let out = pid.evaluate(0, 120);
//! assert!(out < 0);
//! ```

/// Gains are multiplied by this factor.
pub const SCALING_FACTOR: i32 = 128;
/// `log2(SCALING_FACTOR)`, applied as an arithmetic shift on the output sum.
pub const SCALING_SHIFT: u32 = 7;
/// Output and proportional-term bound.
pub const MAX_INT: i32 = i16::MAX as i32;
/// Integral-term bound.
pub const MAX_I_TERM: i32 = i32::MAX / 2;

/// Controller history and tuning for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidState {
    last_process_value: i16,
    sum_error: i32,
    p_gain: i16,
    i_gain: i16,
    d_gain: i16,
    max_error: i16,
    max_sum_error: i32,
}

impl PidState {
    pub fn new(
        p_gain: i16,
        i_gain: i16,
        d_gain: i16,
    ) -> Self {
        let mut pid = Self {
            last_process_value: 0,
            sum_error: 0,
            p_gain: 0,
            i_gain: 0,
            d_gain: 0,
            max_error: 0,
            max_sum_error: 0,
        };
        pid.set_gains(p_gain, i_gain, d_gain);
        pid
    }

    /// Replace the gains and recompute the overflow limits derived from them.
    ///
    /// History (integrator sum, last measurement) is kept, with the sum
    /// clamped into the new integrator bound.
    pub fn set_gains(
        &mut self,
        p_gain: i16,
        i_gain: i16,
        d_gain: i16,
    ) {
        self.p_gain = p_gain;
        self.i_gain = i_gain;
        self.d_gain = d_gain;
        // |gain| + 1 never divides by zero, also for negative gains.
        self.max_error = (MAX_INT / (p_gain.unsigned_abs() as i32 + 1)) as i16;
        self.max_sum_error = MAX_I_TERM / (i_gain.unsigned_abs() as i32 + 1);
        self.sum_error = self.sum_error.clamp(-self.max_sum_error, self.max_sum_error);
    }

    pub fn gains(&self) -> (i16, i16, i16) {
        (self.p_gain, self.i_gain, self.d_gain)
    }

    pub fn max_error(&self) -> i16 {
        self.max_error
    }

    pub fn max_integrator(&self) -> i32 {
        self.max_sum_error
    }

    pub fn integrator(&self) -> i32 {
        self.sum_error
    }

    /// Zero the integrator sum. Not called by the control loop.
    pub fn reset_integrator(&mut self) {
        self.sum_error = 0;
    }

    /// One controller step.
    pub fn evaluate(
        &mut self,
        setpoint: i16,
        process_value: i16,
    ) -> i16 {
        let error = setpoint as i32 - process_value as i32;
        let max_error = self.max_error as i32;

        let p_term = if error > max_error {
            MAX_INT
        } else if error < -max_error {
            -MAX_INT
        } else {
            self.p_gain as i32 * error
        };

        let tentative = self.sum_error.saturating_add(error);
        let i_term = if tentative > self.max_sum_error {
            self.sum_error = self.max_sum_error;
            MAX_I_TERM
        } else if tentative < -self.max_sum_error {
            self.sum_error = -self.max_sum_error;
            -MAX_I_TERM
        } else {
            self.sum_error = tentative;
            self.i_gain as i32 * self.sum_error
        };

        let delta = (self.last_process_value as i32 - process_value as i32).clamp(-MAX_INT, MAX_INT);
        let d_term = (self.d_gain as i32 * delta).clamp(-MAX_INT, MAX_INT);

        self.last_process_value = process_value;

        let sum = p_term.saturating_add(i_term).saturating_add(d_term);
        (sum >> SCALING_SHIFT).clamp(-MAX_INT, MAX_INT) as i16
    }
}
