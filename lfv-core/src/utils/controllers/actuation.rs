//! Mapping from mode, PID output and manual setpoints to actuator duty values.

use embedded_hal::pwm::SetDutyCycle;

use crate::utils::{
    config::ActuationConfig,
    controllers::{params::PersistentParameters, pid::PidState},
    state::{ActuatorOutputs, ChannelReadings, Mode},
};

/// Denominator of the 8-bit motor duty.
pub const MOTOR_DUTY_FULL: u16 = 255;

/// Result of one control-tick evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Drive and steering commands for this tick.
    Command { drive: u8, steering: i8 },
    /// Auto mode lost the line; the caller must halt and reset the UI.
    GuidanceLost { sensor_sum: u16 },
}

/// Steering and (optional) drive controllers plus the duty mapping.
#[derive(Debug, Clone)]
pub struct Actuation {
    cfg: ActuationConfig,
    steering: PidState,
    drive: PidState,
}

impl Actuation {
    pub fn new(
        cfg: ActuationConfig,
        params: &PersistentParameters,
    ) -> Self {
        Self {
            cfg,
            steering: PidState::new(params.steering_p, params.steering_i, 0),
            drive: PidState::new(params.drive_p, params.drive_i, 0),
        }
    }

    pub fn config(&self) -> &ActuationConfig {
        &self.cfg
    }

    /// Steering controller, e.g. to reset its integrator.
    pub fn steering_pid(&mut self) -> &mut PidState {
        &mut self.steering
    }

    /// Drive controller; only evaluated when `drive_pid` is enabled.
    pub fn drive_pid(&mut self) -> &mut PidState {
        &mut self.drive
    }

    /// Pick up gains edited through the menu.
    pub fn sync_gains(
        &mut self,
        params: &PersistentParameters,
    ) {
        let (p, i, d) = self.steering.gains();
        if (p, i) != (params.steering_p, params.steering_i) {
            self.steering.set_gains(params.steering_p, params.steering_i, d);
        }
        let (p, i, d) = self.drive.gains();
        if (p, i) != (params.drive_p, params.drive_i) {
            self.drive.set_gains(params.drive_p, params.drive_i, d);
        }
    }

    /// Evaluate one control tick.
    pub fn step(
        &mut self,
        mode: Mode,
        params: &PersistentParameters,
        readings: &ChannelReadings,
        speed: u8,
    ) -> Step {
        match mode {
            Mode::Halt => Step::Command {
                drive: 0,
                steering: 0,
            },
            Mode::Manual => Step::Command {
                drive: self.clamp_drive(params.drive_pwm as i32),
                steering: saturate_i8(params.steering_pwm),
            },
            Mode::Auto => {
                let sensor_sum = readings.sensor_sum();
                if sensor_sum < self.cfg.guidance_loss_threshold {
                    return Step::GuidanceLost { sensor_sum };
                }
                let steering = saturate_i8(self.steering.evaluate(0, readings.sensor_diff()));
                let drive = if self.cfg.drive_pid {
                    let out = self.drive.evaluate(params.drive_pwm, speed as i16);
                    self.clamp_drive(out as i32)
                } else {
                    self.clamp_drive(feed_forward(params.drive_pwm, steering))
                };
                Step::Command { drive, steering }
            }
        }
    }

    /// Duty values for a drive/steering command.
    pub fn outputs(
        &self,
        drive: u8,
        steering: i8,
    ) -> ActuatorOutputs {
        let servo = self.cfg.servo_center as i32 + steering as i32 * self.cfg.servo_gain as i32;
        let servo_duty = servo.clamp(self.cfg.servo_min as i32, self.cfg.servo_max as i32) as u16;
        ActuatorOutputs {
            drive,
            steering,
            servo_duty,
            motor_duty: drive.min(self.cfg.motor_max),
        }
    }

    /// Write the duty values to the PWM channels.
    pub fn apply<M, S>(
        &self,
        outputs: &ActuatorOutputs,
        motor: &mut M,
        servo: &mut S,
    ) -> Result<(), ApplyError<M::Error, S::Error>>
    where
        M: SetDutyCycle,
        S: SetDutyCycle,
    {
        motor
            .set_duty_cycle_fraction(outputs.motor_duty as u16, MOTOR_DUTY_FULL)
            .map_err(ApplyError::Motor)?;
        servo
            .set_duty_cycle_fraction(outputs.servo_duty, self.cfg.servo_period)
            .map_err(ApplyError::Servo)?;
        Ok(())
    }

    fn clamp_drive(
        &self,
        drive: i32,
    ) -> u8 {
        drive.clamp(0, self.cfg.motor_max as i32) as u8
    }
}

/// Which PWM channel failed.
#[derive(Debug)]
pub enum ApplyError<M, S> {
    Motor(M),
    Servo(S),
}

/// Half the drive setpoint plus the other half scaled down by the steering
/// magnitude: full power on a straight, half power at full lock.
pub fn feed_forward(
    drive_pwm: i16,
    steering: i8,
) -> i32 {
    let pwm = drive_pwm as i32;
    let straightness = 128 - steering.unsigned_abs() as i32;
    (pwm >> 1) + ((pwm * straightness) >> 8)
}

fn saturate_i8(value: i16) -> i8 {
    value.clamp(i8::MIN as i16, i8::MAX as i16) as i8
}
