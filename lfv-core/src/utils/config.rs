//! Tunable constants and feature switches for the vehicle.
//!
//! Every field has a default matching the reference hardware (16 MHz clock,
//! 50 Hz servo frame, 10-bit ADC). The struct deserializes with
//! `#[serde(default)]`, so a partial JSON document only overrides what it names.

use embassy_time::Duration;
use heapless::String;
use serde::{Deserialize, Serialize};

use crate::utils::{sched::TaskKind, state::CHANNEL_COUNT};

/// Selection policy for the shared analog converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Cycle through every enabled channel in index order.
    #[default]
    RoundRobin,
    /// Toggle between the two line sensors only; the battery channels are
    /// never sampled. Kept for compatibility with the legacy firmware.
    LegacyPair,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub mode: SamplingMode,
    /// Channels taking part in round-robin sampling, indexed like `Channel`.
    pub enabled: [bool; CHANNEL_COUNT],
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            mode: SamplingMode::RoundRobin,
            enabled: [true; CHANNEL_COUNT],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Consecutive low samples on encoder line A needed to arm a step.
    pub encoder_debounce_ticks: u8,
    /// Low samples a button must be held before its release counts as a press.
    pub button_hold_ticks: u8,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            encoder_debounce_ticks: 4,
            button_hold_ticks: u8::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuationConfig {
    /// Auto mode halts when `left + right` drops below this sum.
    pub guidance_loss_threshold: u16,
    /// Servo compare value for straight ahead (1.5 ms).
    pub servo_center: u16,
    /// Compare ticks per unit of steering output.
    pub servo_gain: i16,
    /// Compare value at full right lock (0.9 ms).
    pub servo_min: u16,
    /// Compare value at full left lock (2.1 ms).
    pub servo_max: u16,
    /// Compare ticks in one servo frame (20 ms).
    pub servo_period: u16,
    pub motor_max: u8,
    /// Evaluate the drive-axis PID against the speed sensor instead of the
    /// open-loop feed-forward. Off on the reference vehicle.
    pub drive_pid: bool,
}

impl Default for ActuationConfig {
    fn default() -> Self {
        Self {
            guidance_loss_threshold: 30,
            servo_center: 3000,
            servo_gain: 9,
            servo_min: 1800,
            servo_max: 4200,
            servo_period: 40_000,
            motor_max: u8::MAX,
            drive_pid: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub tx: bool,
    pub rx: bool,
    /// Frame ticks between two status lines.
    pub tx_interval_frames: u8,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            tx: false,
            rx: false,
            tx_interval_frames: 25,
        }
    }
}

/// Task periods in microseconds of logical time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub input_period_us: u32,
    pub control_period_us: u32,
    pub frame_period_us: u32,
    pub adc_conversion_us: u32,
    pub watchdog_timeout_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        // 16 MHz / 8 / 256, 16 MHz / 64 / 256, 16 MHz / 8 / 40000,
        // 13 ADC clocks at 16 MHz / 128.
        Self {
            input_period_us: 128,
            control_period_us: 1024,
            frame_period_us: 20_000,
            adc_conversion_us: 104,
            watchdog_timeout_ms: 1000,
        }
    }
}

impl TimingConfig {
    /// Period of a task, `None` for the event-driven kinds.
    pub fn period(
        &self,
        kind: TaskKind,
    ) -> Option<Duration> {
        let us = match kind {
            TaskKind::InputTick => self.input_period_us,
            TaskKind::ControlTick => self.control_period_us,
            TaskKind::FrameTick => self.frame_period_us,
            TaskKind::AdcComplete | TaskKind::SpeedEdge => return None,
        };
        Some(Duration::from_micros(us as u64))
    }

    pub fn adc_conversion(&self) -> Duration {
        Duration::from_micros(self.adc_conversion_us as u64)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms as u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplashConfig {
    pub lines: [String<16>; 2],
    pub hold_ms: u32,
}

impl Default for SplashConfig {
    fn default() -> Self {
        let mut top = String::new();
        let mut bottom = String::new();
        let _ = top.push_str("  Line Follower ");
        let _ = bottom.push_str("   lfv-core    ");
        Self {
            lines: [top, bottom],
            hold_ms: 1500,
        }
    }
}

/// Complete vehicle configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampler: SamplerConfig,
    pub input: InputConfig,
    pub actuation: ActuationConfig,
    pub telemetry: TelemetryConfig,
    pub timing: TimingConfig,
    pub splash: SplashConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_vehicle() {
        let cfg = Config::default();
        assert_eq!(cfg.sampler.mode, SamplingMode::RoundRobin);
        assert_eq!(cfg.input.button_hold_ticks, 255);
        assert_eq!(cfg.actuation.guidance_loss_threshold, 30);
        assert!(!cfg.actuation.drive_pid);
        assert!(!cfg.telemetry.tx && !cfg.telemetry.rx);
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let cfg: Config =
            serde_json::from_str(r#"{"sampler":{"mode":"legacy_pair"},"telemetry":{"tx":true}}"#)
                .unwrap();
        assert_eq!(cfg.sampler.mode, SamplingMode::LegacyPair);
        assert_eq!(cfg.sampler.enabled, [true; CHANNEL_COUNT]);
        assert!(cfg.telemetry.tx);
        assert_eq!(cfg.telemetry.tx_interval_frames, 25);
        assert_eq!(cfg.actuation.servo_center, 3000);
    }

    #[test]
    fn event_tasks_have_no_period() {
        let t = TimingConfig::default();
        assert_eq!(t.period(TaskKind::InputTick), Some(Duration::from_micros(128)));
        assert_eq!(t.period(TaskKind::SpeedEdge), None);
        assert_eq!(t.period(TaskKind::AdcComplete), None);
    }
}
