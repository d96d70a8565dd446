//! Serial status link, driven from the frame tick.
//!
//! Inert unless enabled in [`TelemetryConfig`]. When `tx` is on, a status
//! line (one JSON object plus `\n`) goes out every `tx_interval_frames` frames.
//! When `rx` is on, every pending byte is decoded into a manual setpoint.

extern crate alloc;

use core::convert::Infallible;

use embedded_io::{ErrorType, Read, ReadReady, Write};
use serde::Serialize;

use crate::utils::{config::TelemetryConfig, state::SharedState};

/// One status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusFrame {
    pub spd: u8,
    pub adc_l: i16,
    pub adc_r: i16,
    pub steering: i8,
    pub drive: u8,
}

impl StatusFrame {
    pub fn capture(shared: &SharedState) -> Self {
        use crate::utils::state::Channel;

        let readings = shared.readings();
        let outputs = shared.outputs();
        Self {
            spd: shared.speed().speed,
            adc_l: readings.get(Channel::SensorLeft),
            adc_r: readings.get(Channel::SensorRight),
            steering: outputs.steering,
            drive: outputs.drive,
        }
    }
}

/// Manual setpoint carried by a received byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteSetpoint {
    /// Odd bytes, reinterpreted as signed.
    Steering(i8),
    /// Even bytes.
    Drive(u8),
}

pub fn decode_byte(byte: u8) -> RemoteSetpoint {
    if byte & 0x01 != 0 {
        RemoteSetpoint::Steering(byte as i8)
    } else {
        RemoteSetpoint::Drive(byte)
    }
}

/// Failure on the serial link.
#[derive(Debug)]
pub enum TelemetryError<E> {
    Io(E),
    Encode(serde_json::Error),
}

impl<E> From<E> for TelemetryError<E> {
    fn from(e: E) -> Self {
        TelemetryError::Io(e)
    }
}

/// Serial link state owned by the frame task.
pub struct Telemetry<U> {
    port: U,
    cfg: TelemetryConfig,
    frames: u8,
}

impl<U> Telemetry<U>
where
    U: Read + ReadReady + Write,
{
    pub fn new(
        port: U,
        cfg: TelemetryConfig,
    ) -> Self {
        Self {
            port,
            cfg,
            frames: 0,
        }
    }

    pub fn port(&self) -> &U {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut U {
        &mut self.port
    }

    /// Write a plain text line, used for the boot banner.
    pub fn puts(
        &mut self,
        text: &str,
    ) -> Result<(), U::Error> {
        if !self.cfg.tx {
            return Ok(());
        }
        self.port.write_all(text.as_bytes())?;
        self.port.write_all(b"\r\n")
    }

    pub fn send(
        &mut self,
        frame: &StatusFrame,
    ) -> Result<(), TelemetryError<U::Error>> {
        let mut line = serde_json::to_vec(frame).map_err(TelemetryError::Encode)?;
        line.push(b'\n');
        self.port.write_all(&line)?;
        self.port.flush()?;
        Ok(())
    }

    /// Drain pending bytes into the manual setpoints. Returns how many were
    /// applied.
    pub fn receive(
        &mut self,
        shared: &SharedState,
    ) -> Result<usize, U::Error> {
        let mut applied = 0;
        let mut byte = [0u8; 1];
        while self.port.read_ready()? {
            if self.port.read(&mut byte)? == 0 {
                break;
            }
            let setpoint = decode_byte(byte[0]);
            shared.update_params(|p| match setpoint {
                RemoteSetpoint::Steering(v) => p.steering_pwm = v as i16,
                RemoteSetpoint::Drive(v) => p.drive_pwm = v as i16,
            });
            tracing::debug!(?setpoint, "remote setpoint");
            applied += 1;
        }
        Ok(applied)
    }

    /// Frame-tick work: receive, then transmit on every Nth frame.
    pub fn on_frame(
        &mut self,
        shared: &SharedState,
    ) -> Result<(), TelemetryError<U::Error>> {
        if self.cfg.rx {
            self.receive(shared)?;
        }
        if self.cfg.tx {
            self.frames = self.frames.wrapping_add(1);
            if self.frames >= self.cfg.tx_interval_frames {
                self.frames = 0;
                self.send(&StatusFrame::capture(shared))?;
            }
        }
        Ok(())
    }
}

/// Port for builds without a serial link: never has data, swallows writes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLink;

impl ErrorType for NoLink {
    type Error = Infallible;
}

impl Read for NoLink {
    fn read(
        &mut self,
        _buf: &mut [u8],
    ) -> Result<usize, Infallible> {
        Ok(0)
    }
}

impl ReadReady for NoLink {
    fn read_ready(&mut self) -> Result<bool, Infallible> {
        Ok(false)
    }
}

impl Write for NoLink {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> Result<usize, Infallible> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}
