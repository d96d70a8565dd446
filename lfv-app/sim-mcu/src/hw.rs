//! Simulated peripherals. Every handle is a cheap clone of shared cells so the
//! script driver can poke inputs while the vehicle owns its side.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    convert::Infallible,
    rc::Rc,
};

use embedded_hal::{delay::DelayNs, digital, pwm};
use embedded_io::{ErrorType, Read, ReadReady, Write};
use lfv_core::utils::{
    connection::Display,
    Duration,
    hw::{Converter, Watchdog},
    state::{Channel, CHANNEL_COUNT},
};
use tracing::{debug, info};

/// Pulled-up input line; `true` means pulled low.
#[derive(Clone, Default)]
pub struct SimLine(Rc<Cell<bool>>);

impl SimLine {
    pub fn set_low(
        &self,
        low: bool,
    ) {
        self.0.set(low);
    }
}

impl digital::ErrorType for SimLine {
    type Error = Infallible;
}

impl digital::InputPin for SimLine {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }
}

/// PWM compare register, logged when the value changes.
#[derive(Clone)]
pub struct SimPwm {
    name: &'static str,
    max: u16,
    duty: Rc<Cell<u16>>,
}

impl SimPwm {
    pub fn new(
        name: &'static str,
        max: u16,
    ) -> Self {
        Self {
            name,
            max,
            duty: Rc::new(Cell::new(0)),
        }
    }

    pub fn duty(&self) -> u16 {
        self.duty.get()
    }
}

impl pwm::ErrorType for SimPwm {
    type Error = Infallible;
}

impl pwm::SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(
        &mut self,
        duty: u16,
    ) -> Result<(), Infallible> {
        if self.duty.replace(duty) != duty {
            debug!(channel = self.name, duty, "pwm");
        }
        Ok(())
    }
}

/// Analog front end: the script sets what each channel measures.
#[derive(Clone, Default)]
pub struct SimAdc {
    inputs: Rc<Cell<[u16; CHANNEL_COUNT]>>,
    selected: Option<Channel>,
}

impl SimAdc {
    pub fn set(
        &self,
        channel: Channel,
        value: u16,
    ) {
        let mut v = self.inputs.get();
        v[channel.index()] = value;
        self.inputs.set(v);
    }
}

impl Converter for SimAdc {
    type Error = Infallible;

    fn start(
        &mut self,
        channel: Channel,
    ) -> Result<(), Infallible> {
        self.selected = Some(channel);
        Ok(())
    }

    fn read(&mut self) -> Result<u16, Infallible> {
        Ok(self
            .selected
            .map(|ch| self.inputs.get()[ch.index()])
            .unwrap_or(0))
    }
}

/// 16x2 character display kept in memory.
pub struct Console {
    rows: [[u8; 16]; 2],
    col: usize,
    row: usize,
}

impl Console {
    pub fn new() -> Self {
        Self {
            rows: [[b' '; 16]; 2],
            col: 0,
            row: 0,
        }
    }

    pub fn text(&self) -> [String; 2] {
        self.rows
            .map(|r| String::from_utf8_lossy(&r).into_owned())
    }

    fn put(
        &mut self,
        b: u8,
    ) {
        if self.row < 2 && self.col < 16 {
            self.rows[self.row][self.col] = b;
        }
        self.col += 1;
    }
}

impl Display for Console {
    type Error = Infallible;

    fn clear(&mut self) -> Result<(), Infallible> {
        self.rows = [[b' '; 16]; 2];
        self.col = 0;
        self.row = 0;
        Ok(())
    }

    fn set_cursor(
        &mut self,
        col: u8,
        row: u8,
    ) -> Result<(), Infallible> {
        self.col = col as usize;
        self.row = row as usize;
        Ok(())
    }

    fn write_str(
        &mut self,
        text: &str,
    ) -> Result<(), Infallible> {
        text.bytes().for_each(|b| self.put(b));
        Ok(())
    }

    fn bar(
        &mut self,
        col: u8,
        row: u8,
        width: u8,
        percent: u8,
    ) -> Result<(), Infallible> {
        self.set_cursor(col, row)?;
        let filled = width as usize * percent.min(100) as usize / 100;
        for i in 0..width as usize {
            self.put(if i < filled { b'#' } else { b'.' });
        }
        Ok(())
    }
}

/// Counts feeds; feeds before `enable` are ignored like on the real part.
#[derive(Clone, Default)]
pub struct SimWatchdog {
    feeds: Rc<Cell<u64>>,
    enabled: Rc<Cell<bool>>,
}

impl SimWatchdog {
    pub fn feeds(&self) -> u64 {
        self.feeds.get()
    }
}

impl Watchdog for SimWatchdog {
    fn enable(
        &mut self,
        timeout: Duration,
    ) {
        debug!(timeout_ms = timeout.as_millis(), "watchdog armed");
        self.enabled.set(true);
    }

    fn feed(&mut self) {
        if self.enabled.get() {
            self.feeds.set(self.feeds.get() + 1);
        }
    }
}

/// Boot delay. Logical time only, nothing actually sleeps.
pub struct SimDelay;

impl DelayNs for SimDelay {
    fn delay_ns(
        &mut self,
        ns: u32,
    ) {
        debug!(us = ns / 1000, "boot delay");
    }
}

/// Serial port: the script queues received bytes, transmitted lines are logged.
#[derive(Clone, Default)]
pub struct SimSerial {
    rx: Rc<RefCell<VecDeque<u8>>>,
    line: Rc<RefCell<Vec<u8>>>,
}

impl SimSerial {
    pub fn receive(
        &self,
        bytes: &[u8],
    ) {
        self.rx.borrow_mut().extend(bytes);
    }
}

impl ErrorType for SimSerial {
    type Error = Infallible;
}

impl Read for SimSerial {
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> Result<usize, Infallible> {
        let mut rx = self.rx.borrow_mut();
        let n = buf.len().min(rx.len());
        for (slot, b) in buf.iter_mut().zip(rx.drain(..n)) {
            *slot = b;
        }
        Ok(n)
    }
}

impl ReadReady for SimSerial {
    fn read_ready(&mut self) -> Result<bool, Infallible> {
        Ok(!self.rx.borrow().is_empty())
    }
}

impl Write for SimSerial {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> Result<usize, Infallible> {
        let mut line = self.line.borrow_mut();
        for &b in buf {
            if b == b'\n' {
                let text = String::from_utf8_lossy(&line);
                info!(target: "telemetry", "{}", text.trim_end());
                line.clear();
            } else {
                line.push(b);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}
