//! Module Exports
//!
//! This file exports the control modules of the vehicle and the task objects
//! that run them.
//!
//! - `pid`: fixed-point PID controller
//! - `menu`: mode and menu state machine
//! - `actuation`: mode/PID/setpoint to duty-value mapping
//! - `params`: persisted tuning parameters and their storage seam
//!
//! Each interrupt source owns one task object. On the MCU every task lives in
//! its own interrupt-local static; on the host [`Vehicle`] bundles them and
//! [`Vehicle::dispatch`] plays the role of the vector table.

pub mod actuation;
pub mod menu;
pub mod params;
pub mod pid;

use embassy_time::Duration;
use embedded_hal::{digital::InputPin, pwm::SetDutyCycle};
use embedded_io::{Read, ReadReady, Write};

pub use actuation::{Actuation, Step};
pub use menu::MenuAction;
pub use params::{MemoryStore, ParamStore, PersistentParameters, Slot};
pub use pid::PidState;

use crate::utils::{
    config::Config,
    connection::telemetry::Telemetry,
    hw::Converter,
    inputs::{speed, Debouncer, InputEvent, InputPins, Sampler},
    sched::TaskKind,
    state::{ActuatorOutputs, Mode, SharedState},
};

/// Input tick: sample the lines, debounce, drive the menu.
pub struct InputTask<P, St> {
    pins: InputPins<P>,
    debouncer: Debouncer,
    store: St,
}

impl<P, St> InputTask<P, St>
where
    P: InputPin,
    St: ParamStore,
{
    pub fn new(
        pins: InputPins<P>,
        debouncer: Debouncer,
        store: St,
    ) -> Self {
        Self {
            pins,
            debouncer,
            store,
        }
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    pub fn run(
        &mut self,
        shared: &SharedState,
    ) -> InputEvent {
        let sample = match self.pins.sample() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(?e, "input pin read failed");
                return InputEvent::None;
            }
        };
        let event = self.debouncer.update(sample);
        if !event.is_none() {
            menu::dispatch(event, shared, &mut self.store);
        }
        event
    }
}

/// Control tick: speed counter, controllers, PWM compare values.
pub struct ControlTask<M, S> {
    actuation: Actuation,
    motor: M,
    servo: S,
}

impl<M, S> ControlTask<M, S>
where
    M: SetDutyCycle,
    S: SetDutyCycle,
{
    pub fn new(
        actuation: Actuation,
        motor: M,
        servo: S,
    ) -> Self {
        Self {
            actuation,
            motor,
            servo,
        }
    }

    pub fn actuation(&mut self) -> &mut Actuation {
        &mut self.actuation
    }

    pub fn run(
        &mut self,
        shared: &SharedState,
    ) -> ActuatorOutputs {
        speed::tick(shared);

        let mode = shared.control().mode;
        let params = shared.params();
        let readings = shared.readings();
        let speed = shared.speed().speed;

        self.actuation.sync_gains(&params);
        let (drive, steering) = match self.actuation.step(mode, &params, &readings, speed) {
            Step::Command { drive, steering } => (drive, steering),
            Step::GuidanceLost { sensor_sum } => {
                shared.update_control(|c| {
                    c.mode = Mode::Halt;
                    c.menu_index = menu::OVERVIEW;
                    c.editing = false;
                    c.needs_redraw = true;
                });
                tracing::warn!(sensor_sum, "line lost, halting");
                (0, 0)
            }
        };

        let outputs = self.actuation.outputs(drive, steering);
        shared.set_outputs(outputs);
        if let Err(e) = self.actuation.apply(&outputs, &mut self.motor, &mut self.servo) {
            tracing::error!(?e, "pwm update failed");
        }
        outputs
    }
}

/// Conversion-complete interrupt.
pub struct AdcTask<C> {
    adc: C,
    sampler: Sampler,
}

impl<C: Converter> AdcTask<C> {
    pub fn new(
        adc: C,
        sampler: Sampler,
    ) -> Self {
        Self { adc, sampler }
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn begin(&mut self) {
        if let Err(e) = self.sampler.begin(&mut self.adc) {
            tracing::error!(?e, "converter start failed");
        }
    }

    /// Completion slot. Stores the result and re-triggers; when no conversion
    /// was running (an earlier start failed) the start is retried instead.
    /// Returns whether the conversion chain is still alive.
    pub fn run(
        &mut self,
        shared: &SharedState,
    ) -> bool {
        if !self.sampler.is_active() {
            return false;
        }
        if !self.sampler.in_flight() {
            tracing::warn!(channel = ?self.sampler.current(), "sampler idle, restarting");
            self.begin();
        } else if let Err(e) = self.sampler.on_complete(&mut self.adc, shared) {
            tracing::error!(?e, "converter restart failed");
        }
        true
    }
}

/// Every peripheral the interrupt tasks need.
pub struct Peripherals<P, St, M, S, C, U> {
    pub pins: InputPins<P>,
    pub store: St,
    pub motor: M,
    pub servo: S,
    pub adc: C,
    pub serial: U,
}

/// All interrupt tasks of the vehicle over one [`SharedState`].
pub struct Vehicle<'a, P, St, M, S, C, U> {
    shared: &'a SharedState,
    conversion: Duration,
    pub input: InputTask<P, St>,
    pub control: ControlTask<M, S>,
    pub adc: AdcTask<C>,
    pub telemetry: Telemetry<U>,
}

impl<'a, P, St, M, S, C, U> Vehicle<'a, P, St, M, S, C, U>
where
    P: InputPin,
    St: ParamStore,
    M: SetDutyCycle,
    S: SetDutyCycle,
    C: Converter,
    U: Read + ReadReady + Write,
{
    /// Boot: load the parameter mirror from storage, build every task and
    /// start the first conversion.
    pub fn boot(
        shared: &'a SharedState,
        cfg: &Config,
        hw: Peripherals<P, St, M, S, C, U>,
    ) -> Self {
        let Peripherals {
            pins,
            mut store,
            motor,
            servo,
            adc,
            serial,
        } = hw;

        let params = PersistentParameters::load_all(&mut store);
        shared.update_params(|p| *p = params);

        let mut telemetry = Telemetry::new(serial, cfg.telemetry);
        if let Err(e) = telemetry.puts("lfv-core") {
            tracing::warn!(?e, "banner not sent");
        }

        let mut vehicle = Self {
            shared,
            conversion: cfg.timing.adc_conversion(),
            input: InputTask::new(pins, Debouncer::new(&cfg.input), store),
            control: ControlTask::new(Actuation::new(cfg.actuation, &params), motor, servo),
            adc: AdcTask::new(adc, Sampler::new(&cfg.sampler)),
            telemetry,
        };
        vehicle.adc.begin();
        tracing::info!(mode = ?shared.control().mode, "vehicle booted");
        vehicle
    }

    pub fn shared(&self) -> &'a SharedState {
        self.shared
    }

    /// Run the task for one interrupt. Returns the delay after which the same
    /// event fires again on its own, which only the conversion chain has.
    pub fn dispatch(
        &mut self,
        kind: TaskKind,
    ) -> Option<Duration> {
        match kind {
            TaskKind::InputTick => {
                self.input.run(self.shared);
            }
            TaskKind::ControlTick => {
                self.control.run(self.shared);
            }
            TaskKind::FrameTick => {
                if let Err(e) = self.telemetry.on_frame(self.shared) {
                    tracing::error!(?e, "telemetry failed");
                }
            }
            TaskKind::AdcComplete => {
                if self.adc.run(self.shared) {
                    return Some(self.conversion);
                }
            }
            TaskKind::SpeedEdge => {
                let speed = speed::on_edge(self.shared);
                tracing::trace!(speed, "speed edge");
            }
        }
        None
    }

    /// Delay until the first completion slot, `None` when sampling is disabled.
    /// The slot fires even if the boot-time start failed, so it gets retried.
    pub fn first_conversion(&self) -> Option<Duration> {
        self.adc.sampler().is_active().then_some(self.conversion)
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::utils::{
        config::SamplerConfig,
        state::{Channel, CHANNEL_COUNT},
    };

    /// Converter whose next `failing` starts error out.
    #[derive(Default)]
    struct FlakyAdc {
        failing: Rc<Cell<u8>>,
        selected: Option<Channel>,
    }

    impl Converter for FlakyAdc {
        type Error = ();

        fn start(
            &mut self,
            channel: Channel,
        ) -> Result<(), ()> {
            let left = self.failing.get();
            if left > 0 {
                self.failing.set(left - 1);
                return Err(());
            }
            self.selected = Some(channel);
            Ok(())
        }

        fn read(&mut self) -> Result<u16, ()> {
            self.selected.map(|ch| 100 * (ch as u16 + 1)).ok_or(())
        }
    }

    fn shared() -> SharedState {
        SharedState::new(PersistentParameters::BOOT_DEFAULTS)
    }

    #[test]
    fn failed_restart_is_retried_on_next_slot() {
        let shared = shared();
        let adc = FlakyAdc::default();
        let failing = adc.failing.clone();
        let mut task = AdcTask::new(adc, Sampler::new(&SamplerConfig::default()));
        task.begin();
        assert!(task.sampler().in_flight());

        failing.set(1);
        assert!(task.run(&shared));
        assert_eq!(shared.readings().get(Channel::SensorLeft), 100);
        assert!(!task.sampler().in_flight());

        // idle slot restarts the channel that failed to start
        assert!(task.run(&shared));
        assert!(task.sampler().in_flight());
        assert_eq!(task.sampler().current(), Channel::SensorRight);

        assert!(task.run(&shared));
        assert_eq!(shared.readings().get(Channel::SensorRight), 200);
    }

    #[test]
    fn failed_boot_start_is_retried() {
        let shared = shared();
        let adc = FlakyAdc::default();
        adc.failing.set(2);
        let mut task = AdcTask::new(adc, Sampler::new(&SamplerConfig::default()));
        task.begin();
        assert!(!task.sampler().in_flight());
        assert!(task.run(&shared));
        assert!(!task.sampler().in_flight());
        assert!(task.run(&shared));
        assert!(task.sampler().in_flight());
        assert_eq!(task.sampler().current(), Channel::SensorLeft);
    }

    #[test]
    fn disabled_sampler_ends_the_chain() {
        let shared = shared();
        let cfg = SamplerConfig {
            enabled: [false; CHANNEL_COUNT],
            ..SamplerConfig::default()
        };
        let mut task = AdcTask::new(FlakyAdc::default(), Sampler::new(&cfg));
        task.begin();
        assert!(!task.run(&shared));
        assert!(!task.sampler().in_flight());
    }
}
