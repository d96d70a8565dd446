use std::{cell::Cell, convert::Infallible, rc::Rc};

use embedded_hal::{digital, pwm};
use lfv_core::utils::{
    config::Config,
    connection::NoLink,
    controllers::{MemoryStore, ParamStore, Peripherals, PersistentParameters, Slot, Vehicle},
    hw::Converter,
    inputs::InputPins,
    state::{Channel, Mode, CHANNEL_COUNT},
    Instant, Scheduler, SharedState, TaskKind,
};

/// Active-low line the test can hold down.
#[derive(Clone, Default)]
struct Line(Rc<Cell<bool>>);

impl Line {
    fn press(&self) {
        self.0.set(true);
    }

    fn release(&self) {
        self.0.set(false);
    }
}

impl digital::ErrorType for Line {
    type Error = Infallible;
}

impl digital::InputPin for Line {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }
}

/// PWM channel whose duty equals the compare value written.
#[derive(Clone)]
struct Pwm {
    max: u16,
    duty: Rc<Cell<u16>>,
}

impl Pwm {
    fn new(max: u16) -> Self {
        Self {
            max,
            duty: Rc::new(Cell::new(0)),
        }
    }
}

impl pwm::ErrorType for Pwm {
    type Error = Infallible;
}

impl pwm::SetDutyCycle for Pwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(
        &mut self,
        duty: u16,
    ) -> Result<(), Infallible> {
        self.duty.set(duty);
        Ok(())
    }
}

/// Converter returning whatever the test put on each channel.
#[derive(Clone, Default)]
struct Adc {
    inputs: Rc<Cell<[u16; CHANNEL_COUNT]>>,
    selected: Option<Channel>,
}

impl Adc {
    fn set(
        &self,
        channel: Channel,
        value: u16,
    ) {
        let mut v = self.inputs.get();
        v[channel.index()] = value;
        self.inputs.set(v);
    }
}

impl Converter for Adc {
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

struct Bench {
    green: Line,
    blue: Line,
    motor: Pwm,
    servo: Pwm,
    adc: Adc,
}

type TestVehicle<'a> = Vehicle<'a, Line, MemoryStore, Pwm, Pwm, Adc, NoLink>;

fn boot<'a>(
    shared: &'a SharedState,
    cfg: &Config,
    store: MemoryStore,
) -> (TestVehicle<'a>, Bench) {
    let bench = Bench {
        green: Line::default(),
        blue: Line::default(),
        motor: Pwm::new(255),
        servo: Pwm::new(cfg.actuation.servo_period),
        adc: Adc::default(),
    };
    let hw = Peripherals {
        pins: InputPins {
            enc_a: Line::default(),
            enc_b: Line::default(),
            rotary: Line::default(),
            green: bench.green.clone(),
            blue: bench.blue.clone(),
        },
        store,
        motor: bench.motor.clone(),
        servo: bench.servo.clone(),
        adc: bench.adc.clone(),
        serial: NoLink,
    };
    (Vehicle::boot(shared, cfg, hw), bench)
}

/// Hold a button through the full debounce run, then let go.
fn click(
    vehicle: &mut TestVehicle<'_>,
    line: &Line,
) {
    line.press();
    for _ in 0..255 {
        vehicle.dispatch(TaskKind::InputTick);
    }
    line.release();
    vehicle.dispatch(TaskKind::InputTick);
}

#[test]
fn test_boot_defaults() {
    let shared = SharedState::new(PersistentParameters::BOOT_DEFAULTS);
    let (mut vehicle, bench) = boot(&shared, &Config::default(), MemoryStore::new());
    let control = shared.control();
    assert_eq!(control.mode, Mode::Halt);
    assert_eq!(control.menu_index, 0);
    assert!(!control.editing);
    assert_eq!(shared.params(), PersistentParameters::BOOT_DEFAULTS);

    let out = vehicle.control.run(&shared);
    assert_eq!((out.drive, out.steering), (0, 0));
    assert_eq!(bench.servo.duty.get(), 3000);
    assert_eq!(bench.motor.duty.get(), 0);
}

#[test]
fn test_boot_loads_saved_parameters() {
    let mut store = MemoryStore::new();
    store.write_word(Slot::SteeringP, 60).unwrap();
    store.write_word(Slot::DrivePwm, 150).unwrap();
    let shared = SharedState::new(PersistentParameters::BOOT_DEFAULTS);
    let (mut vehicle, _) = boot(&shared, &Config::default(), store);
    assert_eq!(shared.params().steering_p, 60);
    assert_eq!(shared.params().drive_pwm, 150);
    assert_eq!(vehicle.control.actuation().steering_pid().gains().0, 60);
}

#[test]
fn test_manual_drive_from_setpoints() {
    let shared = SharedState::new(PersistentParameters::BOOT_DEFAULTS);
    let (mut vehicle, bench) = boot(&shared, &Config::default(), MemoryStore::new());

    click(&mut vehicle, &bench.green);
    assert_eq!(shared.control().mode, Mode::Manual);

    shared.update_params(|p| {
        p.drive_pwm = 200;
        p.steering_pwm = -50;
    });
    vehicle.dispatch(TaskKind::ControlTick);
    assert_eq!(bench.servo.duty.get(), 2550);
    assert_eq!(bench.motor.duty.get(), 200);

    click(&mut vehicle, &bench.blue);
    assert_eq!(shared.control().mode, Mode::Halt);
    vehicle.dispatch(TaskKind::ControlTick);
    assert_eq!(bench.servo.duty.get(), 3000);
    assert_eq!(bench.motor.duty.get(), 0);
}

#[test]
fn test_guidance_loss_halts_and_resets_menu() {
    let shared = SharedState::new(PersistentParameters::BOOT_DEFAULTS);
    let (mut vehicle, bench) = boot(&shared, &Config::default(), MemoryStore::new());
    shared.update_params(|p| p.drive_pwm = 180);

    click(&mut vehicle, &bench.green);
    click(&mut vehicle, &bench.green);
    assert_eq!(shared.control().mode, Mode::Auto);

    shared.store_reading(Channel::SensorLeft, 300);
    shared.store_reading(Channel::SensorRight, 300);
    vehicle.dispatch(TaskKind::ControlTick);
    assert_eq!(bench.motor.duty.get(), 180);

    // operator is browsing a parameter page when the line disappears
    shared.update_control(|c| {
        c.menu_index = 3;
        c.editing = true;
        c.needs_redraw = false;
    });
    shared.store_reading(Channel::SensorLeft, 4);
    shared.store_reading(Channel::SensorRight, 6);
    vehicle.dispatch(TaskKind::ControlTick);

    let control = shared.control();
    assert_eq!(control.mode, Mode::Halt);
    assert_eq!(control.menu_index, 0);
    assert!(!control.editing);
    assert!(control.needs_redraw);
    assert_eq!(bench.motor.duty.get(), 0);
    assert_eq!(bench.servo.duty.get(), 3000);
}

#[test]
fn test_scheduled_run_samples_and_steers() {
    let cfg = Config::default();
    let shared = SharedState::new(PersistentParameters::BOOT_DEFAULTS);
    let (mut vehicle, bench) = boot(&shared, &cfg, MemoryStore::new());
    bench.adc.set(Channel::SensorLeft, 200);
    bench.adc.set(Channel::SensorRight, 400);
    bench.adc.set(Channel::BattLogic, 700);
    bench.adc.set(Channel::BattDrive, 650);
    shared.update_control(|c| c.mode = Mode::Auto);
    shared.update_params(|p| p.drive_pwm = 200);

    let start = Instant::from_micros(0);
    let mut sched = Scheduler::new(&cfg.timing, start);
    let first = vehicle.first_conversion().unwrap();
    sched.inject(start + first, TaskKind::AdcComplete).unwrap();
    sched.inject(Instant::from_millis(10), TaskKind::SpeedEdge).unwrap();
    sched.inject(Instant::from_millis(210), TaskKind::SpeedEdge).unwrap();

    let mut adc_runs = 0;
    sched.advance_to(Instant::from_millis(300), |_, kind| {
        if kind == TaskKind::AdcComplete {
            adc_runs += 1;
        }
        vehicle.dispatch(kind)
    });

    assert_eq!(adc_runs, 300_000 / 104);
    let r = shared.readings();
    assert_eq!(r.get(Channel::SensorLeft), 200);
    assert_eq!(r.get(Channel::SensorRight), 400);
    assert_eq!(r.get(Channel::BattLogic), 700);
    assert_eq!(r.get(Channel::BattDrive), 650);

    let out = shared.outputs();
    assert_eq!(shared.control().mode, Mode::Auto);
    assert!(out.steering < 0, "right sensor stronger steers right");
    assert!(out.drive < 200);
    assert!(bench.servo.duty.get() < 3000);

    // 200 ms between edges spans 196 control ticks
    assert_eq!(shared.speed().speed, (20_000 / 196) as u8);
    assert_eq!(sched.now(), Instant::from_millis(300));
}
