mod hw;
mod script;

use std::path::PathBuf;

use clap::Parser;
use hw::{Console, SimAdc, SimDelay, SimLine, SimPwm, SimSerial, SimWatchdog};
use lfv_core::{
    mk_static,
    utils::{
        connection::Frontend,
        controllers::{MemoryStore, Peripherals, PersistentParameters},
        inputs::InputPins,
        state::Channel,
        Config, Instant, Scheduler, SharedState, TaskKind, Vehicle,
    },
};
use script::{Action, Button, Step};
use tracing::{error, info, warn};

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// Logical run time in milliseconds
    #[clap(long, default_value_t = 2000)]
    duration_ms: u64,
    /// JSON file overriding the default configuration
    #[clap(long)]
    config: Option<PathBuf>,
    /// JSON scenario script
    #[clap(long)]
    script: Option<PathBuf>,
    /// Minimum interval between two printed display frames
    #[clap(long, default_value_t = 100)]
    display_ms: u64,
}

/// Input lines the script can drive.
#[derive(Clone, Default)]
struct Panel {
    enc_a: SimLine,
    enc_b: SimLine,
    rotary: SimLine,
    green: SimLine,
    blue: SimLine,
}

impl Panel {
    fn button(
        &self,
        button: Button,
    ) -> &SimLine {
        match button {
            Button::Rotary => &self.rotary,
            Button::Green => &self.green,
            Button::Blue => &self.blue,
        }
    }
}

/// A line level change at a given millisecond.
struct Edge {
    at_ms: u64,
    line: SimLine,
    low: bool,
}

struct Driver {
    panel: Panel,
    adc: SimAdc,
    serial: SimSerial,
    edges: Vec<Edge>,
    wheel_period_ms: u64,
    next_wheel_ms: u64,
}

impl Driver {
    /// Turn one script step into line edges and sensor levels.
    fn apply(
        &mut self,
        step: &Step,
    ) {
        info!(at_ms = step.at_ms, action = ?step.action, "script");
        let at = step.at_ms;
        match &step.action {
            Action::Press { button, hold_ms } => {
                let line = self.panel.button(*button).clone();
                self.edge(at, &line, true);
                self.edge(at + hold_ms, &line, false);
            }
            Action::Turn { clicks } => {
                // one detent: 1 ms with A low (about 8 input ticks), then 1 ms released
                let ccw = *clicks < 0;
                let (a, b) = (self.panel.enc_a.clone(), self.panel.enc_b.clone());
                for i in 0..clicks.unsigned_abs() as u64 {
                    let t = at + 2 * i;
                    self.edge(t, &b, ccw);
                    self.edge(t, &a, true);
                    self.edge(t + 1, &a, false);
                    self.edge(t + 1, &b, false);
                }
            }
            Action::Line { left, right } => {
                self.adc.set(Channel::SensorLeft, *left);
                self.adc.set(Channel::SensorRight, *right);
            }
            Action::Battery { logic, drive } => {
                self.adc.set(Channel::BattLogic, *logic);
                self.adc.set(Channel::BattDrive, *drive);
            }
            Action::Wheel { period_ms } => {
                self.wheel_period_ms = *period_ms;
                self.next_wheel_ms = at + period_ms;
            }
            Action::Serial { bytes } => self.serial.receive(bytes),
        }
    }

    fn edge(
        &mut self,
        at_ms: u64,
        line: &SimLine,
        low: bool,
    ) {
        self.edges.push(Edge {
            at_ms,
            line: line.clone(),
            low,
        });
    }

    /// Apply every line edge due at `ms`.
    fn settle(
        &mut self,
        ms: u64,
    ) {
        self.edges.retain(|e| {
            if e.at_ms <= ms {
                e.line.set_low(e.low);
                false
            } else {
                true
            }
        });
    }

    fn wheel_edge_due(
        &mut self,
        ms: u64,
    ) -> bool {
        if self.wheel_period_ms == 0 || ms < self.next_wheel_ms {
            return false;
        }
        self.next_wheel_ms = ms + self.wheel_period_ms;
        true
    }
}

fn run(opts: Opts) -> Result<(), script::LoadError> {
    let cfg = match &opts.config {
        Some(path) => script::load_config(path)?,
        None => Config::default(),
    };
    let steps = match &opts.script {
        Some(path) => script::load_script(path)?,
        None => Vec::new(),
    };

    let shared = &*mk_static!(SharedState, SharedState::new(PersistentParameters::BOOT_DEFAULTS));

    let mut driver = Driver {
        panel: Panel::default(),
        adc: SimAdc::default(),
        serial: SimSerial::default(),
        edges: Vec::new(),
        wheel_period_ms: 0,
        next_wheel_ms: 0,
    };
    let motor = SimPwm::new("motor", 255);
    let servo = SimPwm::new("servo", cfg.actuation.servo_period);
    let watchdog = SimWatchdog::default();

    let panel = driver.panel.clone();
    let mut vehicle = Vehicle::boot(
        shared,
        &cfg,
        Peripherals {
            pins: InputPins {
                enc_a: panel.enc_a,
                enc_b: panel.enc_b,
                rotary: panel.rotary,
                green: panel.green,
                blue: panel.blue,
            },
            store: MemoryStore::new(),
            motor: motor.clone(),
            servo: servo.clone(),
            adc: driver.adc.clone(),
            serial: driver.serial.clone(),
        },
    );

    let mut frontend = Frontend::new(Console::new(), watchdog.clone());
    if let Err(e) = frontend.splash(&cfg.splash, &mut SimDelay) {
        warn!(?e, "splash failed");
    }
    frontend.enable_watchdog(cfg.timing.watchdog_timeout());

    let start = Instant::from_micros(0);
    let mut sched = Scheduler::new(&cfg.timing, start);
    if let Some(first) = vehicle.first_conversion() {
        if let Err(e) = sched.inject(start + first, TaskKind::AdcComplete) {
            error!(?e, "could not queue first conversion");
        }
    }

    let mut steps = steps.into_iter().peekable();
    let mut shown = frontend.display().text();
    let mut last_shown_ms = 0;
    let mut dispatched = 0usize;

    for ms in 0..=opts.duration_ms {
        while let Some(step) = steps.next_if(|s| s.at_ms <= ms) {
            driver.apply(&step);
        }
        driver.settle(ms);
        let now = Instant::from_millis(ms);
        if driver.wheel_edge_due(ms) {
            if let Err(e) = sched.inject(now, TaskKind::SpeedEdge) {
                warn!(?e, "speed edge dropped");
            }
        }

        dispatched += sched.advance_to(now, |_, kind| vehicle.dispatch(kind));

        if let Err(e) = frontend.poll(shared) {
            warn!(?e, "display refresh failed");
        }
        let text = frontend.display().text();
        if text != shown && ms >= last_shown_ms + opts.display_ms {
            info!(ms, "|{}|", text[0]);
            info!(ms, "|{}|", text[1]);
            shown = text;
            last_shown_ms = ms;
        }
    }

    let summary = serde_json::json!({
        "mode": shared.control().mode,
        "params": shared.params(),
        "outputs": shared.outputs(),
        "servo_duty": servo.duty(),
        "motor_duty": motor.duty(),
        "tasks": dispatched,
        "watchdog_feeds": watchdog.feeds(),
        "saved_writes": vehicle.input.store().writes(),
    });
    info!("{}", summary);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let opts = Opts::parse();
    if let Err(e) = run(opts) {
        error!("simulation aborted: {}", e);
        std::process::exit(1);
    }
}
