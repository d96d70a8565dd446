//! Mode and menu state machine.
//!
//! Driven once per input tick with the debounced [`InputEvent`]. Pages are a
//! fixed descriptor table; every parameter page shares one edit routine keyed
//! by its storage [`Slot`].
//!
//! Mode transitions (Overview page only):
//!
//! | from   | green (A) | blue (B) |
//! |--------|-----------|----------|
//! | Halt   | Manual    | Halt     |
//! | Manual | Auto      | Halt     |
//! | Auto   | Manual    | Halt     |

use crate::utils::{
    controllers::params::{ParamStore, PersistentParameters, Slot},
    inputs::InputEvent,
    state::{Channel, ControlState, Mode, SharedState},
};

/// What a menu page shows and edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Overview,
    Parameter(Slot),
    Reading(Channel),
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    /// Title shown on the first display row, empty for the overview.
    pub label: &'static str,
    pub kind: PageKind,
}

pub const PAGES: [Page; 11] = [
    Page { label: "", kind: PageKind::Overview },
    Page { label: "PWM Motor", kind: PageKind::Parameter(Slot::DrivePwm) },
    Page { label: "PWM Servo", kind: PageKind::Parameter(Slot::SteeringPwm) },
    Page { label: "PID Drive: P", kind: PageKind::Parameter(Slot::DriveP) },
    Page { label: "PID Drive: I", kind: PageKind::Parameter(Slot::DriveI) },
    Page { label: "PID Steering: P", kind: PageKind::Parameter(Slot::SteeringP) },
    Page { label: "PID Steering: I", kind: PageKind::Parameter(Slot::SteeringI) },
    Page { label: "ADC Inductor: L", kind: PageKind::Reading(Channel::SensorLeft) },
    Page { label: "ADC Inductor: R", kind: PageKind::Reading(Channel::SensorRight) },
    Page { label: "ADC Batt: Logic", kind: PageKind::Reading(Channel::BattLogic) },
    Page { label: "ADC Batt: Drive", kind: PageKind::Reading(Channel::BattDrive) },
];

pub const PAGE_COUNT: u8 = PAGES.len() as u8;
pub const OVERVIEW: u8 = 0;

pub fn page(index: u8) -> Option<&'static Page> {
    PAGES.get(index as usize)
}

/// Non-volatile access requested by a menu event, performed outside the
/// critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    None,
    Load(Slot),
    Save(Slot, i16),
}

/// Next mode for a button press on the overview page.
pub fn transition(
    mode: Mode,
    event: InputEvent,
) -> Mode {
    match (mode, event) {
        (_, InputEvent::ButtonB) => Mode::Halt,
        (Mode::Halt, InputEvent::ButtonA) => Mode::Manual,
        (Mode::Manual, InputEvent::ButtonA) => Mode::Auto,
        (Mode::Auto, InputEvent::ButtonA) => Mode::Manual,
        (mode, _) => mode,
    }
}

/// Apply one input event to the menu and the parameter mirror.
pub fn handle(
    event: InputEvent,
    control: &mut ControlState,
    params: &mut PersistentParameters,
) -> MenuAction {
    if event.is_none() {
        return MenuAction::None;
    }

    if !control.editing {
        match event {
            InputEvent::StepCw if control.menu_index + 1 < PAGE_COUNT => control.menu_index += 1,
            InputEvent::StepCcw if control.menu_index > OVERVIEW => control.menu_index -= 1,
            _ => {}
        }
        control.needs_redraw = true;
    }

    let Some(page) = page(control.menu_index) else {
        return MenuAction::None;
    };

    match page.kind {
        PageKind::Overview => {
            let next = transition(control.mode, event);
            if next != control.mode {
                tracing::info!(from = ?control.mode, to = ?next, "mode change");
                control.mode = next;
            }
            MenuAction::None
        }
        PageKind::Parameter(slot) => edit_parameter(slot, event, control, params),
        PageKind::Reading(_) => MenuAction::None,
    }
}

fn edit_parameter(
    slot: Slot,
    event: InputEvent,
    control: &mut ControlState,
    params: &mut PersistentParameters,
) -> MenuAction {
    match event {
        InputEvent::RotaryPress => {
            control.editing = !control.editing;
            MenuAction::None
        }
        InputEvent::StepCw if control.editing => {
            params.set(slot, params.get(slot).wrapping_add(1));
            MenuAction::None
        }
        InputEvent::StepCcw if control.editing => {
            params.set(slot, params.get(slot).wrapping_sub(1));
            MenuAction::None
        }
        InputEvent::ButtonA => MenuAction::Load(slot),
        InputEvent::ButtonB => MenuAction::Save(slot, params.get(slot)),
        _ => MenuAction::None,
    }
}

/// Run `handle` against the shared state, then perform the storage access.
pub fn dispatch<S: ParamStore>(
    event: InputEvent,
    shared: &SharedState,
    store: &mut S,
) -> MenuAction {
    let action = shared.update_console(|control, params| handle(event, control, params));
    match action {
        MenuAction::None => {}
        MenuAction::Load(slot) => match store.read_word(slot) {
            Ok(value) => {
                shared.update_params(|p| p.set(slot, value));
                tracing::info!(?slot, value, "parameter loaded");
            }
            Err(e) => tracing::error!(?slot, ?e, "parameter load failed"),
        },
        MenuAction::Save(slot, value) => match store.write_word(slot, value) {
            Ok(()) => tracing::info!(?slot, value, "parameter saved"),
            Err(e) => tracing::error!(?slot, ?e, "parameter save failed"),
        },
    }
    action
}
