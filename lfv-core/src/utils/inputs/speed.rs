//! Wheel speed from the period between two speed-sensor edges.
//!
//! The control tick counts periods; the edge interrupt turns the count into a
//! speed and restarts it. A count that reaches `i16::MAX` marks the wheel as
//! stopped, and the next edge then reports zero.

use crate::utils::state::{SharedState, SpeedState};

/// Speed units per control-tick period.
pub const SPEED_SCALE: u32 = 20_000;

/// Control-tick side: advance the period counter.
pub fn tick(shared: &SharedState) {
    shared.update_speed(|s| {
        s.count = s.count.saturating_add(1);
        if s.count >= i16::MAX as u16 {
            s.overflow = true;
        }
    });
}

/// Edge-interrupt side: compute the speed and restart the period.
pub fn on_edge(shared: &SharedState) -> u8 {
    shared.update_speed(edge)
}

fn edge(s: &mut SpeedState) -> u8 {
    s.speed = if s.overflow {
        s.overflow = false;
        0
    } else if s.count == 0 {
        u8::MAX
    } else {
        (SPEED_SCALE / s.count as u32).min(u8::MAX as u32) as u8
    };
    s.count = 0;
    s.speed
}
