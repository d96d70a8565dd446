//! Deterministic task dispatcher over logical time.
//!
//! On the MCU every [`TaskKind`] is a hardware interrupt and this module is
//! not needed. On the host the [`Scheduler`] replays the same interrupt
//! pattern: periodic ticks, one-shot conversion completions and injected
//! external edges, ordered by due time and then by [`TaskKind::priority`].

use embassy_time::{Duration, Instant};
use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::utils::config::TimingConfig;

/// Pending entries the queue can hold.
pub const QUEUE_DEPTH: usize = 16;

/// The interrupt sources of the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    InputTick,
    ControlTick,
    FrameTick,
    AdcComplete,
    SpeedEdge,
}

impl TaskKind {
    pub const PERIODIC: [TaskKind; 3] = [
        TaskKind::InputTick,
        TaskKind::ControlTick,
        TaskKind::FrameTick,
    ];

    /// Higher runs first when several kinds are due at the same instant.
    /// Mirrors the interrupt vector order of the reference MCU.
    pub fn priority(self) -> u8 {
        match self {
            TaskKind::SpeedEdge => 4,
            TaskKind::ControlTick => 3,
            TaskKind::FrameTick => 2,
            TaskKind::InputTick => 1,
            TaskKind::AdcComplete => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    at: Instant,
    kind: TaskKind,
    period: Option<Duration>,
}

impl Pending {
    fn runs_before(
        &self,
        other: &Pending,
    ) -> bool {
        (self.at, core::cmp::Reverse(self.kind.priority()))
            < (other.at, core::cmp::Reverse(other.kind.priority()))
    }
}

/// The queue is out of room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull(pub TaskKind);

#[derive(Debug)]
pub struct Scheduler {
    now: Instant,
    queue: Vec<Pending, QUEUE_DEPTH>,
}

impl Scheduler {
    /// Queue every periodic task for its first firing one period after `start`.
    pub fn new(
        timing: &TimingConfig,
        start: Instant,
    ) -> Self {
        let mut sched = Self {
            now: start,
            queue: Vec::new(),
        };
        for kind in TaskKind::PERIODIC {
            if let Some(period) = timing.period(kind) {
                // three entries always fit an empty queue
                let _ = sched.queue.push(Pending {
                    at: start + period,
                    kind,
                    period: Some(period),
                });
            }
        }
        sched
    }

    /// Logical time of the last dispatched task.
    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queue a one-shot task. Times in the past fire at the current instant.
    pub fn inject(
        &mut self,
        at: Instant,
        kind: TaskKind,
    ) -> Result<(), QueueFull> {
        let at = at.max(self.now);
        self.queue
            .push(Pending {
                at,
                kind,
                period: None,
            })
            .map_err(|_| QueueFull(kind))
    }

    /// Queue a one-shot task `after` from now.
    pub fn inject_after(
        &mut self,
        after: Duration,
        kind: TaskKind,
    ) -> Result<(), QueueFull> {
        self.inject(self.now + after, kind)
    }

    /// Earliest pending task without removing it.
    pub fn peek(&self) -> Option<(Instant, TaskKind)> {
        self.earliest().map(|i| (self.queue[i].at, self.queue[i].kind))
    }

    /// Remove and return the next task due at or before `until`, advancing
    /// logical time to its due instant. Periodic tasks are re-queued one
    /// period after their previous due time.
    pub fn pop_due(
        &mut self,
        until: Instant,
    ) -> Option<(Instant, TaskKind)> {
        let index = self.earliest()?;
        if self.queue[index].at > until {
            return None;
        }
        let task = self.queue.swap_remove(index);
        self.now = task.at;
        if let Some(period) = task.period {
            let _ = self.queue.push(Pending {
                at: task.at + period,
                ..task
            });
        }
        Some((task.at, task.kind))
    }

    /// Run every task due up to `until`, then move logical time to `until`.
    ///
    /// The handler may return a delay after which the same kind fires once
    /// more, used for conversion chains. Returns the number of tasks run.
    pub fn advance_to<F>(
        &mut self,
        until: Instant,
        mut handler: F,
    ) -> usize
    where
        F: FnMut(Instant, TaskKind) -> Option<Duration>,
    {
        let mut ran = 0;
        while let Some((at, kind)) = self.pop_due(until) {
            ran += 1;
            if let Some(after) = handler(at, kind) {
                if let Err(e) = self.inject(at + after, kind) {
                    tracing::error!(?e, "scheduler queue full, dropping follow-up");
                }
            }
        }
        self.now = self.now.max(until);
        ran
    }

    fn earliest(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, p) in self.queue.iter().enumerate() {
            match best {
                Some(b) if !p.runs_before(&self.queue[b]) => {}
                _ => best = Some(i),
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use std::vec::Vec as StdVec;

    use super::*;

    fn us(v: u64) -> Instant {
        Instant::from_micros(v)
    }

    fn collect(
        sched: &mut Scheduler,
        until: Instant,
    ) -> StdVec<(u64, TaskKind)> {
        let mut seen = StdVec::new();
        sched.advance_to(until, |at, kind| {
            seen.push((at.as_micros(), kind));
            None
        });
        seen
    }

    #[test]
    fn periodic_rates() {
        let mut s = Scheduler::new(&TimingConfig::default(), us(0));
        let seen = collect(&mut s, us(40_000));
        let count = |k| seen.iter().filter(|(_, kind)| *kind == k).count();
        assert_eq!(count(TaskKind::InputTick), 312);
        assert_eq!(count(TaskKind::ControlTick), 39);
        assert_eq!(count(TaskKind::FrameTick), 2);
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(s.now(), us(40_000));
    }

    #[test]
    fn same_instant_runs_by_priority() {
        let timing = TimingConfig {
            input_period_us: 100,
            control_period_us: 100,
            frame_period_us: 100,
            adc_conversion_us: 10,
            ..TimingConfig::default()
        };
        let mut s = Scheduler::new(&timing, us(0));
        s.inject(us(100), TaskKind::AdcComplete).unwrap();
        s.inject(us(100), TaskKind::SpeedEdge).unwrap();
        let seen: StdVec<TaskKind> = collect(&mut s, us(100)).into_iter().map(|(_, k)| k).collect();
        assert_eq!(
            seen,
            [
                TaskKind::SpeedEdge,
                TaskKind::ControlTick,
                TaskKind::FrameTick,
                TaskKind::InputTick,
                TaskKind::AdcComplete,
            ]
        );
    }

    #[test]
    fn follow_up_chains_one_shots() {
        let timing = TimingConfig {
            input_period_us: 1_000_000,
            control_period_us: 1_000_000,
            frame_period_us: 1_000_000,
            adc_conversion_us: 104,
            ..TimingConfig::default()
        };
        let mut s = Scheduler::new(&timing, us(0));
        s.inject_after(timing.adc_conversion(), TaskKind::AdcComplete)
            .unwrap();
        let mut conversions = 0;
        s.advance_to(us(1040), |_, kind| {
            assert_eq!(kind, TaskKind::AdcComplete);
            conversions += 1;
            Some(timing.adc_conversion())
        });
        assert_eq!(conversions, 10);
        assert_eq!(s.peek(), Some((us(1144), TaskKind::AdcComplete)));
    }

    #[test]
    fn past_injections_fire_now() {
        let mut s = Scheduler::new(&TimingConfig::default(), us(0));
        s.advance_to(us(500), |_, _| None);
        s.inject(us(10), TaskKind::SpeedEdge).unwrap();
        assert_eq!(s.peek(), Some((us(500), TaskKind::SpeedEdge)));
    }

    #[test]
    fn queue_overflow_is_reported() {
        let mut s = Scheduler::new(&TimingConfig::default(), us(0));
        let free = QUEUE_DEPTH - s.pending();
        for i in 0..free {
            s.inject(us(i as u64), TaskKind::SpeedEdge).unwrap();
        }
        assert_eq!(
            s.inject(us(0), TaskKind::SpeedEdge),
            Err(QueueFull(TaskKind::SpeedEdge))
        );
    }
}
