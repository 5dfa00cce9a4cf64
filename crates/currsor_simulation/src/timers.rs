//! Simulation clock + cancellable deferred actions.
//!
//! Single-threaded: timers fire only from `drain_due`, which the composition
//! root calls right after advancing the clock. Nothing blocks or sleeps.

use bevy::prelude::*;

/// Monotonic simulation time in seconds.
///
/// Absolute time is `f64` seconds (as `Time::elapsed_secs_f64`); deltas and
/// durations stay `f32`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimClock {
    now: f64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at an arbitrary point (restored sessions, long-uptime servers).
    pub fn starting_at(now: f64) -> Self {
        Self {
            now: if now.is_finite() { now.max(0.0) } else { 0.0 },
        }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    /// Негативные и NaN дельты игнорируются (время не идёт назад)
    pub fn advance(&mut self, delta: f32) -> f64 {
        if delta.is_finite() && delta > 0.0 {
            self.now += f64::from(delta);
        }
        self.now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// What happens to the owner when its timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Restore full health and return to Idle.
    Respawn,
    /// Remove the entity from every core table and request despawn.
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiredTimer {
    pub handle: TimerHandle,
    pub owner: Entity,
    pub action: TimerAction,
    pub due: f64,
}

#[derive(Debug, Clone)]
struct ScheduledTimer {
    handle: TimerHandle,
    owner: Entity,
    action: TimerAction,
    due: f64,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    scheduled: Vec<ScheduledTimer>,
    next_handle: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, owner: Entity, now: f64, delay: f32, action: TimerAction) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.scheduled.push(ScheduledTimer {
            handle,
            owner,
            action,
            due: now + f64::from(delay.max(0.0)),
        });
        handle
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.scheduled.len();
        self.scheduled.retain(|timer| timer.handle != handle);
        self.scheduled.len() != before
    }

    /// Cancels every timer owned by `owner`, returns how many were dropped.
    pub fn cancel_owner(&mut self, owner: Entity) -> usize {
        let before = self.scheduled.len();
        self.scheduled.retain(|timer| timer.owner != owner);
        before - self.scheduled.len()
    }

    pub fn pending_for(&self, owner: Entity) -> Vec<TimerAction> {
        self.scheduled
            .iter()
            .filter(|timer| timer.owner == owner)
            .map(|timer| timer.action)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.scheduled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty()
    }

    pub fn clear(&mut self) {
        self.scheduled.clear();
    }

    /// Removes and returns timers with `due <= now`, earliest first
    /// (ties broken by schedule order).
    pub fn drain_due(&mut self, now: f64) -> Vec<FiredTimer> {
        let mut fired: Vec<FiredTimer> = Vec::new();
        self.scheduled.retain(|timer| {
            if timer.due <= now {
                fired.push(FiredTimer {
                    handle: timer.handle,
                    owner: timer.owner,
                    action: timer.action,
                    due: timer.due,
                });
                false
            } else {
                true
            }
        });

        fired.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.handle.cmp(&b.handle)));
        fired
    }
}
