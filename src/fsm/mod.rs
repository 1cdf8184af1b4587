//! Function-pointer occupancy state machine.
//!
//! Classic state-table pattern:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  StateTable                                             │
//! │  ┌─────────┬───────────┬──────────┬───────────────────┐ │
//! │  │ StateId │ on_enter  │ on_exit  │ on_update         │ │
//! │  ├─────────┼───────────┼──────────┼───────────────────┤ │
//! │  │ Away    │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  │ Present │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  └─────────┴───────────┴──────────┴───────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Every sensor update and control tick runs `on_update` for the current
//! state. If it returns `Some(next)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and the committed
//! [`Transition`] is returned to the caller for observer fan-out, exactly
//! once per commit, never on mere evaluation.
//!
//! The machine owns [`SensorState`] exclusively; the only way to mutate it
//! is through the `update_*` methods here, which also manage the departure
//! and door-idle deadlines before re-evaluating.

pub mod context;
pub mod states;

use embassy_time::Instant;
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::SystemConfig;
use context::{MachineContext, SensorState};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Occupancy states. The office starts AWAY until proven otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum OccupancyState {
    Away = 0,
    Present = 1,
}

impl OccupancyState {
    /// Total number of states — used to size the table array.
    pub const COUNT: usize = 2;

    /// Convert an index back to `OccupancyState`. Panics on out-of-range in
    /// debug builds; returns `Away` in release (safe fallback).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Away,
            1 => Self::Present,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Away
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Away => "away",
            Self::Present => "present",
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut MachineContext);

/// Signature for the per-evaluation update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut MachineContext) -> Option<OccupancyState>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single state. Stored in a fixed-size array — no
/// heap, no `dyn`.
pub struct StateDescriptor {
    pub id: OccupancyState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

/// A committed state change, handed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: OccupancyState,
    pub to: OccupancyState,
}

// ---------------------------------------------------------------------------
// Occupancy machine
// ---------------------------------------------------------------------------

/// The occupancy state machine: the state table, the current state pointer,
/// and the exclusively-owned [`MachineContext`].
pub struct OccupancyMachine {
    table: [StateDescriptor; OccupancyState::COUNT],
    current: usize,
    ctx: MachineContext,
}

impl OccupancyMachine {
    /// Construct starting AWAY. Call [`start`](Self::start) once before the
    /// first update.
    pub fn new(config: SystemConfig) -> Self {
        Self {
            table: states::build_state_table(),
            current: OccupancyState::Away as usize,
            ctx: MachineContext::new(config),
        }
    }

    /// Run the initial `on_enter` for the starting state.
    pub fn start(&mut self, now: Instant) {
        self.ctx.now = now;
        info!(
            "occupancy machine starting in {}",
            self.table[self.current].name
        );
        if let Some(enter) = self.table[self.current].on_enter {
            enter(&mut self.ctx);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> OccupancyState {
        OccupancyState::from_index(self.current)
    }

    pub fn sensors(&self) -> &SensorState {
        &self.ctx.sensors
    }

    /// Window or door open — climate systems must stand down.
    pub fn safety_interlock_active(&self) -> bool {
        self.ctx.safety_interlock_active()
    }

    /// True while the departure-verification grace window is open.
    pub fn departure_pending(&self) -> bool {
        self.ctx.departure.is_pending()
    }

    /// True once the door has been open past the held-open threshold.
    pub fn door_held_open(&self, now: Instant) -> bool {
        // The predicate reads ctx.now; evaluate() keeps it fresh, but a
        // caller-supplied instant must win for queries between updates.
        self.ctx.sensors.door_open
            && self
                .ctx
                .door_open_since
                .is_some_and(|since| now >= since + self.ctx.door_idle_window())
    }

    // ── Sensor update methods ─────────────────────────────────

    /// Door contact changed. An open→close edge while PRESENT arms
    /// departure verification; re-opening restarts the sequence.
    pub fn update_door(&mut self, open: bool, now: Instant) -> Option<Transition> {
        self.ctx.now = now;
        if self.ctx.sensors.door_open == open {
            // Duplicate edge from the gateway; nothing to re-arm.
            return self.evaluate(now);
        }
        self.ctx.sensors.set_door(open, now);
        if open {
            self.ctx.door_open_since = Some(now);
            if self.ctx.departure.is_pending() {
                info!("door reopened, departure sequence restarted");
                self.ctx.departure.cancel();
            }
        } else {
            self.ctx.door_open_since = None;
            self.ctx.door_idle.cancel();
            if self.state() == OccupancyState::Present {
                info!(
                    "door closed while present, verifying departure for {}s",
                    self.ctx.config.departure_verify_seconds
                );
                let grace = self.ctx.departure_grace();
                self.ctx.departure.arm_after(now, grace);
            }
        }
        self.evaluate(now)
    }

    /// Window contact changed. Only feeds the safety interlock.
    pub fn update_window(&mut self, open: bool, now: Instant) -> Option<Transition> {
        self.ctx.now = now;
        self.ctx.sensors.set_window(open, now);
        self.evaluate(now)
    }

    /// Motion sensor event. A detection aborts any pending departure and
    /// counts as activity for the held-open idle window; a clear does
    /// neither.
    pub fn update_motion(&mut self, detected: bool, now: Instant) -> Option<Transition> {
        self.ctx.now = now;
        self.ctx.sensors.set_motion(detected, now);
        if detected {
            if self.ctx.departure.is_pending() {
                info!("motion during departure verification, staying present");
                self.ctx.departure.cancel();
            }
            self.note_activity(now);
        }
        self.evaluate(now)
    }

    /// Workstation occupancy report: raw last-activity timestamp plus the
    /// external-monitor flag. Qualifying activity (newer than the door's
    /// last change, monitor attached) aborts a pending departure.
    pub fn update_workstation(
        &mut self,
        last_active: Instant,
        external_monitor: bool,
        now: Instant,
    ) -> Option<Transition> {
        self.ctx.now = now;
        self.ctx
            .sensors
            .set_workstation(last_active, external_monitor, now);
        if self.ctx.qualifying_activity() {
            if self.ctx.departure.is_pending() {
                info!("workstation activity during departure verification, staying present");
                self.ctx.departure.cancel();
            }
            self.note_activity(now);
        }
        self.evaluate(now)
    }

    /// Air-quality reading. Never affects occupancy directly, but is
    /// stamped into the sensor state for the coordinators.
    pub fn update_air_quality(
        &mut self,
        co2_ppm: Option<u16>,
        tvoc_ppb: Option<u16>,
        temp_c: Option<f32>,
        now: Instant,
    ) -> Option<Transition> {
        self.ctx.sensors.set_air_quality(co2_ppm, tvoc_ppb, temp_c, now);
        self.evaluate(now)
    }

    /// Re-run the current state's update handler. This is also the timer
    /// check: the control loop calls this every tick so pending deadlines
    /// fire within one tick of expiry.
    pub fn evaluate(&mut self, now: Instant) -> Option<Transition> {
        self.ctx.now = now;
        let next = (self.table[self.current].on_update)(&mut self.ctx);
        match next {
            Some(next_id) if next_id as usize != self.current => Some(self.transition(next_id)),
            _ => None,
        }
    }

    // ── Internal ──────────────────────────────────────────────

    /// Activity (motion or qualifying workstation input) re-arms the
    /// held-open idle window while PRESENT.
    fn note_activity(&mut self, now: Instant) {
        if self.state() == OccupancyState::Present && self.ctx.door_held_open() {
            let window = self.ctx.door_idle_window();
            self.ctx.door_idle.arm_after(now, window);
        }
    }

    fn transition(&mut self, next_id: OccupancyState) -> Transition {
        let next_idx = next_id as usize;
        let from = self.state();

        info!(
            "occupancy: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(&mut self.ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(&mut self.ctx);
        }

        Transition { from, to: next_id }
    }
}
