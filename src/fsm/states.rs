//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers — no closures, no dynamic
//! dispatch, no heap.
//!
//! ```text
//!  AWAY ──[presence signal]──────────────▶ PRESENT
//!    ▲                                        │
//!    │          [door open→close, 10s grace   │
//!    │           with no presence signal]     │
//!    └────────────────────────────────────────┘
//!
//!  Door held open ≥5min: presence becomes activity-only; PRESENT→AWAY
//!  after a 5-minute idle window instead of a door sequence.
//! ```
//!
//! Deadline arming on sensor edges (door close → departure verification,
//! activity → idle-window restart) lives in the `OccupancyMachine` update
//! methods; the handlers here only read the context and decide transitions.

use log::info;

use super::context::MachineContext;
use super::{OccupancyState, StateDescriptor};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table. Called once at startup.
pub fn build_state_table() -> [StateDescriptor; OccupancyState::COUNT] {
    [
        // Index 0 — Away
        StateDescriptor {
            id: OccupancyState::Away,
            name: "Away",
            on_enter: Some(away_enter),
            on_exit: None,
            on_update: away_update,
        },
        // Index 1 — Present
        StateDescriptor {
            id: OccupancyState::Present,
            name: "Present",
            on_enter: Some(present_enter),
            on_exit: None,
            on_update: present_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  AWAY state
// ═══════════════════════════════════════════════════════════════════════════

fn away_enter(ctx: &mut MachineContext) {
    // Committing to Away discards the stale motion signal so a late
    // "motion clear" event cannot resurrect presence through the recency
    // check. Neither departure nor idle deadlines survive the commit.
    ctx.sensors.clear_motion();
    ctx.departure.cancel();
    ctx.door_idle.cancel();
    info!("AWAY: waiting for a presence signal");
}

fn away_update(ctx: &mut MachineContext) -> Option<OccupancyState> {
    if ctx.presence_signal() {
        return Some(OccupancyState::Present);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  PRESENT state
// ═══════════════════════════════════════════════════════════════════════════

fn present_enter(ctx: &mut MachineContext) {
    ctx.departure.cancel();
    if ctx.door_held_open() {
        // Entered through held-open semantics: the idle window opens now.
        let window = ctx.door_idle_window();
        ctx.door_idle.arm_after(ctx.now, window);
    }
    info!("PRESENT: occupant detected");
}

fn present_update(ctx: &mut MachineContext) -> Option<OccupancyState> {
    if ctx.door_held_open() {
        if !ctx.door_idle.is_pending() {
            // The door just crossed the held-open threshold: switch to
            // activity-only semantics and open the idle window.
            info!(
                "door held open {}+ min, presence now requires activity",
                ctx.config.door_open_away_minutes
            );
            let window = ctx.door_idle_window();
            ctx.door_idle.arm_after(ctx.now, window);
            return None;
        }
        if ctx.door_idle.fire_if_expired(ctx.now) {
            info!("no activity through the idle window, committing away (door open)");
            return Some(OccupancyState::Away);
        }
        return None;
    }

    // Standard semantics: only a verified departure leaves Present. The
    // grace deadline is armed by the door open→close edge and cancelled by
    // any presence signal during the window, so firing here is the commit.
    if ctx.departure.fire_if_expired(ctx.now) {
        info!("departure verified, committing away");
        return Some(OccupancyState::Away);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;
    use embassy_time::Instant;

    fn t(secs: u64) -> Instant {
        Instant::from_secs(secs)
    }

    fn ctx_at(secs: u64) -> MachineContext {
        let mut ctx = MachineContext::new(SystemConfig::default());
        ctx.now = t(secs);
        ctx
    }

    #[test]
    fn away_stays_without_signals() {
        let mut ctx = ctx_at(100);
        assert_eq!(away_update(&mut ctx), None);
    }

    #[test]
    fn away_leaves_on_motion_with_closed_door() {
        let mut ctx = ctx_at(100);
        ctx.sensors.set_motion(true, t(100));
        assert_eq!(away_update(&mut ctx), Some(OccupancyState::Present));
    }

    #[test]
    fn present_ignores_unarmed_deadlines() {
        let mut ctx = ctx_at(1_000);
        assert_eq!(present_update(&mut ctx), None);
    }

    #[test]
    fn present_commits_on_expired_departure() {
        let mut ctx = ctx_at(100);
        ctx.departure.arm(t(90));
        assert_eq!(present_update(&mut ctx), Some(OccupancyState::Away));
        assert!(!ctx.departure.is_pending());
    }

    #[test]
    fn held_open_engagement_arms_idle_window_before_firing() {
        let mut ctx = ctx_at(400);
        ctx.sensors.set_door(true, t(0));
        ctx.door_open_since = Some(t(0));

        // First evaluation in held-open mode arms, never fires.
        assert_eq!(present_update(&mut ctx), None);
        assert!(ctx.door_idle.is_pending());

        ctx.now = t(400 + 5 * 60);
        assert_eq!(present_update(&mut ctx), Some(OccupancyState::Away));
    }

    #[test]
    fn away_entry_discards_motion_and_deadlines() {
        let mut ctx = ctx_at(100);
        ctx.sensors.set_motion(true, t(99));
        ctx.departure.arm(t(300));
        ctx.door_idle.arm(t(300));

        away_enter(&mut ctx);
        assert!(!ctx.sensors.motion_detected);
        assert!(ctx.sensors.motion_last_seen.is_none());
        assert!(!ctx.departure.is_pending());
        assert!(!ctx.door_idle.is_pending());
    }
}
