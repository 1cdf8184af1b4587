//! Cancellable one-shot deadlines.
//!
//! Every timer in the controller (departure verification, door-open idle,
//! override expiry, stale-flush windows) is a [`Deadline`] checked during
//! evaluation rather than an ambient callback. Arming a deadline always
//! replaces the previous one, so there is never more than one in flight
//! per kind. A cancelled deadline simply never fires.

use embassy_time::{Duration, Instant};

/// A cancellable one-shot deadline with last-writer-wins re-arm semantics.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline that is not armed.
    pub const fn idle() -> Self {
        Self(None)
    }

    /// Arm at an absolute instant, replacing any pending deadline.
    pub fn arm(&mut self, at: Instant) {
        self.0 = Some(at);
    }

    /// Arm relative to `now`, replacing any pending deadline.
    pub fn arm_after(&mut self, now: Instant, delay: Duration) {
        self.0 = Some(now + delay);
    }

    /// Cancel without firing.
    pub fn cancel(&mut self) {
        self.0 = None;
    }

    /// Whether a deadline is armed and has not yet fired.
    pub fn is_pending(&self) -> bool {
        self.0.is_some()
    }

    /// Fire exactly once: returns `true` the first time it is called at or
    /// past the armed instant, disarming in the process.
    pub fn fire_if_expired(&mut self, now: Instant) -> bool {
        match self.0 {
            Some(at) if now >= at => {
                self.0 = None;
                true
            }
            _ => false,
        }
    }

    /// The armed instant, if any.
    pub fn expires_at(&self) -> Option<Instant> {
        self.0
    }
}
