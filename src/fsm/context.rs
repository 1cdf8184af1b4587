//! Shared mutable context threaded through every state handler.
//!
//! `MachineContext` is the single struct the occupancy handlers read from
//! and write to: the raw sensor snapshot, the two cancellable deadlines
//! (departure verification and door-open idle), door-open tracking, timing,
//! and configuration. Think of it as the "blackboard" in a blackboard
//! architecture.

use embassy_time::{Duration, Instant};

use crate::config::SystemConfig;
use crate::timers::Deadline;

// ---------------------------------------------------------------------------
// Sensor state (written only through the mutators below)
// ---------------------------------------------------------------------------

/// Current state of every raw input, with last-change timestamps.
///
/// One instance per deployment, owned exclusively by the occupancy machine
/// and alive for the process lifetime. Every field that can be absent is an
/// `Option`: absence means "insufficient data", never an error.
#[derive(Debug, Clone, Default)]
pub struct SensorState {
    /// Last input activity on the workstation (raw timestamp from the
    /// collaborator; all active-vs-idle policy lives in this crate).
    pub mac_last_active: Option<Instant>,
    /// External monitor attached to the workstation.
    pub external_monitor: bool,

    pub motion_detected: bool,
    pub motion_last_seen: Option<Instant>,

    pub door_open: bool,
    pub door_last_changed: Option<Instant>,

    pub window_open: bool,

    pub co2_ppm: Option<u16>,
    pub tvoc_ppb: Option<u16>,
    pub temp_c: Option<f32>,

    /// Stamped by every mutation.
    pub last_updated: Option<Instant>,
}

impl SensorState {
    pub(crate) fn set_door(&mut self, open: bool, now: Instant) {
        self.door_open = open;
        self.door_last_changed = Some(now);
        self.touch(now);
    }

    pub(crate) fn set_window(&mut self, open: bool, now: Instant) {
        self.window_open = open;
        self.touch(now);
    }

    pub(crate) fn set_motion(&mut self, detected: bool, now: Instant) {
        self.motion_detected = detected;
        if detected {
            self.motion_last_seen = Some(now);
        }
        self.touch(now);
    }

    pub(crate) fn set_workstation(&mut self, last_active: Instant, monitor: bool, now: Instant) {
        self.mac_last_active = Some(last_active);
        self.external_monitor = monitor;
        self.touch(now);
    }

    /// Store an air-quality reading. Fields absent from the reading keep
    /// their previous value rather than erasing it.
    pub(crate) fn set_air_quality(
        &mut self,
        co2_ppm: Option<u16>,
        tvoc_ppb: Option<u16>,
        temp_c: Option<f32>,
        now: Instant,
    ) {
        if co2_ppm.is_some() {
            self.co2_ppm = co2_ppm;
        }
        if tvoc_ppb.is_some() {
            self.tvoc_ppb = tvoc_ppb;
        }
        if temp_c.is_some() {
            self.temp_c = temp_c;
        }
        self.touch(now);
    }

    /// Discard the motion signal entirely. Done when committing to AWAY so
    /// a late "motion clear" event cannot re-arm a false PRESENT through
    /// the recency check.
    pub(crate) fn clear_motion(&mut self) {
        self.motion_detected = false;
        self.motion_last_seen = None;
    }

    /// Motion seen within `timeout` of `now`.
    pub fn recent_motion(&self, now: Instant, timeout: Duration) -> bool {
        self.motion_last_seen
            .is_some_and(|seen| now < seen + timeout)
    }

    fn touch(&mut self, now: Instant) {
        self.last_updated = Some(now);
    }
}

// ---------------------------------------------------------------------------
// MachineContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct MachineContext {
    /// Evaluation timestamp, set by the machine before each handler call.
    pub now: Instant,

    /// Latest raw inputs.
    pub sensors: SensorState,

    /// System configuration (tunable thresholds).
    pub config: SystemConfig,

    /// Departure-verification deadline; pending only while PRESENT after an
    /// observed door open→close sequence.
    pub departure: Deadline,

    /// Door-held-open idle deadline; pending only while PRESENT in
    /// held-open mode, re-armed by every activity event.
    pub door_idle: Deadline,

    /// When the door last transitioned to open; `None` while closed.
    pub door_open_since: Option<Instant>,
}

impl MachineContext {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            now: Instant::from_ticks(0),
            sensors: SensorState::default(),
            config,
            departure: Deadline::idle(),
            door_idle: Deadline::idle(),
            door_open_since: None,
        }
    }

    pub fn motion_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.config.motion_timeout_seconds))
    }

    pub fn departure_grace(&self) -> Duration {
        Duration::from_secs(u64::from(self.config.departure_verify_seconds))
    }

    /// Both the held-open threshold and the idle window share this length.
    pub fn door_idle_window(&self) -> Duration {
        Duration::from_secs(u64::from(self.config.door_open_away_minutes) * 60)
    }

    /// Door open continuously past the held-open threshold.
    pub fn door_held_open(&self) -> bool {
        self.sensors.door_open
            && self
                .door_open_since
                .is_some_and(|since| self.now >= since + self.door_idle_window())
    }

    /// Workstation activity that counts as presence: an external monitor is
    /// attached and the last input is newer than the door's last change.
    /// Activity older than the door change is attributed to the walk toward
    /// the door, not to room occupancy.
    pub fn qualifying_activity(&self) -> bool {
        if !self.sensors.external_monitor {
            return false;
        }
        match (self.sensors.mac_last_active, self.sensors.door_last_changed) {
            (Some(active), Some(door)) => active > door,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Any presence signal under the current semantics. In held-open mode
    /// the door-closed requirement on motion is dropped.
    pub fn presence_signal(&self) -> bool {
        let motion = self.sensors.motion_detected
            || self.sensors.recent_motion(self.now, self.motion_timeout());
        if self.door_held_open() {
            motion || self.qualifying_activity()
        } else {
            (motion && !self.sensors.door_open) || self.qualifying_activity()
        }
    }

    /// Window or door open: climate systems must stand down.
    /// Independent of occupancy state.
    pub fn safety_interlock_active(&self) -> bool {
        self.sensors.window_open || self.sensors.door_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: u64) -> Instant {
        Instant::from_secs(secs)
    }

    fn ctx() -> MachineContext {
        MachineContext::new(SystemConfig::default())
    }

    #[test]
    fn mutations_stamp_last_updated() {
        let mut s = SensorState::default();
        assert!(s.last_updated.is_none());
        s.set_door(true, t(5));
        assert_eq!(s.last_updated, Some(t(5)));
        assert_eq!(s.door_last_changed, Some(t(5)));
        s.set_window(true, t(9));
        assert_eq!(s.last_updated, Some(t(9)));
    }

    #[test]
    fn air_quality_absent_fields_keep_previous_values() {
        let mut s = SensorState::default();
        s.set_air_quality(Some(900), Some(120), Some(21.0), t(10));
        s.set_air_quality(None, Some(150), None, t(20));
        assert_eq!(s.co2_ppm, Some(900));
        assert_eq!(s.tvoc_ppb, Some(150));
        assert_eq!(s.temp_c, Some(21.0));
    }

    #[test]
    fn motion_recency_window() {
        let mut s = SensorState::default();
        s.set_motion(true, t(100));
        s.set_motion(false, t(110));
        assert!(s.recent_motion(t(159), Duration::from_secs(60)));
        assert!(!s.recent_motion(t(161), Duration::from_secs(60)));
    }

    #[test]
    fn activity_before_door_change_does_not_qualify() {
        let mut c = ctx();
        c.now = t(200);
        c.sensors.set_workstation(t(100), true, t(100));
        c.sensors.set_door(false, t(150));
        assert!(!c.qualifying_activity());
        c.sensors.set_workstation(t(151), true, t(151));
        assert!(c.qualifying_activity());
    }

    #[test]
    fn activity_without_monitor_never_qualifies() {
        let mut c = ctx();
        c.now = t(200);
        c.sensors.set_workstation(t(199), false, t(199));
        assert!(!c.qualifying_activity());
    }

    #[test]
    fn motion_presence_requires_closed_door_in_standard_mode() {
        let mut c = ctx();
        c.now = t(100);
        c.sensors.set_door(true, t(90));
        c.door_open_since = Some(t(90));
        c.sensors.set_motion(true, t(99));
        assert!(!c.presence_signal(), "door open <5min: motion must not count");

        // Held-open mode drops the requirement.
        c.now = t(90 + 5 * 60);
        assert!(c.door_held_open());
        assert!(c.presence_signal());
    }

    #[test]
    fn interlock_tracks_either_opening() {
        let mut c = ctx();
        assert!(!c.safety_interlock_active());
        c.sensors.set_window(true, t(1));
        assert!(c.safety_interlock_active());
        c.sensors.set_window(false, t(2));
        c.sensors.set_door(true, t(3));
        assert!(c.safety_interlock_active());
    }
}
