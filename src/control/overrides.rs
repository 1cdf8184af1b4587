//! Manual override tracking for the ERV and HVAC.
//!
//! An override, once set, takes absolute priority over automation (never
//! over the safety interlock) until its timeout elapses or an occupancy
//! transition occurs; either clears it unconditionally. Expiry is checked
//! on every evaluation, so an override stops applying within one control
//! tick of its deadline.

use embassy_time::{Duration, Instant};
use log::info;

use super::{FanSpeed, HvacMode};

/// A pinned ERV speed requested by a human.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErvOverride {
    pub speed: FanSpeed,
    pub set_at: Instant,
}

/// A pinned HVAC mode/setpoint requested by a human.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HvacOverride {
    pub mode: HvacMode,
    pub setpoint_c: Option<f32>,
    pub set_at: Instant,
}

/// Which overrides expired during a `check_expiry` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expired {
    pub erv: bool,
    pub hvac: bool,
}

/// Per-actuator override state with a shared timeout.
#[derive(Debug)]
pub struct ManualOverrideTracker {
    timeout: Duration,
    erv: Option<ErvOverride>,
    hvac: Option<HvacOverride>,
}

impl ManualOverrideTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            erv: None,
            hvac: None,
        }
    }

    /// Pin the ERV to `speed`. Replaces any prior ERV override and restarts
    /// its expiry clock.
    pub fn set_erv(&mut self, speed: FanSpeed, now: Instant) {
        info!("manual ERV override: {}", speed.as_str());
        self.erv = Some(ErvOverride { speed, set_at: now });
    }

    /// Pin the HVAC to `mode`/`setpoint_c`.
    pub fn set_hvac(&mut self, mode: HvacMode, setpoint_c: Option<f32>, now: Instant) {
        info!("manual HVAC override: {}", mode.as_str());
        self.hvac = Some(HvacOverride {
            mode,
            setpoint_c,
            set_at: now,
        });
    }

    /// Drop overrides whose lifetime has elapsed. Returns which ones
    /// expired on this pass so the caller can log/audit the reversion.
    pub fn check_expiry(&mut self, now: Instant) -> Expired {
        let mut expired = Expired::default();
        if let Some(ov) = self.erv {
            if now >= ov.set_at + self.timeout {
                info!("manual ERV override expired, automation resumes");
                self.erv = None;
                expired.erv = true;
            }
        }
        if let Some(ov) = self.hvac {
            if now >= ov.set_at + self.timeout {
                info!("manual HVAC override expired, automation resumes");
                self.hvac = None;
                expired.hvac = true;
            }
        }
        expired
    }

    /// Clear both overrides unconditionally (done on every occupancy
    /// transition). Returns whether anything was actually cleared.
    pub fn clear_all(&mut self) -> bool {
        let had_any = self.erv.is_some() || self.hvac.is_some();
        if had_any {
            info!("occupancy changed, clearing manual overrides");
        }
        self.erv = None;
        self.hvac = None;
        had_any
    }

    pub fn erv(&self) -> Option<&ErvOverride> {
        self.erv.as_ref()
    }

    pub fn hvac(&self) -> Option<&HvacOverride> {
        self.hvac.as_ref()
    }
}
