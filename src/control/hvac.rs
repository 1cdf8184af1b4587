//! HVAC coordination: ERV/HVAC mutual suspension, the pipe-freeze floor,
//! and heat-band comfort hysteresis.
//!
//! The coordinator consumes the occupancy state, the ERV running flag, the
//! current temperature and the *live* device status (never cached local
//! state) and returns at most one command per evaluation. Rules, first
//! match wins:
//!
//! 1. `temp < critical_temp_f` → force heat. Non-negotiable; beats the
//!    interlock and manual overrides.
//! 2. Safety interlock → pause active HVAC (remembered for restore). An
//!    override yields to the interlock, never the other way around.
//! 3. Manual HVAC override active → no automatic action at all.
//! 4. PRESENT: restore a suspended mode, clear the flag unconditionally.
//! 5. AWAY: suspend while the ERV runs above the comfort floor; restore
//!    when it stops, gated on occupancy hours.
//! 6. Heat-band hysteresis: pause heat at the upper bound, resume at the
//!    lower bound, with AWAY guards.

use log::info;

use crate::config::{OccupancyHours, SystemConfig};
use crate::fsm::OccupancyState;

use super::{HvacMode, HvacStatus};

/// A command the service should send through the HVAC port.
#[derive(Debug, Clone, PartialEq)]
pub struct HvacDecision {
    pub mode: HvacMode,
    pub setpoint_c: Option<f32>,
    pub reason: String,
}

/// Heat-band outcome: pause at the top of the band, resume at the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandAction {
    Pause,
    Resume,
}

pub fn celsius_to_fahrenheit(c: f32) -> f32 {
    c * 9.0 / 5.0 + 32.0
}

/// Decide if heat should be paused/resumed for the temperature comfort
/// band. Pure; the coordinator owns the `band_paused` flag.
#[allow(clippy::too_many_arguments)]
pub fn heat_band_action(
    temp_f: Option<f32>,
    hvac_mode: HvacMode,
    temp_band_paused: bool,
    state: OccupancyState,
    erv_running: bool,
    min_temp_f: f32,
    within_occupancy_hours: bool,
    heat_off_temp_f: f32,
    heat_on_temp_f: f32,
) -> Option<BandAction> {
    let temp_f = temp_f?;

    if hvac_mode == HvacMode::Heat && temp_f >= heat_off_temp_f {
        return Some(BandAction::Pause);
    }

    if !(temp_band_paused && hvac_mode == HvacMode::Off && temp_f <= heat_on_temp_f) {
        return None;
    }

    if state == OccupancyState::Away {
        // Preserve the AWAY coordination rules.
        if erv_running && temp_f > min_temp_f {
            return None;
        }
        if !within_occupancy_hours {
            return None;
        }
    }

    Some(BandAction::Resume)
}

/// Stateful HVAC decision engine.
pub struct HvacCoordinator {
    config: SystemConfig,
    occupancy_hours: OccupancyHours,

    /// Set when this coordinator turned the HVAC off (ERV suspension or
    /// interlock pause); restore only ever applies to our own suspensions.
    suspended: bool,
    /// Mode/setpoint captured from live status at suspension time.
    remembered: Option<(HvacMode, Option<f32>)>,
    /// Heat-band pause flag, independent of `suspended`.
    band_paused: bool,
}

impl HvacCoordinator {
    pub fn new(config: SystemConfig) -> Self {
        let occupancy_hours = config.occupancy_hours();
        Self {
            config,
            occupancy_hours,
            suspended: false,
            remembered: None,
            band_paused: false,
        }
    }

    /// True while the HVAC is off because this coordinator turned it off.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Decide the next HVAC command, if any. `live` is the device status
    /// read this evaluation; `None` (status fetch failed) skips every rule
    /// that must verify against the real device.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &mut self,
        state: OccupancyState,
        erv_running: bool,
        temp_c: Option<f32>,
        live: Option<&HvacStatus>,
        interlock: bool,
        current_hour: Option<u8>,
        manual_override: bool,
    ) -> Option<HvacDecision> {
        let temp_f = temp_c.map(celsius_to_fahrenheit);

        // 1. Pipe-freeze floor.
        if let Some(t) = temp_f {
            if t < self.config.critical_temp_f {
                if live.is_some_and(|s| s.mode == HvacMode::Heat) {
                    return None;
                }
                info!("temperature {t:.1}F below critical floor, forcing heat");
                return Some(HvacDecision {
                    mode: HvacMode::Heat,
                    setpoint_c: Some(self.config.hvac_setpoint_c),
                    reason: format!("critical_temp_{t:.1}F"),
                });
            }
        }

        // 2. Interlock: no heating an open room. Re-asserted for as long as
        // the live status still shows the device running, and checked ahead
        // of the override; a human request never outranks the interlock.
        if interlock {
            if let Some(s) = live {
                if s.mode.is_active() {
                    if !self.suspended {
                        self.remembered = Some((s.mode, s.setpoint_c));
                        self.suspended = true;
                    }
                    return Some(HvacDecision {
                        mode: HvacMode::Off,
                        setpoint_c: None,
                        reason: "safety_interlock_hvac_pause".to_string(),
                    });
                }
            }
            return None;
        }

        // 3. A human has the wheel.
        if manual_override {
            return None;
        }

        let within_hours = current_hour.map_or(true, |h| self.occupancy_hours.contains(h));

        match state {
            OccupancyState::Present => {
                if self.suspended {
                    self.suspended = false;
                    if let Some((mode, setpoint_c)) = self.remembered.take() {
                        if mode.is_active() {
                            return Some(HvacDecision {
                                mode,
                                setpoint_c,
                                reason: "present_restore".to_string(),
                            });
                        }
                    }
                }
                self.band(state, erv_running, temp_f, live, within_hours)
            }
            OccupancyState::Away => {
                if erv_running {
                    if let (Some(t), Some(s)) = (temp_f, live) {
                        if t > self.config.min_temp_f && s.mode.is_active() {
                            if !self.suspended {
                                self.remembered = Some((s.mode, s.setpoint_c));
                                self.suspended = true;
                            }
                            return Some(HvacDecision {
                                mode: HvacMode::Off,
                                setpoint_c: None,
                                reason: "away_erv_suspend".to_string(),
                            });
                        }
                    }
                } else if self.suspended && within_hours {
                    if let Some((mode, setpoint_c)) = self.remembered {
                        if mode.is_active() {
                            self.suspended = false;
                            self.remembered = None;
                            return Some(HvacDecision {
                                mode,
                                setpoint_c,
                                reason: "away_resume_erv_stopped".to_string(),
                            });
                        }
                    }
                }
                self.band(state, erv_running, temp_f, live, within_hours)
            }
        }
    }

    fn band(
        &mut self,
        state: OccupancyState,
        erv_running: bool,
        temp_f: Option<f32>,
        live: Option<&HvacStatus>,
        within_hours: bool,
    ) -> Option<HvacDecision> {
        let live = live?;
        match heat_band_action(
            temp_f,
            live.mode,
            self.band_paused,
            state,
            erv_running,
            self.config.min_temp_f,
            within_hours,
            self.config.heat_off_temp_f,
            self.config.heat_on_temp_f,
        )? {
            BandAction::Pause => {
                self.band_paused = true;
                let t = temp_f.unwrap_or_default();
                Some(HvacDecision {
                    mode: HvacMode::Off,
                    setpoint_c: None,
                    reason: format!("heat_band_pause_{t:.1}F"),
                })
            }
            BandAction::Resume => {
                self.band_paused = false;
                let t = temp_f.unwrap_or_default();
                Some(HvacDecision {
                    mode: HvacMode::Heat,
                    setpoint_c: Some(self.config.hvac_setpoint_c),
                    reason: format!("heat_band_resume_{t:.1}F"),
                })
            }
        }
    }
}
