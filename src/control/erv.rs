//! ERV speed coordination.
//!
//! `ClimateCoordinator` turns the occupancy state, the raw sensor snapshot
//! and the two rate windows into a single [`FanSpeed`] decision per
//! evaluation. Priority order, each rule short-circuiting the rest:
//!
//! 1. Safety interlock (window/door open) → Off.
//! 2. Unexpired manual override → requested speed verbatim.
//! 3. PRESENT: CO2 hysteresis band, tVOC deliberately ignored.
//! 4. AWAY: initial turbo purge, then rate-of-change adaptive stepping for
//!    CO2 and tVOC independently, combined by taking the more aggressive
//!    speed. Off requires a plateau.
//! 5. Stale-air flush while AWAY raises the floor on a schedule; it never
//!    downgrades a speed picked by rule 4.
//!
//! Every decision carries a machine-readable reason string for the audit
//! trail. The coordinator never talks to a port: it returns values and the
//! service applies them.

use embassy_time::{Duration, Instant};
use log::{debug, info};

use crate::config::SystemConfig;
use crate::fsm::context::SensorState;
use crate::fsm::{OccupancyState, Transition};

use super::overrides::ErvOverride;
use super::rate::RateWindow;
use super::FanSpeed;

/// One evaluation's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErvDecision {
    pub speed: FanSpeed,
    pub reason: String,
}

impl ErvDecision {
    fn new(speed: FanSpeed, reason: impl Into<String>) -> Self {
        Self {
            speed,
            reason: reason.into(),
        }
    }
}

/// Stateful ERV decision engine. Evaluated after every sensor update and
/// control tick; always re-derives the desired speed from current inputs.
pub struct ClimateCoordinator {
    config: SystemConfig,

    co2_window: RateWindow,
    tvoc_window: RateWindow,

    /// PRESENT-mode hysteresis latch: set at critical, held through the
    /// dead-band, dropped below it.
    co2_latched: bool,
    /// AWAY-mode tVOC latch: set above the trigger, dropped at the target.
    tvoc_away_active: bool,

    /// When the current AWAY period began; drives the initial turbo purge.
    away_entered_at: Option<Instant>,

    /// Continuous closed-room tracking for the stale-air flush.
    room_closed_since: Option<Instant>,
    flush_active_until: Option<Instant>,
    flush_next_due: Option<Instant>,

    /// Speed decided by the previous evaluation (hysteresis carry-over).
    last_speed: FanSpeed,
}

impl ClimateCoordinator {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            config,
            co2_window: RateWindow::new(),
            tvoc_window: RateWindow::new(),
            co2_latched: false,
            tvoc_away_active: false,
            away_entered_at: None,
            room_closed_since: None,
            flush_active_until: None,
            flush_next_due: None,
            last_speed: FanSpeed::Off,
        }
    }

    /// Feed a new air-quality reading into the rate windows. The sensor
    /// snapshot stays authoritative for current values; the windows only
    /// serve the rate/plateau math.
    pub fn record_air_quality(&mut self, co2_ppm: Option<u16>, tvoc_ppb: Option<u16>, now: Instant) {
        if let Some(co2) = co2_ppm {
            self.co2_window.push(now, f32::from(co2));
        }
        if let Some(tvoc) = tvoc_ppb {
            self.tvoc_window.push(now, f32::from(tvoc));
        }
    }

    /// A committed occupancy transition. AWAY entry clears both windows and
    /// opens the forced turbo purge; PRESENT entry preserves the hysteresis
    /// band when the fan is already running inside it.
    pub fn note_transition(&mut self, transition: Transition, sensors: &SensorState, now: Instant) {
        match transition.to {
            OccupancyState::Away => {
                self.co2_window.clear();
                self.tvoc_window.clear();
                self.tvoc_away_active = false;
                self.away_entered_at = Some(now);
            }
            OccupancyState::Present => {
                self.away_entered_at = None;
                let floor = self.hysteresis_floor();
                self.co2_latched = self.last_speed != FanSpeed::Off
                    && sensors.co2_ppm.is_some_and(|c| c >= floor);
            }
        }
    }

    /// Door or window edge. Any opening resets the whole flush schedule;
    /// accumulation restarts when the room is closed again.
    pub fn note_room_event(&mut self, any_open: bool, now: Instant) {
        if any_open {
            if self.room_closed_since.is_some() {
                debug!("room opened, stale-flush schedule reset");
            }
            self.room_closed_since = None;
            self.flush_active_until = None;
            self.flush_next_due = None;
        } else if self.room_closed_since.is_none() {
            self.room_closed_since = Some(now);
        }
    }

    /// Decide the ERV speed for the current inputs.
    pub fn evaluate(
        &mut self,
        state: OccupancyState,
        sensors: &SensorState,
        erv_override: Option<&ErvOverride>,
        now: Instant,
    ) -> ErvDecision {
        let interlock = sensors.window_open || sensors.door_open;

        // Closed-room accumulation starts at the first closed evaluation
        // (covers process start, where no door edge is ever seen).
        if !interlock && self.room_closed_since.is_none() {
            self.room_closed_since = Some(now);
        }

        let decision = if interlock {
            ErvDecision::new(FanSpeed::Off, "safety_interlock")
        } else if let Some(ov) = erv_override {
            ErvDecision::new(ov.speed, format!("manual_override_{}", ov.speed.as_str()))
        } else {
            match state {
                OccupancyState::Present => self.decide_present(sensors),
                OccupancyState::Away => self.decide_away(sensors, now),
            }
        };

        self.last_speed = decision.speed;
        decision
    }

    // ── PRESENT ──────────────────────────────────────────────

    /// Quiet operation only, gated on the CO2 hysteresis band. tVOC is
    /// ignored while someone is in: a positive-pressure flush is too loud
    /// for an occupied office.
    fn decide_present(&mut self, sensors: &SensorState) -> ErvDecision {
        let Some(co2) = sensors.co2_ppm else {
            self.co2_latched = false;
            return ErvDecision::new(FanSpeed::Off, "present_no_co2_data");
        };

        if co2 >= self.config.co2_critical_ppm {
            self.co2_latched = true;
            ErvDecision::new(FanSpeed::Quiet, format!("present_co2_critical_{co2}ppm"))
        } else if self.co2_latched && co2 >= self.hysteresis_floor() {
            ErvDecision::new(FanSpeed::Quiet, format!("present_co2_hysteresis_{co2}ppm"))
        } else {
            self.co2_latched = false;
            ErvDecision::new(FanSpeed::Off, "present_air_ok")
        }
    }

    // ── AWAY ─────────────────────────────────────────────────

    fn decide_away(&mut self, sensors: &SensorState, now: Instant) -> ErvDecision {
        let co2 = sensors.co2_ppm;
        let tvoc = sensors.tvoc_ppb;
        let co2_needs_refresh = co2.is_some_and(|c| c > self.config.co2_refresh_target_ppm);

        // tVOC trigger/target latch.
        if let Some(v) = tvoc {
            if v > self.config.tvoc_away_trigger_ppb && !self.tvoc_away_active {
                info!("tVOC {v}ppb above trigger, away ventilation engaged");
                self.tvoc_away_active = true;
            } else if v <= self.config.tvoc_away_target_ppb && self.tvoc_away_active {
                info!("tVOC {v}ppb reached target, away ventilation released");
                self.tvoc_away_active = false;
            }
        }

        // Initial purge: turbo for the whole window after AWAY entry while
        // CO2 is above the refresh target, regardless of rate.
        if let (Some(entered), Some(c)) = (self.away_entered_at, co2) {
            let window = Duration::from_secs(u64::from(self.config.co2_turbo_duration_minutes) * 60);
            if co2_needs_refresh && now < entered + window {
                let decision =
                    ErvDecision::new(FanSpeed::Turbo, format!("away_initial_purge_co2_{c}ppm"));
                return self.apply_stale_flush(decision, now);
            }
        }

        let co2_rec = self.co2_recommendation(co2, co2_needs_refresh);
        let tvoc_rec = self.tvoc_recommendation(tvoc);
        let decision = if tvoc_rec.speed > co2_rec.speed {
            tvoc_rec
        } else {
            co2_rec
        };

        self.apply_stale_flush(decision, now)
    }

    /// CO2 arm of the adaptive logic. With no usable rate yet, fall back to
    /// the non-adaptive behavior: run full until the target is reached.
    fn co2_recommendation(&self, co2: Option<u16>, needs_refresh: bool) -> ErvDecision {
        let Some(co2) = co2 else {
            return ErvDecision::new(FanSpeed::Off, "away_no_co2_data");
        };

        let Some(rate) = self.co2_window.rate_per_min() else {
            return if needs_refresh {
                ErvDecision::new(FanSpeed::Turbo, format!("away_refresh_no_rate_co2_{co2}ppm"))
            } else {
                ErvDecision::new(FanSpeed::Off, format!("away_co2_target_reached_{co2}ppm"))
            };
        };

        let magnitude = rate.abs();
        let cfg = &self.config;
        if magnitude > cfg.co2_rate_turbo_threshold {
            ErvDecision::new(FanSpeed::Turbo, format!("away_adaptive_turbo_co2_{co2}ppm"))
        } else if magnitude > cfg.co2_rate_medium_threshold {
            ErvDecision::new(FanSpeed::Medium, format!("away_adaptive_medium_co2_{co2}ppm"))
        } else if magnitude > cfg.co2_rate_quiet_threshold {
            ErvDecision::new(FanSpeed::Quiet, format!("away_adaptive_quiet_co2_{co2}ppm"))
        } else if self.co2_window.plateau(
            cfg.co2_plateau_rate_threshold,
            Some(f32::from(cfg.co2_plateau_ceiling_ppm)),
        ) {
            if needs_refresh {
                ErvDecision::new(FanSpeed::Quiet, format!("away_refresh_quiet_co2_{co2}ppm"))
            } else {
                ErvDecision::new(FanSpeed::Off, format!("away_plateau_co2_{co2}ppm"))
            }
        } else {
            // Rate is low but equilibrium is not established yet.
            ErvDecision::new(FanSpeed::Quiet, format!("away_settling_quiet_co2_{co2}ppm"))
        }
    }

    /// tVOC arm: only contributes while the away latch is engaged.
    fn tvoc_recommendation(&self, tvoc: Option<u16>) -> ErvDecision {
        if !self.tvoc_away_active {
            return ErvDecision::new(FanSpeed::Off, "away_tvoc_inactive");
        }
        let Some(tvoc) = tvoc else {
            return ErvDecision::new(FanSpeed::Off, "away_no_tvoc_data");
        };

        let Some(rate) = self.tvoc_window.rate_per_min() else {
            // Non-adaptive fallback: positive-pressure flush.
            return ErvDecision::new(FanSpeed::Medium, format!("away_tvoc_no_rate_{tvoc}ppb"));
        };

        let magnitude = rate.abs();
        let cfg = &self.config;
        if magnitude > cfg.tvoc_rate_turbo_threshold {
            ErvDecision::new(FanSpeed::Turbo, format!("away_tvoc_turbo_{tvoc}ppb"))
        } else if magnitude > cfg.tvoc_rate_medium_threshold {
            ErvDecision::new(FanSpeed::Medium, format!("away_tvoc_medium_{tvoc}ppb"))
        } else if magnitude > cfg.tvoc_rate_quiet_threshold {
            ErvDecision::new(FanSpeed::Quiet, format!("away_tvoc_quiet_{tvoc}ppb"))
        } else if self.tvoc_window.plateau(
            cfg.tvoc_plateau_rate_threshold,
            Some(f32::from(cfg.tvoc_away_target_ppb)),
        ) {
            ErvDecision::new(FanSpeed::Off, format!("away_tvoc_plateau_{tvoc}ppb"))
        } else {
            ErvDecision::new(FanSpeed::Quiet, format!("away_tvoc_settling_{tvoc}ppb"))
        }
    }

    // ── Stale-air flush ──────────────────────────────────────

    /// Periodic flush during prolonged AWAY, independent of air quality.
    /// Only ever raises the floor of an adaptive decision.
    fn apply_stale_flush(&mut self, decision: ErvDecision, now: Instant) -> ErvDecision {
        if !self.config.away_stale_flush_enabled {
            return decision;
        }

        if let Some(until) = self.flush_active_until {
            if now >= until {
                self.flush_active_until = None;
            }
        }

        let interval =
            Duration::from_secs(u64::from(self.config.away_stale_flush_interval_hours) * 3600);
        let closed_long_enough = self
            .room_closed_since
            .is_some_and(|since| now >= since + interval);

        if self.flush_active_until.is_none() {
            let due = self.flush_next_due.map_or(true, |d| now >= d);
            if due && closed_long_enough {
                info!(
                    "stale-air flush: {}min at {}",
                    self.config.away_stale_flush_duration_minutes,
                    self.config.away_stale_flush_speed.as_str()
                );
                self.flush_active_until = Some(
                    now + Duration::from_secs(
                        u64::from(self.config.away_stale_flush_duration_minutes) * 60,
                    ),
                );
                self.flush_next_due = Some(now + interval);
            }
        }

        if self.flush_active_until.is_some() && self.config.away_stale_flush_speed > decision.speed
        {
            return ErvDecision::new(self.config.away_stale_flush_speed, "stale_flush_due");
        }
        decision
    }

    // ── Helpers ──────────────────────────────────────────────

    fn hysteresis_floor(&self) -> u16 {
        self.config
            .co2_critical_ppm
            .saturating_sub(self.config.co2_hysteresis_ppm)
    }

    #[cfg(test)]
    fn force_away_entry(&mut self, at: Instant) {
        self.away_entered_at = Some(at);
    }

    #[cfg(test)]
    fn force_flush_schedule(&mut self, closed_since: Option<Instant>, next_due: Option<Instant>) {
        self.room_closed_since = closed_since;
        self.flush_next_due = next_due;
    }
}
