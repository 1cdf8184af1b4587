//! System configuration parameters
//!
//! All tunable parameters for the climate controller. Loaded from a JSON
//! file by the binary; invalid values are fatal at startup. The one
//! documented exception is the occupancy-hours string, which falls back to
//! 7AM-10PM when malformed.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::control::FanSpeed;
use crate::error::ConfigError;

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Occupancy ---
    /// Motion recency window (seconds) for the presence signal
    pub motion_timeout_seconds: u32,
    /// Departure-verification grace period after a door close (seconds)
    pub departure_verify_seconds: u32,
    /// Continuous door-open time before held-open semantics engage (minutes)
    pub door_open_away_minutes: u32,

    // --- CO2 thresholds ---
    /// CO2 (ppm) above which the ERV runs even while present
    pub co2_critical_ppm: u16,
    /// Dead-band below critical before the present-mode ERV turns off again
    pub co2_hysteresis_ppm: u16,
    /// CO2 (ppm) target for away-mode refresh
    pub co2_refresh_target_ppm: u16,

    // --- CO2 adaptive speed (away) ---
    /// Forced-turbo purge window on away entry (minutes)
    pub co2_turbo_duration_minutes: u32,
    /// CO2 rate magnitude (ppm/min) above which turbo is kept
    pub co2_rate_turbo_threshold: f32,
    /// CO2 rate magnitude (ppm/min) above which medium is kept
    pub co2_rate_medium_threshold: f32,
    /// CO2 rate magnitude (ppm/min) above which quiet is kept
    pub co2_rate_quiet_threshold: f32,
    /// Pairwise rate magnitude (ppm/min) below which CO2 counts as plateaued
    pub co2_plateau_rate_threshold: f32,
    /// CO2 (ppm) ceiling for plateau shutdown
    pub co2_plateau_ceiling_ppm: u16,

    // --- tVOC (away only; ignored while present) ---
    /// tVOC (ppb) that starts away ventilation
    pub tvoc_away_trigger_ppb: u16,
    /// tVOC (ppb) target that ends away ventilation
    pub tvoc_away_target_ppb: u16,
    /// tVOC rate magnitude (ppb/min) above which turbo is kept
    pub tvoc_rate_turbo_threshold: f32,
    /// tVOC rate magnitude (ppb/min) above which medium is kept
    pub tvoc_rate_medium_threshold: f32,
    /// tVOC rate magnitude (ppb/min) above which quiet is kept
    pub tvoc_rate_quiet_threshold: f32,
    /// Pairwise rate magnitude (ppb/min) below which tVOC counts as plateaued
    pub tvoc_plateau_rate_threshold: f32,

    // --- Stale-air flush (away) ---
    pub away_stale_flush_enabled: bool,
    /// Continuous closed-room time between flushes (hours)
    pub away_stale_flush_interval_hours: u32,
    /// Flush window length (minutes)
    pub away_stale_flush_duration_minutes: u32,
    /// Flush speed floor
    pub away_stale_flush_speed: FanSpeed,

    // --- Manual overrides ---
    /// Override lifetime (minutes) before automation resumes
    pub manual_override_timeout_minutes: u32,

    // --- HVAC ---
    /// Comfort floor (F) below which ERV-driven suspension is disallowed
    pub min_temp_f: f32,
    /// Pipe-freeze floor (F); below this, heat is forced unconditionally
    pub critical_temp_f: f32,
    /// Heat-band upper bound (F): pause heat at or above
    pub heat_off_temp_f: f32,
    /// Heat-band lower bound (F): resume heat at or below
    pub heat_on_temp_f: f32,
    /// Setpoint (C) used for forced and band-resumed heat
    pub hvac_setpoint_c: f32,
    /// Occupancy hours as "H:MM-H:MM" (24h); malformed falls back to 7-22
    pub occupancy_hours: String,

    // --- Timing ---
    /// Control loop tick interval (seconds)
    pub control_tick_seconds: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Occupancy
            motion_timeout_seconds: 60,
            departure_verify_seconds: 10,
            door_open_away_minutes: 5,

            // CO2 thresholds
            co2_critical_ppm: 2000,
            co2_hysteresis_ppm: 200,
            co2_refresh_target_ppm: 500,

            // CO2 adaptive speed
            co2_turbo_duration_minutes: 30,
            co2_rate_turbo_threshold: 8.0,
            co2_rate_medium_threshold: 4.0,
            co2_rate_quiet_threshold: 1.0,
            co2_plateau_rate_threshold: 0.5,
            co2_plateau_ceiling_ppm: 600,

            // tVOC
            tvoc_away_trigger_ppb: 400,
            tvoc_away_target_ppb: 200,
            tvoc_rate_turbo_threshold: 40.0,
            tvoc_rate_medium_threshold: 20.0,
            tvoc_rate_quiet_threshold: 5.0,
            tvoc_plateau_rate_threshold: 2.0,

            // Stale-air flush
            away_stale_flush_enabled: true,
            away_stale_flush_interval_hours: 8,
            away_stale_flush_duration_minutes: 30,
            away_stale_flush_speed: FanSpeed::Medium,

            // Manual overrides
            manual_override_timeout_minutes: 30,

            // HVAC
            min_temp_f: 68.0,
            critical_temp_f: 50.0,
            heat_off_temp_f: 75.0,
            heat_on_temp_f: 71.0,
            hvac_setpoint_c: 22.0,
            occupancy_hours: "7:00-22:00".to_string(),

            // Timing
            control_tick_seconds: 1,
        }
    }
}

impl SystemConfig {
    /// Range-check every field. Called once at startup; any failure is
    /// fatal. Invalid values are rejected, never silently clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.co2_hysteresis_ppm >= self.co2_critical_ppm {
            return Err(ConfigError::Validation(
                "co2_hysteresis_ppm must be below co2_critical_ppm",
            ));
        }
        if self.co2_refresh_target_ppm >= self.co2_critical_ppm {
            return Err(ConfigError::Validation(
                "co2_refresh_target_ppm must be below co2_critical_ppm",
            ));
        }
        if self.co2_rate_quiet_threshold <= 0.0
            || self.co2_rate_medium_threshold <= self.co2_rate_quiet_threshold
            || self.co2_rate_turbo_threshold <= self.co2_rate_medium_threshold
        {
            return Err(ConfigError::Validation(
                "co2 rate thresholds must be positive and strictly increasing",
            ));
        }
        if self.co2_plateau_rate_threshold <= 0.0
            || self.co2_plateau_rate_threshold >= self.co2_rate_quiet_threshold
        {
            return Err(ConfigError::Validation(
                "co2_plateau_rate_threshold must sit below the quiet rate threshold",
            ));
        }
        if self.tvoc_away_target_ppb >= self.tvoc_away_trigger_ppb {
            return Err(ConfigError::Validation(
                "tvoc_away_target_ppb must be below tvoc_away_trigger_ppb",
            ));
        }
        if self.tvoc_rate_quiet_threshold <= 0.0
            || self.tvoc_rate_medium_threshold <= self.tvoc_rate_quiet_threshold
            || self.tvoc_rate_turbo_threshold <= self.tvoc_rate_medium_threshold
        {
            return Err(ConfigError::Validation(
                "tvoc rate thresholds must be positive and strictly increasing",
            ));
        }
        if self.heat_on_temp_f >= self.heat_off_temp_f {
            return Err(ConfigError::Validation(
                "heat_on_temp_f must be below heat_off_temp_f",
            ));
        }
        if self.critical_temp_f >= self.min_temp_f {
            return Err(ConfigError::Validation(
                "critical_temp_f must be below min_temp_f",
            ));
        }
        if self.departure_verify_seconds == 0 {
            return Err(ConfigError::Validation(
                "departure_verify_seconds must be non-zero",
            ));
        }
        if self.door_open_away_minutes == 0 {
            return Err(ConfigError::Validation(
                "door_open_away_minutes must be non-zero",
            ));
        }
        if self.manual_override_timeout_minutes == 0 {
            return Err(ConfigError::Validation(
                "manual_override_timeout_minutes must be non-zero",
            ));
        }
        if self.control_tick_seconds == 0 {
            return Err(ConfigError::Validation(
                "control_tick_seconds must be non-zero",
            ));
        }
        Ok(())
    }

    /// Parsed occupancy hours, applying the lenient fallback.
    pub fn occupancy_hours(&self) -> OccupancyHours {
        OccupancyHours::parse_lenient(&self.occupancy_hours)
    }
}

// ---------------------------------------------------------------------------
// Occupancy hours
// ---------------------------------------------------------------------------

/// Hour-of-day range during which AWAY HVAC resumption is allowed.
/// Supports overnight wraparound (e.g. 22-6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyHours {
    /// Start hour (0-23 inclusive).
    pub start_hour: u8,
    /// End hour (0-23 inclusive, exclusive bound).
    pub end_hour: u8,
}

/// Fallback applied when the configured string cannot be parsed.
const FALLBACK_HOURS: OccupancyHours = OccupancyHours {
    start_hour: 7,
    end_hour: 22,
};

impl OccupancyHours {
    /// Parse "H:MM-H:MM" (minutes accepted but ignored; the gate is
    /// hour-granular). Malformed input falls back to 7AM-10PM with a
    /// warning — a deliberate, tested policy rather than a startup failure,
    /// since a wrong resume window is recoverable and a dead controller is
    /// not.
    pub fn parse_lenient(s: &str) -> Self {
        match Self::parse(s) {
            Some(hours) => hours,
            None => {
                warn!("occupancy_hours '{s}' is malformed, falling back to 7:00-22:00");
                FALLBACK_HOURS
            }
        }
    }

    fn parse(s: &str) -> Option<Self> {
        let (start, end) = s.split_once('-')?;
        let start_hour = Self::parse_hour(start.trim())?;
        let end_hour = Self::parse_hour(end.trim())?;
        if start_hour == end_hour {
            return None;
        }
        Some(Self {
            start_hour,
            end_hour,
        })
    }

    fn parse_hour(s: &str) -> Option<u8> {
        let hour_part = s.split_once(':').map_or(s, |(h, _)| h);
        let hour: u8 = hour_part.parse().ok()?;
        (hour <= 23).then_some(hour)
    }

    /// Check whether the given hour falls within occupancy hours.
    pub fn contains(&self, hour: u8) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            // Overnight range — wraps around midnight.
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = SystemConfig::default();
        assert!(c.validate().is_ok());
        assert!(c.co2_critical_ppm > c.co2_refresh_target_ppm);
        assert!(c.co2_hysteresis_ppm < c.co2_critical_ppm);
        assert!(c.heat_on_temp_f < c.heat_off_temp_f);
        assert!(c.critical_temp_f < c.min_temp_f);
        assert!(c.control_tick_seconds > 0);
    }

    #[test]
    fn serde_roundtrip() {
        let c = SystemConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.co2_critical_ppm, c2.co2_critical_ppm);
        assert_eq!(c.away_stale_flush_speed, c2.away_stale_flush_speed);
        assert!((c.min_temp_f - c2.min_temp_f).abs() < 0.001);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let c: SystemConfig = serde_json::from_str(r#"{"co2_critical_ppm": 1500}"#).unwrap();
        assert_eq!(c.co2_critical_ppm, 1500);
        assert_eq!(c.co2_refresh_target_ppm, 500);
    }

    #[test]
    fn hysteresis_band_below_critical_invariant() {
        let c = SystemConfig {
            co2_hysteresis_ppm: 2000,
            ..Default::default()
        };
        assert!(
            c.validate().is_err(),
            "hysteresis band at or above critical must be rejected"
        );
    }

    #[test]
    fn inverted_rate_thresholds_rejected() {
        let c = SystemConfig {
            co2_rate_medium_threshold: 10.0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn inverted_heat_band_rejected() {
        let c = SystemConfig {
            heat_on_temp_f: 80.0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn occupancy_hours_parse() {
        let h = OccupancyHours::parse_lenient("7:00-22:00");
        assert_eq!(h.start_hour, 7);
        assert_eq!(h.end_hour, 22);
        assert!(h.contains(7));
        assert!(h.contains(21));
        assert!(!h.contains(22));
        assert!(!h.contains(3));
    }

    #[test]
    fn occupancy_hours_bare_hours() {
        let h = OccupancyHours::parse_lenient("8-18");
        assert_eq!(h.start_hour, 8);
        assert_eq!(h.end_hour, 18);
    }

    #[test]
    fn occupancy_hours_overnight_wraparound() {
        let h = OccupancyHours::parse_lenient("22:00-6:00");
        assert!(h.contains(23));
        assert!(h.contains(2));
        assert!(!h.contains(12));
    }

    #[test]
    fn malformed_occupancy_hours_fall_back() {
        // Documented policy: malformed strings fall back to 7AM-10PM.
        for bad in ["", "banana", "25:00-26:00", "9", "9:00-9:00"] {
            let h = OccupancyHours::parse_lenient(bad);
            assert_eq!(h, FALLBACK_HOURS, "input {bad:?} should fall back");
        }
    }
}
