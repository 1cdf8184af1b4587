//! Outbound types: audit events and status snapshots.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`AuditSink`](super::ports::AuditSink) and
//! [`StatusSink`](super::ports::StatusSink) ports. Adapters on the other
//! side decide what to do with them — write to a database, push over a
//! WebSocket, or just log.

use serde::Serialize;

use crate::control::{FanSpeed, HvacMode};
use crate::fsm::OccupancyState;

// ───────────────────────────────────────────────────────────────
// Audit events
// ───────────────────────────────────────────────────────────────

/// Which subsystem a climate action belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSystem {
    Erv,
    Hvac,
}

impl AuditSystem {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Erv => "erv",
            Self::Hvac => "hvac",
        }
    }
}

/// A committed decision change, recorded with a machine-readable reason
/// (e.g. `present_co2_critical_2010ppm`, `away_erv_suspend`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub system: AuditSystem,
    /// The commanded value ("quiet", "turbo", "heat", "off", ...).
    pub action: String,
    pub co2_ppm: Option<u16>,
    pub setpoint_c: Option<f32>,
    pub reason: String,
}

// ───────────────────────────────────────────────────────────────
// Status snapshot
// ───────────────────────────────────────────────────────────────

/// Manual-override flags as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverrideStatus {
    pub erv: bool,
    pub hvac: bool,
}

/// Latest air-quality block carried alongside the decision state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AirQualityStatus {
    pub co2_ppm: Option<u16>,
    pub tvoc_ppb: Option<u16>,
    pub temp_c: Option<f32>,
}

/// Raw-input block for debugging dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorStatus {
    pub door_open: bool,
    pub window_open: bool,
    pub motion_detected: bool,
    pub external_monitor: bool,
}

/// A point-in-time view of the whole controller, pushed to the broadcast
/// collaborator whenever it changes and queryable on demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub state: OccupancyState,
    pub is_present: bool,
    pub safety_interlock_active: bool,
    pub erv_should_run: bool,
    pub erv_speed: FanSpeed,
    pub hvac_mode: HvacMode,
    pub hvac_suspended: bool,
    pub manual_override: OverrideStatus,
    pub air_quality: AirQualityStatus,
    pub sensors: SensorStatus,
}
