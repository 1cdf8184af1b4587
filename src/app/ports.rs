//! Port traits — the boundary between the decision core and the outside
//! world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Vendor device clients (door/motion/window gateway, air-quality feed,
//! ventilation-unit driver, heat-pump cloud driver), persistence and the
//! presentation layer all live on the far side of these traits. The
//! [`AppService`](super::service::AppService) consumes them via generics,
//! so the core never touches a transport.
//!
//! Actuator calls are fire-and-forget from the core's perspective: errors
//! are logged, never retried in-loop; the next evaluation re-derives and
//! re-sends the desired state.

use crate::control::{FanSpeed, HvacMode, HvacStatus};
use crate::error::ActuatorError;
use crate::fsm::OccupancyState;

use super::events::{AuditEvent, StatusSnapshot};

// ───────────────────────────────────────────────────────────────
// ERV port (domain → ventilation unit)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the ventilation unit. `FanSpeed::Off` powers the
/// unit down.
pub trait ErvPort {
    fn set_speed(&mut self, speed: FanSpeed) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// HVAC port (domain ↔ heat pump)
// ───────────────────────────────────────────────────────────────

/// Port for the heat pump. `status` is consulted on every evaluation:
/// suspension decisions verify against the live device, not cached state.
pub trait HvacPort {
    fn set_mode(&mut self, mode: HvacMode, setpoint_c: Option<f32>) -> Result<(), ActuatorError>;

    fn status(&mut self) -> Result<HvacStatus, ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Audit sink (domain → persistence collaborator)
// ───────────────────────────────────────────────────────────────

/// Sensor kinds reported as raw device events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Door,
    Window,
    Motion,
}

impl DeviceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Door => "door",
            Self::Window => "window",
            Self::Motion => "motion",
        }
    }
}

/// The audit trail: every committed decision change, every sensor edge and
/// every occupancy change goes here. Implementations decide where it lands
/// (database, log, message bus).
pub trait AuditSink {
    /// A committed ERV or HVAC decision change with its reason.
    fn climate_action(&mut self, event: &AuditEvent);

    /// A raw door/window/motion edge.
    fn device_event(&mut self, kind: DeviceKind, state: &str);

    /// A committed occupancy transition.
    fn occupancy_change(&mut self, state: OccupancyState, co2_ppm: Option<u16>);
}

// ───────────────────────────────────────────────────────────────
// Status sink (domain → broadcast collaborator)
// ───────────────────────────────────────────────────────────────

/// Receives a fresh [`StatusSnapshot`] whenever the observable state
/// changes (WebSocket fan-out, dashboards, debugging).
pub trait StatusSink {
    fn publish(&mut self, snapshot: &StatusSnapshot);
}
