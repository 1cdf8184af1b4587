//! Log-based port adapters.
//!
//! Implement every port by writing structured lines to the logger. Used by
//! the binary's dry-run mode and handy in development: the control loop
//! runs end to end with no devices attached. The simulated HVAC tracks the
//! mode it was last commanded to, so the suspend/restore logic exercises
//! its live-status verification path unchanged.

use log::info;

use crate::app::events::{AuditEvent, StatusSnapshot};
use crate::app::ports::{AuditSink, DeviceKind, ErvPort, HvacPort, StatusSink};
use crate::control::{FanSpeed, HvacMode, HvacStatus};
use crate::error::ActuatorError;
use crate::fsm::OccupancyState;

/// ERV adapter that logs every command and always succeeds.
pub struct LogErv;

impl ErvPort for LogErv {
    fn set_speed(&mut self, speed: FanSpeed) -> Result<(), ActuatorError> {
        info!("ERV   | set_speed={}", speed.as_str());
        Ok(())
    }
}

/// HVAC adapter that logs commands and reports them back as live status.
pub struct LogHvac {
    status: HvacStatus,
}

impl LogHvac {
    pub fn new(mode: HvacMode, setpoint_c: Option<f32>) -> Self {
        Self {
            status: HvacStatus { mode, setpoint_c },
        }
    }
}

impl HvacPort for LogHvac {
    fn set_mode(&mut self, mode: HvacMode, setpoint_c: Option<f32>) -> Result<(), ActuatorError> {
        info!(
            "HVAC  | set_mode={} setpoint={:?}",
            mode.as_str(),
            setpoint_c
        );
        self.status = HvacStatus { mode, setpoint_c };
        Ok(())
    }

    fn status(&mut self) -> Result<HvacStatus, ActuatorError> {
        Ok(self.status)
    }
}

/// Audit adapter that renders every record as a single log line.
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn climate_action(&mut self, event: &AuditEvent) {
        info!(
            "AUDIT | {} -> {} | co2={:?} setpoint={:?} | {}",
            event.system.as_str(),
            event.action,
            event.co2_ppm,
            event.setpoint_c,
            event.reason,
        );
    }

    fn device_event(&mut self, kind: DeviceKind, state: &str) {
        info!("EVENT | {}={}", kind.as_str(), state);
    }

    fn occupancy_change(&mut self, state: OccupancyState, co2_ppm: Option<u16>) {
        info!("OCCUP | {} | co2={:?}", state.as_str(), co2_ppm);
    }
}

/// Broadcast adapter that logs each snapshot as JSON.
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn publish(&mut self, snapshot: &StatusSnapshot) {
        match serde_json::to_string(snapshot) {
            Ok(json) => info!("STATE | {json}"),
            Err(e) => info!("STATE | <serialization failed: {e}>"),
        }
    }
}
