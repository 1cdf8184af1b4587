//! Inbound inputs to the application service.
//!
//! Everything the outside world can tell the core arrives as one of these:
//! sensor events from the gateway adapters, workstation occupancy reports,
//! air-quality readings, manual overrides from the presentation layer, and
//! the periodic control tick.

use embassy_time::Instant;

use crate::control::{FanSpeed, HvacMode};

/// One discrete input. The control loop feeds these to
/// [`AppService::handle_input`](super::service::AppService::handle_input)
/// strictly one at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Input {
    /// Door contact: `true` = open.
    Door(bool),

    /// Window contact: `true` = open.
    Window(bool),

    /// Motion sensor: `true` = detected, `false` = cleared.
    Motion(bool),

    /// Workstation occupancy report. `last_active` is the raw timestamp of
    /// the last input event; the collaborator sends no precomputed
    /// "active" boolean, all idle policy lives in the core.
    Workstation {
        last_active: Instant,
        external_monitor: bool,
    },

    /// Air-quality reading; absent fields leave the previous value intact.
    AirQuality {
        co2_ppm: Option<u16>,
        tvoc_ppb: Option<u16>,
        temp_c: Option<f32>,
    },

    /// Pin the ERV to a speed until expiry or an occupancy change.
    ManualErv(FanSpeed),

    /// Pin the HVAC to a mode/setpoint until expiry or an occupancy change.
    ManualHvac {
        mode: HvacMode,
        setpoint_c: Option<f32>,
    },

    /// Periodic control tick; fires pending deadlines and re-evaluates.
    Tick,
}
