//! Climate control logic: actuator vocabularies, rate windows, manual
//! overrides, and the ERV/HVAC coordinators.

pub mod erv;
pub mod hvac;
pub mod overrides;
pub mod rate;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ERV fan speed
// ---------------------------------------------------------------------------

/// ERV fan speed presets.
///
/// The derived ordering is the "more aggressive than" relation used when
/// combining independent recommendations: `Off < Quiet < Medium < Turbo`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum FanSpeed {
    #[default]
    Off,
    /// Quietest operation — the only speed tolerated while someone is in.
    Quiet,
    /// Positive-pressure flush, louder.
    Medium,
    /// Full purge.
    Turbo,
}

impl FanSpeed {
    /// Stable lowercase name for audit reasons and status payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Quiet => "quiet",
            Self::Medium => "medium",
            Self::Turbo => "turbo",
        }
    }
}

// ---------------------------------------------------------------------------
// HVAC mode
// ---------------------------------------------------------------------------

/// Heat-pump operating mode as exposed by the vendor driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HvacMode {
    #[default]
    Off,
    Heat,
    Cool,
    Auto,
}

impl HvacMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::Auto => "auto",
        }
    }

    /// True for modes worth restoring after a suspension.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Off)
    }
}

// ---------------------------------------------------------------------------
// Live HVAC status
// ---------------------------------------------------------------------------

/// Point-in-time device status read through
/// [`HvacPort::status`](crate::app::ports::HvacPort::status). Suspension
/// decisions verify against this, never against cached local state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HvacStatus {
    pub mode: HvacMode,
    pub setpoint_c: Option<f32>,
}
