//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the occupancy machine, both coordinators and the
//! override tracker. It routes every [`Input`] through the same sequence:
//!
//! ```text
//!  Input ──▶ SensorState update ──▶ occupancy evaluate
//!                │ (committed transition? fan out to coordinators,
//!                │  override clearing, audit, broadcast)
//!                ▼
//!        ClimateCoordinator.evaluate ──▶ ErvPort   (on change)
//!        HvacCoordinator.evaluate   ──▶ HvacPort  (on change)
//!                ▼
//!        StatusSink.publish (on change)
//! ```
//!
//! Commands and audit events are emitted only when a decision actually
//! changes, so repeated evaluations with unchanged inputs are no-ops all
//! the way to the ports.

use embassy_time::{Duration, Instant};
use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::control::erv::ClimateCoordinator;
use crate::control::hvac::{HvacCoordinator, HvacDecision};
use crate::control::overrides::ManualOverrideTracker;
use crate::control::{FanSpeed, HvacMode};
use crate::fsm::{OccupancyMachine, OccupancyState, Transition};

use super::commands::Input;
use super::events::{
    AirQualityStatus, AuditEvent, AuditSystem, OverrideStatus, SensorStatus, StatusSnapshot,
};
use super::ports::{AuditSink, DeviceKind, ErvPort, HvacPort, StatusSink};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic. All I/O flows
/// through port traits injected at call sites, making the entire service
/// testable with mock adapters.
pub struct AppService {
    machine: OccupancyMachine,
    climate: ClimateCoordinator,
    hvac: HvacCoordinator,
    overrides: ManualOverrideTracker,

    /// Speed the last evaluation decided on (audit dedupe, status view).
    desired_erv: FanSpeed,
    /// Speed last *successfully* commanded; a failed send leaves this
    /// behind `desired_erv` so the next evaluation re-sends.
    commanded_erv: FanSpeed,

    /// (mode, setpoint) the last evaluation decided on.
    last_hvac_decision: Option<(HvacMode, Option<f32>)>,
    /// Set when the last HVAC send failed; cleared on success.
    hvac_retry: bool,

    last_snapshot: Option<StatusSnapshot>,
}

impl AppService {
    /// Construct the service from validated configuration.
    ///
    /// Does **not** start the machine — call [`start`](Self::start) next.
    pub fn new(config: SystemConfig) -> Self {
        let override_timeout =
            Duration::from_secs(u64::from(config.manual_override_timeout_minutes) * 60);
        Self {
            machine: OccupancyMachine::new(config.clone()),
            climate: ClimateCoordinator::new(config.clone()),
            hvac: HvacCoordinator::new(config),
            overrides: ManualOverrideTracker::new(override_timeout),
            desired_erv: FanSpeed::Off,
            commanded_erv: FanSpeed::Off,
            last_hvac_decision: None,
            hvac_retry: false,
            last_snapshot: None,
        }
    }

    /// Run the machine's initial state entry.
    pub fn start(&mut self, now: Instant) {
        self.machine.start(now);
        info!("service started ({})", self.machine.state().as_str());
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> OccupancyState {
        self.machine.state()
    }

    pub fn erv_speed(&self) -> FanSpeed {
        self.desired_erv
    }

    /// On-demand status view (the same shape pushed to the broadcast sink).
    pub fn snapshot(&self) -> StatusSnapshot {
        self.build_snapshot()
    }

    // ── Input handling ────────────────────────────────────────

    /// Process one input to completion: sensor update, occupancy
    /// evaluation, transition fan-out, actuator decisions, broadcast.
    ///
    /// `current_hour` is the wall-clock hour-of-day when known; the
    /// monotonic `now` drives everything else.
    #[allow(clippy::too_many_arguments)]
    pub fn handle_input(
        &mut self,
        input: Input,
        now: Instant,
        current_hour: Option<u8>,
        erv: &mut impl ErvPort,
        hvac: &mut impl HvacPort,
        audit: &mut impl AuditSink,
        status: &mut impl StatusSink,
    ) {
        let transition = self.dispatch(input, now, audit);

        if let Some(tr) = transition {
            self.on_transition(tr, now, audit);
        }

        self.apply_outputs(now, current_hour, erv, hvac, audit);
        self.publish_status(status);
    }

    fn dispatch(&mut self, input: Input, now: Instant, audit: &mut impl AuditSink) -> Option<Transition> {
        match input {
            Input::Door(open) => {
                audit.device_event(DeviceKind::Door, if open { "open" } else { "closed" });
                let tr = self.machine.update_door(open, now);
                self.climate
                    .note_room_event(self.machine.safety_interlock_active(), now);
                tr
            }
            Input::Window(open) => {
                audit.device_event(DeviceKind::Window, if open { "open" } else { "closed" });
                let tr = self.machine.update_window(open, now);
                self.climate
                    .note_room_event(self.machine.safety_interlock_active(), now);
                tr
            }
            Input::Motion(detected) => {
                audit.device_event(DeviceKind::Motion, if detected { "detected" } else { "clear" });
                self.machine.update_motion(detected, now)
            }
            Input::Workstation {
                last_active,
                external_monitor,
            } => self
                .machine
                .update_workstation(last_active, external_monitor, now),
            Input::AirQuality {
                co2_ppm,
                tvoc_ppb,
                temp_c,
            } => {
                self.climate.record_air_quality(co2_ppm, tvoc_ppb, now);
                self.machine.update_air_quality(co2_ppm, tvoc_ppb, temp_c, now)
            }
            Input::ManualErv(speed) => {
                self.overrides.set_erv(speed, now);
                self.machine.evaluate(now)
            }
            Input::ManualHvac { mode, setpoint_c } => {
                self.overrides.set_hvac(mode, setpoint_c, now);
                self.machine.evaluate(now)
            }
            Input::Tick => self.machine.evaluate(now),
        }
    }

    // ── Transition fan-out ────────────────────────────────────

    /// Synchronous observer notification, exactly once per committed
    /// transition: override clearing, coordinator bookkeeping, audit.
    fn on_transition(&mut self, tr: Transition, now: Instant, audit: &mut impl AuditSink) {
        info!("=== occupancy: {} -> {} ===", tr.from.as_str(), tr.to.as_str());

        self.overrides.clear_all();
        self.climate.note_transition(tr, self.machine.sensors(), now);
        audit.occupancy_change(tr.to, self.machine.sensors().co2_ppm);
    }

    // ── Actuator decisions ────────────────────────────────────

    fn apply_outputs(
        &mut self,
        now: Instant,
        current_hour: Option<u8>,
        erv: &mut impl ErvPort,
        hvac: &mut impl HvacPort,
        audit: &mut impl AuditSink,
    ) {
        let _ = self.overrides.check_expiry(now);

        // ── ERV ──────────────────────────────────────────────
        let decision = self.climate.evaluate(
            self.machine.state(),
            self.machine.sensors(),
            self.overrides.erv(),
            now,
        );
        if decision.speed != self.desired_erv {
            info!("ERV -> {} ({})", decision.speed.as_str(), decision.reason);
            audit.climate_action(&AuditEvent {
                system: AuditSystem::Erv,
                action: decision.speed.as_str().to_string(),
                co2_ppm: self.machine.sensors().co2_ppm,
                setpoint_c: None,
                reason: decision.reason,
            });
            self.desired_erv = decision.speed;
        }
        if self.desired_erv != self.commanded_erv {
            match erv.set_speed(self.desired_erv) {
                Ok(()) => self.commanded_erv = self.desired_erv,
                Err(e) => warn!("ERV command failed ({e}); will re-send next evaluation"),
            }
        }

        // ── HVAC ─────────────────────────────────────────────
        let live = match hvac.status() {
            Ok(s) => Some(s),
            Err(e) => {
                debug!("HVAC status unavailable ({e})");
                None
            }
        };

        // Automation runs first so the freeze floor and the interlock can
        // outrank a manual override; with an override active and neither
        // condition in play, the coordinator stands down and the override's
        // command applies.
        let interlock = self.machine.safety_interlock_active();
        let manual = self.overrides.hvac().copied();
        let auto = self.hvac.evaluate(
            self.machine.state(),
            self.desired_erv != FanSpeed::Off,
            self.machine.sensors().temp_c,
            live.as_ref(),
            interlock,
            current_hour,
            manual.is_some(),
        );
        let decision = auto.or_else(|| {
            if interlock {
                return None;
            }
            manual.map(|ov| HvacDecision {
                mode: ov.mode,
                setpoint_c: ov.setpoint_c,
                reason: format!("manual_override_{}", ov.mode.as_str()),
            })
        });

        if let Some(d) = decision {
            let command = (d.mode, d.setpoint_c);
            let is_new = self.last_hvac_decision != Some(command);
            if is_new {
                info!("HVAC -> {} ({})", d.mode.as_str(), d.reason);
                audit.climate_action(&AuditEvent {
                    system: AuditSystem::Hvac,
                    action: d.mode.as_str().to_string(),
                    co2_ppm: self.machine.sensors().co2_ppm,
                    setpoint_c: d.setpoint_c,
                    reason: d.reason,
                });
                self.last_hvac_decision = Some(command);
            }
            if is_new || self.hvac_retry {
                match hvac.set_mode(command.0, command.1) {
                    Ok(()) => self.hvac_retry = false,
                    Err(e) => {
                        warn!("HVAC command failed ({e}); will re-send next evaluation");
                        self.hvac_retry = true;
                    }
                }
            }
        }
    }

    // ── Broadcast ─────────────────────────────────────────────

    fn publish_status(&mut self, status: &mut impl StatusSink) {
        let snap = self.build_snapshot();
        if self.last_snapshot.as_ref() != Some(&snap) {
            status.publish(&snap);
            self.last_snapshot = Some(snap);
        }
    }

    fn build_snapshot(&self) -> StatusSnapshot {
        let sensors = self.machine.sensors();
        StatusSnapshot {
            state: self.machine.state(),
            is_present: self.machine.state() == OccupancyState::Present,
            safety_interlock_active: self.machine.safety_interlock_active(),
            erv_should_run: self.desired_erv != FanSpeed::Off,
            erv_speed: self.desired_erv,
            hvac_mode: self.last_hvac_decision.map_or(HvacMode::Off, |(m, _)| m),
            hvac_suspended: self.hvac.is_suspended(),
            manual_override: OverrideStatus {
                erv: self.overrides.erv().is_some(),
                hvac: self.overrides.hvac().is_some(),
            },
            air_quality: AirQualityStatus {
                co2_ppm: sensors.co2_ppm,
                tvoc_ppb: sensors.tvoc_ppb,
                temp_c: sensors.temp_c,
            },
            sensors: SensorStatus {
                door_open: sensors.door_open,
                window_open: sensors.window_open,
                motion_detected: sensors.motion_detected,
                external_monitor: sensors.external_monitor,
            },
        }
    }
}
