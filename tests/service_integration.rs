//! Integration tests: AppService → machine/coordinators → ports.

use embassy_time::Instant;

use officeclimate::app::commands::Input;
use officeclimate::app::events::{AuditEvent, StatusSnapshot};
use officeclimate::app::ports::{AuditSink, DeviceKind, ErvPort, HvacPort, StatusSink};
use officeclimate::app::service::AppService;
use officeclimate::config::SystemConfig;
use officeclimate::control::{FanSpeed, HvacMode, HvacStatus};
use officeclimate::error::ActuatorError;
use officeclimate::fsm::OccupancyState;

// ── Mock implementations ──────────────────────────────────────

struct MockErv {
    calls: Vec<FanSpeed>,
    fail: bool,
}

impl MockErv {
    fn new() -> Self {
        Self {
            calls: Vec::new(),
            fail: false,
        }
    }
}

impl ErvPort for MockErv {
    fn set_speed(&mut self, speed: FanSpeed) -> Result<(), ActuatorError> {
        self.calls.push(speed);
        if self.fail {
            Err(ActuatorError::Unreachable)
        } else {
            Ok(())
        }
    }
}

struct MockHvac {
    commands: Vec<(HvacMode, Option<f32>)>,
    live: HvacStatus,
    status_available: bool,
}

impl MockHvac {
    fn new(mode: HvacMode) -> Self {
        Self {
            commands: Vec::new(),
            live: HvacStatus {
                mode,
                setpoint_c: Some(22.0),
            },
            status_available: true,
        }
    }
}

impl HvacPort for MockHvac {
    fn set_mode(&mut self, mode: HvacMode, setpoint_c: Option<f32>) -> Result<(), ActuatorError> {
        self.commands.push((mode, setpoint_c));
        self.live = HvacStatus { mode, setpoint_c };
        Ok(())
    }

    fn status(&mut self) -> Result<HvacStatus, ActuatorError> {
        if self.status_available {
            Ok(self.live)
        } else {
            Err(ActuatorError::Timeout)
        }
    }
}

#[derive(Default)]
struct RecordingAudit {
    actions: Vec<AuditEvent>,
    device_events: Vec<(&'static str, String)>,
    occupancy: Vec<OccupancyState>,
}

impl AuditSink for RecordingAudit {
    fn climate_action(&mut self, event: &AuditEvent) {
        self.actions.push(event.clone());
    }
    fn device_event(&mut self, kind: DeviceKind, state: &str) {
        self.device_events.push((kind.as_str(), state.to_string()));
    }
    fn occupancy_change(&mut self, state: OccupancyState, _co2_ppm: Option<u16>) {
        self.occupancy.push(state);
    }
}

#[derive(Default)]
struct RecordingStatus {
    published: Vec<StatusSnapshot>,
}

impl StatusSink for RecordingStatus {
    fn publish(&mut self, snapshot: &StatusSnapshot) {
        self.published.push(snapshot.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────

struct Harness {
    service: AppService,
    erv: MockErv,
    hvac: MockHvac,
    audit: RecordingAudit,
    status: RecordingStatus,
    hour: Option<u8>,
}

impl Harness {
    fn new() -> Self {
        Self::with_hvac_mode(HvacMode::Off)
    }

    fn with_hvac_mode(mode: HvacMode) -> Self {
        let mut service = AppService::new(SystemConfig::default());
        service.start(t(0));
        Self {
            service,
            erv: MockErv::new(),
            hvac: MockHvac::new(mode),
            audit: RecordingAudit::default(),
            status: RecordingStatus::default(),
            hour: Some(12),
        }
    }

    fn send(&mut self, input: Input, at: Instant) {
        self.service.handle_input(
            input,
            at,
            self.hour,
            &mut self.erv,
            &mut self.hvac,
            &mut self.audit,
            &mut self.status,
        );
    }
}

fn t(secs: u64) -> Instant {
    Instant::from_secs(secs)
}

// ── Departure and away ventilation ────────────────────────────

#[test]
fn departure_flow_commits_away_and_purges() {
    let mut h = Harness::new();

    h.send(Input::Motion(true), t(0));
    assert_eq!(h.service.state(), OccupancyState::Present);

    h.send(
        Input::AirQuality {
            co2_ppm: Some(1500),
            tvoc_ppb: Some(50),
            temp_c: Some(19.0),
        },
        t(10),
    );
    // Present at 1500 ppm: below critical, ERV stays off.
    assert_eq!(h.service.erv_speed(), FanSpeed::Off);

    // Walk out: door open, door closed, grace window, no presence.
    h.send(Input::Motion(false), t(100));
    h.send(Input::Door(true), t(200));
    h.send(Input::Door(false), t(204));
    assert_eq!(h.service.state(), OccupancyState::Present);

    h.send(Input::Tick, t(215));
    assert_eq!(h.service.state(), OccupancyState::Away);
    assert_eq!(h.audit.occupancy, vec![OccupancyState::Present, OccupancyState::Away]);

    // Away with CO2 above target: the initial turbo purge engages.
    assert_eq!(h.service.erv_speed(), FanSpeed::Turbo);
    let last = h.audit.actions.last().unwrap();
    assert_eq!(last.action, "turbo");
    assert!(last.reason.contains("away_initial_purge"));
}

#[test]
fn motion_during_grace_window_keeps_everything_unchanged() {
    let mut h = Harness::new();
    h.send(Input::Motion(true), t(0));
    h.send(Input::Door(true), t(100));
    h.send(Input::Door(false), t(103));

    h.send(Input::Motion(true), t(108));
    h.send(Input::Tick, t(120));
    assert_eq!(h.service.state(), OccupancyState::Present);
    assert!(h.audit.occupancy.len() == 1, "no away transition recorded");
}

// ── Safety interlock ──────────────────────────────────────────

#[test]
fn window_open_forces_erv_off_despite_override() {
    let mut h = Harness::new();

    // Away purge running.
    h.send(
        Input::AirQuality {
            co2_ppm: Some(1500),
            tvoc_ppb: None,
            temp_c: None,
        },
        t(0),
    );
    h.send(Input::Tick, t(1));
    assert_eq!(h.service.erv_speed(), FanSpeed::Turbo);

    h.send(Input::Window(true), t(10));
    assert_eq!(h.service.erv_speed(), FanSpeed::Off);
    assert_eq!(h.audit.actions.last().unwrap().reason, "safety_interlock");

    // A manual override cannot fight the interlock.
    h.send(Input::ManualErv(FanSpeed::Turbo), t(20));
    assert_eq!(h.service.erv_speed(), FanSpeed::Off);

    // Window closed: the override now applies.
    h.send(Input::Window(false), t(30));
    assert_eq!(h.service.erv_speed(), FanSpeed::Turbo);
    assert!(h
        .audit
        .actions
        .last()
        .unwrap()
        .reason
        .starts_with("manual_override"));
}

// ── Idempotence ───────────────────────────────────────────────

#[test]
fn repeated_ticks_with_unchanged_inputs_emit_nothing() {
    let mut h = Harness::new();
    h.send(
        Input::AirQuality {
            co2_ppm: Some(1500),
            tvoc_ppb: None,
            temp_c: None,
        },
        t(0),
    );
    h.send(Input::Tick, t(1));

    let erv_calls = h.erv.calls.len();
    let actions = h.audit.actions.len();
    let published = h.status.published.len();

    for s in 2..30 {
        h.send(Input::Tick, t(s));
    }

    assert_eq!(h.erv.calls.len(), erv_calls, "no repeated ERV commands");
    assert_eq!(h.audit.actions.len(), actions, "no repeated audit events");
    assert_eq!(h.status.published.len(), published, "no repeated snapshots");
}

// ── Manual override lifecycle ─────────────────────────────────

#[test]
fn erv_override_expires_and_automation_resumes() {
    let mut h = Harness::new();
    h.send(Input::Motion(true), t(0));
    assert_eq!(h.service.state(), OccupancyState::Present);

    h.send(Input::ManualErv(FanSpeed::Medium), t(60));
    assert_eq!(h.service.erv_speed(), FanSpeed::Medium);

    // One tick before the 30-minute timeout: still pinned.
    h.send(Input::Tick, t(60 + 30 * 60 - 1));
    assert_eq!(h.service.erv_speed(), FanSpeed::Medium);

    // Next tick past the timeout: automation decides again (present, low
    // CO2 → off).
    h.send(Input::Tick, t(60 + 30 * 60));
    assert_eq!(h.service.erv_speed(), FanSpeed::Off);
    assert!(h.service.snapshot().manual_override.erv == false);
}

#[test]
fn occupancy_transition_clears_overrides() {
    let mut h = Harness::new();
    h.send(Input::ManualErv(FanSpeed::Turbo), t(0));
    assert_eq!(h.service.erv_speed(), FanSpeed::Turbo);
    assert!(h.service.snapshot().manual_override.erv);

    h.send(Input::Motion(true), t(10));
    assert_eq!(h.service.state(), OccupancyState::Present);
    assert!(!h.service.snapshot().manual_override.erv);
    assert_eq!(h.service.erv_speed(), FanSpeed::Off);
}

#[test]
fn manual_hvac_override_is_sent_once_and_blocks_automation() {
    let mut h = Harness::with_hvac_mode(HvacMode::Heat);

    // Away, ERV running, mild temperature: suspension would normally fire.
    h.send(
        Input::AirQuality {
            co2_ppm: Some(1500),
            tvoc_ppb: None,
            temp_c: Some(21.5),
        },
        t(0),
    );
    h.send(
        Input::ManualHvac {
            mode: HvacMode::Heat,
            setpoint_c: Some(23.0),
        },
        t(1),
    );

    let hvac_commands = h.hvac.commands.clone();
    assert!(hvac_commands.contains(&(HvacMode::Heat, Some(23.0))));

    // Automation (suspend) must not override the human.
    for s in 2..20 {
        h.send(Input::Tick, t(s));
    }
    assert_eq!(h.hvac.commands, hvac_commands, "no further HVAC commands");
}

// ── ERV/HVAC mutual suspension ────────────────────────────────

#[test]
fn hvac_suspends_while_erv_purges_and_resumes_after() {
    let mut h = Harness::with_hvac_mode(HvacMode::Heat);

    // Away from the start; CO2 high, mild temperature.
    h.send(
        Input::AirQuality {
            co2_ppm: Some(1400),
            tvoc_ppb: None,
            temp_c: Some(21.5),
        },
        t(0),
    );
    assert_eq!(h.service.erv_speed(), FanSpeed::Turbo);

    // Same evaluation already saw the ERV running: heat suspended.
    assert_eq!(h.hvac.commands.last(), Some(&(HvacMode::Off, None)));
    assert!(h.service.snapshot().hvac_suspended);
    let suspend = h
        .audit
        .actions
        .iter()
        .find(|a| a.reason == "away_erv_suspend")
        .expect("suspension audited");
    assert_eq!(suspend.action, "off");

    // CO2 reaches target: ERV stops, heat comes back (within hours).
    h.send(
        Input::AirQuality {
            co2_ppm: Some(450),
            tvoc_ppb: None,
            temp_c: Some(21.5),
        },
        t(60),
    );
    assert_eq!(h.service.erv_speed(), FanSpeed::Off);
    assert_eq!(h.hvac.commands.last(), Some(&(HvacMode::Heat, Some(22.0))));
    assert!(!h.service.snapshot().hvac_suspended);
    assert!(h
        .audit
        .actions
        .iter()
        .any(|a| a.reason == "away_resume_erv_stopped"));
}

#[test]
fn hvac_stays_off_outside_occupancy_hours() {
    let mut h = Harness::with_hvac_mode(HvacMode::Heat);
    h.hour = Some(23);

    h.send(
        Input::AirQuality {
            co2_ppm: Some(1400),
            tvoc_ppb: None,
            temp_c: Some(21.5),
        },
        t(0),
    );
    assert_eq!(h.hvac.commands.last(), Some(&(HvacMode::Off, None)));

    h.send(
        Input::AirQuality {
            co2_ppm: Some(450),
            tvoc_ppb: None,
            temp_c: Some(21.5),
        },
        t(60),
    );
    assert_eq!(h.service.erv_speed(), FanSpeed::Off);
    // ERV stopped but it is 11 PM: heat stays off until morning.
    assert_eq!(h.hvac.commands.last(), Some(&(HvacMode::Off, None)));
    assert!(h.service.snapshot().hvac_suspended);
}

#[test]
fn unavailable_hvac_status_skips_suspension() {
    let mut h = Harness::with_hvac_mode(HvacMode::Heat);
    h.hvac.status_available = false;

    h.send(
        Input::AirQuality {
            co2_ppm: Some(1400),
            tvoc_ppb: None,
            temp_c: Some(21.5),
        },
        t(0),
    );
    assert_eq!(h.service.erv_speed(), FanSpeed::Turbo);
    assert!(
        h.hvac.commands.is_empty(),
        "no live status: no suspend command"
    );
}

#[test]
fn critical_temperature_forces_heat() {
    let mut h = Harness::with_hvac_mode(HvacMode::Off);

    // 8C = 46.4F, below the 50F freeze floor; window open besides.
    h.send(Input::Window(true), t(0));
    h.send(
        Input::AirQuality {
            co2_ppm: Some(500),
            tvoc_ppb: None,
            temp_c: Some(8.0),
        },
        t(1),
    );
    assert_eq!(h.hvac.commands.last(), Some(&(HvacMode::Heat, Some(22.0))));
    assert!(h
        .audit
        .actions
        .iter()
        .any(|a| a.reason.starts_with("critical_temp_")));
    // The ERV side of the interlock still holds.
    assert_eq!(h.service.erv_speed(), FanSpeed::Off);
}

// ── Actuator failures ─────────────────────────────────────────

#[test]
fn failed_erv_command_is_resent_next_evaluation() {
    let mut h = Harness::new();
    h.erv.fail = true;

    h.send(
        Input::AirQuality {
            co2_ppm: Some(1500),
            tvoc_ppb: None,
            temp_c: None,
        },
        t(0),
    );
    assert_eq!(h.erv.calls, vec![FanSpeed::Turbo]);
    let actions = h.audit.actions.len();

    // Failures self-heal: the next evaluation re-derives the same desired
    // state and re-sends, without duplicating the audit trail.
    h.erv.fail = false;
    h.send(Input::Tick, t(1));
    assert_eq!(h.erv.calls, vec![FanSpeed::Turbo, FanSpeed::Turbo]);
    assert_eq!(h.audit.actions.len(), actions, "no duplicate audit event");

    h.send(Input::Tick, t(2));
    assert_eq!(h.erv.calls.len(), 2, "settled after the successful send");
}

// ── Status broadcast ──────────────────────────────────────────

#[test]
fn snapshots_published_on_change_with_correct_shape() {
    let mut h = Harness::new();
    h.send(
        Input::AirQuality {
            co2_ppm: Some(900),
            tvoc_ppb: Some(80),
            temp_c: Some(20.5),
        },
        t(0),
    );

    let snap = h.status.published.last().unwrap();
    assert_eq!(snap.state, OccupancyState::Away);
    assert!(!snap.is_present);
    assert_eq!(snap.air_quality.co2_ppm, Some(900));
    assert!(snap.erv_should_run);

    let count = h.status.published.len();
    h.send(Input::Tick, t(1));
    assert_eq!(h.status.published.len(), count, "unchanged state: no push");

    h.send(Input::Motion(true), t(5));
    assert!(h.status.published.len() > count);
    assert!(h.status.published.last().unwrap().is_present);
}

#[test]
fn device_events_are_audited() {
    let mut h = Harness::new();
    h.send(Input::Door(true), t(0));
    h.send(Input::Motion(true), t(1));
    h.send(Input::Door(false), t(2));

    assert_eq!(
        h.audit.device_events,
        vec![
            ("door", "open".to_string()),
            ("motion", "detected".to_string()),
            ("door", "closed".to_string()),
        ]
    );
}
