//! OfficeClimate — main entry point.
//!
//! Hexagonal architecture on a single-threaded cooperative control loop:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                   │
//! │                                                            │
//! │  sensor gateway   air-quality feed   ERV driver   heat pump│
//! │  (producers → INPUTS channel)        (ErvPort)   (HvacPort)│
//! │                                                            │
//! │  ─────────────── Port Trait Boundary ───────────────────   │
//! │                                                            │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │            AppService (pure logic)                   │  │
//! │  │  Occupancy FSM · Climate · HVAC · Overrides          │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! All state mutation happens inside one executor task that drains the
//! input channel and a 1 Hz control tick — no locking around core data.
//! This binary wires the log-only adapters (dry-run); deployments link the
//! library and implement the ports against their vendor clients.

#![deny(unused_must_use)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Timelike;
use edge_executor::LocalExecutor;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Timer};
use futures_lite::future;
use log::info;

use officeclimate::adapters::log_sink::{LogAuditSink, LogErv, LogHvac, LogStatusSink};
use officeclimate::app::commands::Input;
use officeclimate::app::service::AppService;
use officeclimate::config::SystemConfig;
use officeclimate::control::HvacMode;

/// Inbound input queue. Gateway adapters (which may run on their own
/// threads) send into this; the control loop is the single consumer.
static INPUTS: Channel<CriticalSectionRawMutex, Input, 64> = Channel::new();

// ── Configuration ─────────────────────────────────────────────

fn load_config() -> Result<SystemConfig> {
    let path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("config.json"), PathBuf::from);

    let config: SystemConfig = if path.exists() {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
    } else {
        info!("no config file at {}, using defaults", path.display());
        SystemConfig::default()
    };

    // Invalid thresholds are fatal here, never silently defaulted mid-run.
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Wall-clock hour-of-day for the occupancy-hours gate. The rest of the
/// system runs on monotonic time.
fn current_hour() -> Option<u8> {
    Some(chrono::Local::now().hour() as u8)
}

// ── Control loop ──────────────────────────────────────────────

async fn control_loop(mut service: AppService, tick: Duration) {
    let mut erv = LogErv;
    let mut hvac = LogHvac::new(HvacMode::Heat, Some(22.0));
    let mut audit = LogAuditSink;
    let mut status = LogStatusSink;

    service.start(Instant::now());
    info!("control loop running, tick={}s", tick.as_secs());

    loop {
        // Wake on the next input or the control tick, whichever is first.
        let input = future::or(INPUTS.receive(), async {
            Timer::after(tick).await;
            Input::Tick
        })
        .await;

        service.handle_input(
            input,
            Instant::now(),
            current_hour(),
            &mut erv,
            &mut hvac,
            &mut audit,
            &mut status,
        );
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("officeclimate v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let tick = Duration::from_secs(u64::from(config.control_tick_seconds));
    let service = AppService::new(config);

    let ex: LocalExecutor = LocalExecutor::new();
    future::block_on(ex.run(control_loop(service, tick)));
    Ok(())
}
