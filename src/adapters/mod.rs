//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                     | Connects to          |
//! |------------|--------------------------------|----------------------|
//! | `log_sink` | ErvPort, HvacPort,             | Structured log output|
//! |            | AuditSink, StatusSink          | (dry-run mode)       |
//!
//! Production deployments implement the same traits against the real
//! vendor clients (sensor gateway, ventilation unit, heat-pump cloud,
//! database, WebSocket fan-out) outside this crate.

pub mod log_sink;
