//! Occupancy-driven ERV and HVAC control core.
//!
//! Exposes the pure-logic modules for integration testing and for
//! deployments that wire their own vendor adapters. The binary in
//! `main.rs` runs the control loop against the log-only adapters.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod fsm;
pub mod timers;
