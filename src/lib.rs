//! Pixy fleet controller library - identity checks, mode dispatch, and
//! parameter sync for a fleet of Pixy smart cameras.
//!
//! This library exposes the core functionality of the `pf` CLI for use in
//! tests and embedding hosts.
//!
//! # Modules
//!
//! - `device`: Camera transport port, handles, and the simulated bus
//! - `registry`: Slot names to camera identities
//! - `fleet`: Best-effort operations across the managed cameras
//! - `mode`: Idle/Active dispatcher
//! - `sync`: Camera parameters to and from the settings store
//! - `controller`: Top-level owner driven by ticks and operator commands
//! - `config`: Configuration file handling
#![forbid(unsafe_code)]

pub mod cli;
pub mod clock;
pub mod color;
pub mod commands;
pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod fleet;
pub mod logging;
pub mod mode;
pub mod registry;
pub mod store;
pub mod sync;
