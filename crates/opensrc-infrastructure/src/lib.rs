//! Ambient stack: layered configuration, structured logging, and the
//! output truncator, matching the teacher's `mcb-infrastructure` crate
//! scaled down to what a single-process stdio server needs (spec.md
//! §9, SPEC_FULL.md §9).

pub mod config;
pub mod logging;
pub mod paths;
pub mod truncate;

pub use config::{AppConfig, ConfigLoader};
