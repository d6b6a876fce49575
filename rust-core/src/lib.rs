//! sidmon - VLF band-power monitor
//!
//! Reads one or two channels of PCM, computes a tapered power spectrum per
//! frame, writes band energies to daily record files and alerts when the
//! signal drops out or comes back.

pub mod audio;
pub mod config;
pub mod monitor;
pub mod output;
pub mod spectrum;

pub use config::Config;
pub use monitor::{Monitor, MonitorError, MonitorSettings};
