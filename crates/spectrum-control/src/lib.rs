//! spectrum-control - Control plane between workers and their controllers
//!
//! A worker and whoever drives it share nothing but a run directory and the
//! worker's process id. This crate owns the file layout in that directory
//! ([`ControlFiles`]), the signals sent to a worker ([`ControlSignal`]) and a
//! client view for controllers ([`ClientProxy`]).

pub mod client;
pub mod error;
pub mod files;

pub use client::ClientProxy;
pub use error::{ControlError, ProcessError};
pub use files::{is_alive, send_signal, ControlFiles, ControlSignal};
