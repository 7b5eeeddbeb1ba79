//! spectrum-drivers - Device drivers for spectrum workers
//!
//! Drivers available:
//! - `rig`: tuned receiver, one frequency at a time, optional set-check
//! - `sensor`: sweeping sensor that reads whole spans
//!
//! Both drive simulated hardware through a [`transport::SimLink`]; vendor
//! wire protocols are not part of this crate.

pub mod config;
pub mod registry;
pub mod rig;
pub mod sensor;
pub mod sim;
pub mod transport;

pub use config::{DriversConfig, RigConfig, SensorConfig, SimSignal};
pub use registry::DriverRegistry;
pub use rig::RigDriver;
pub use sensor::SensorDriver;
