//! # media-capture-sim
//!
//! Simulated backend for media-capture-core.
//!
//! Provides:
//! - `SimDriver` — an in-memory `GraphDriver` with the full error contract
//!   (busy devices, missing pins, disconnected-endpoint format access)
//! - `SimCatalog` / `SimDeviceSpec` — shared device blueprints with
//!   capabilities, default formats and physical connectors
//!
//! Meant for integration tests and for developing against the controller
//! without capture hardware.
//!
//! ## Usage
//! ```ignore
//! use media_capture_core::GraphController;
//! use media_capture_sim::{SimCatalog, SimDeviceSpec, SimDriver};
//!
//! let catalog = SimCatalog::new();
//! let cam = catalog.add(SimDeviceSpec::video("cam0", "Sim Camera"));
//! let driver = SimDriver::new(catalog);
//! let mut controller = GraphController::new(driver, Some(cam), None).unwrap();
//! controller.start().unwrap();
//! ```

pub mod catalog;
pub mod driver;

pub use catalog::{SimAudioSpec, SimCatalog, SimDeviceSpec, SimVideoSpec};
pub use driver::{SimClock, SimDriver};
