//! Host-testable core of the plantmon sensor-node firmware.
//!
//! Everything that does not touch the radio lives here: the peripheral
//! controller (advertising/connection lifecycle and the periodic battery
//! update), the cooperative event dispatcher, advertising payload
//! encoding, configuration, and error types.
//!
//! Usage: `cargo test`
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main]
//! and plugs the SoftDevice into the traits defined in [`ble`].

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod battery;
pub mod ble;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod environment;
pub mod error;
pub mod identity;

pub use battery::{BatteryExposer, BatteryLevel};
pub use controller::{LinkState, PeripheralController};
pub use dispatcher::{Event, EventHandler, EventQueue};
pub use error::{AdvertisingStage, BleError, Error};
pub use identity::{PeripheralIdentity, PLANT_MONITOR};
