//! Wearlink BLE engine.
//!
//! Host-side building blocks shared by every wearable driver: a
//! transaction queue that keeps exactly one GATT operation in flight per
//! device, and a reliable chunked file-transfer protocol on top of it.
//! The platform Bluetooth stack plugs in through [`btle::GattLink`].

#![deny(unused_must_use)]

// Links the host time driver that async-io-mini timers run on.
use embassy_time as _;

pub mod adapters;
pub mod app;
pub mod btle;
pub mod config;
pub mod error;
pub mod transfer;

pub use error::{Error, ErrorKind, Result};
