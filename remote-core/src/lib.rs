#![no_std]

// Power-state orchestration for a BLE HID projector remote bridged to MQTT.
//
// The crate stays portable across the ESP32 firmware and the host emulator by
// avoiding the Rust standard library. Radio, broker and timer access are
// expressed as traits the other crates implement.

pub mod beacon;
pub mod bonding;
pub mod command;
pub mod config;
pub mod context;
pub mod hid;
pub mod link;
pub mod orchestrator;
pub mod reconciler;
pub mod status;
pub mod telemetry;
pub mod toggle;
