/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Fieldlink – field register poller and relay
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── config/         – YAML station configuration + liveness budget checks
//! ├── register        – addresses, register pairs, IEEE-754 decoding
//! ├── acquire/        – bounded-retry reads over the Modbus RTU transport
//! ├── frame           – outbound ASCII frame encoding / parsing
//! ├── forward         – per-address / batched frame forwarding
//! ├── telemetry       – connectivity probe + HTTP telemetry push
//! ├── liveness        – watchdog device / heartbeat file pulses
//! ├── pipeline        – one acquisition cycle end to end
//! ├── scheduler/      – period state machine + the station loop
//! ├── serial          – serial port opening
//! └── error           – typed error layers
//! ```

pub mod acquire;
pub mod config;
pub mod error;
pub mod forward;
pub mod frame;
pub mod liveness;
pub mod pipeline;
pub mod register;
pub mod scheduler;
pub mod serial;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;
