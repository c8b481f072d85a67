/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Opening serial ports from [`SerialConfig`].

use tokio_serial::{DataBits, SerialPortBuilderExt, SerialStream, StopBits};

use crate::config::{Parity, SerialConfig};

/// Open `cfg.port` as an async serial stream with the configured line settings.
pub fn open(cfg: &SerialConfig) -> tokio_serial::Result<SerialStream> {
    tokio_serial::new(&cfg.port, cfg.baud_rate)
        .data_bits(data_bits(cfg.data_bits))
        .parity(parity(cfg.parity))
        .stop_bits(stop_bits(cfg.stop_bits))
        .open_native_async()
}

/// Unsupported widths fall back to 8 bits, the only width Modbus RTU uses.
fn data_bits(bits: u8) -> DataBits {
    match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}

fn parity(p: Parity) -> tokio_serial::Parity {
    match p {
        Parity::None => tokio_serial::Parity::None,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::Even => tokio_serial::Parity::Even,
    }
}

fn stop_bits(bits: u8) -> StopBits {
    if bits == 2 {
        StopBits::Two
    } else {
        StopBits::One
    }
}
