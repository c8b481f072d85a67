/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! frame-monitor — stands in for the serial peer that receives Fieldlink frames.
//!
//! Reads newline-terminated frames from a serial port (or stdin when no port
//! is given), parses each one and logs every entry with its decoded value.
//!
//! Usage:
//!   frame-monitor --port /dev/ttyUSB1 --baud 9600
//!   cat captured_frames.txt | frame-monitor

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_serial::SerialPortBuilderExt;
use tracing::{info, warn};

use fieldlink::frame::{parse_frame, ParsedEntry};

#[derive(Debug, Parser)]
#[command(name = "frame-monitor", about = "Log and decode Fieldlink serial frames")]
struct Cli {
    /// Serial port to listen on; stdin when omitted.
    #[arg(short = 'p', long = "port")]
    port: Option<String>,

    /// Baud rate of the serial port.
    #[arg(short = 'b', long = "baud", default_value_t = 9600)]
    baud: u32,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.port {
        Some(port) => {
            let stream = tokio_serial::new(port, cli.baud)
                .open_native_async()
                .with_context(|| format!("Cannot open {port}"))?;
            info!(port = %port, baud = cli.baud, "listening for frames");
            monitor(stream).await
        }
        None => {
            info!("listening for frames on stdin");
            monitor(tokio::io::stdin()).await
        }
    }
}

async fn monitor<R: AsyncRead + Unpin>(reader: R) -> Result<()> {
    let mut lines = BufReader::new(reader).lines();
    let mut frames = 0u64;
    let mut rejected = 0u64;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_frame(&line) {
            Ok(entries) => {
                frames += 1;
                for entry in &entries {
                    match entry {
                        ParsedEntry::Raw { address, pair } => info!(
                            frame = frames,
                            %address,
                            high = pair.high,
                            low = pair.low,
                            value = entry.value(),
                            "raw entry"
                        ),
                        ParsedEntry::Decoded { address, value } => {
                            info!(frame = frames, %address, value, "decoded entry")
                        }
                    }
                }
            }
            Err(e) => {
                rejected += 1;
                warn!(line = %line, error = %e, "not a frame");
            }
        }
    }

    info!(frames, rejected, "input closed");
    Ok(())
}
