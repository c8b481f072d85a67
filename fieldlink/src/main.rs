/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use fieldlink::acquire::{ModbusRtuTransport, RegisterAcquirer};
use fieldlink::config::{StationConfig, WatchdogKind};
use fieldlink::forward::{FramedForwarder, WriterSink};
use fieldlink::liveness;
use fieldlink::pipeline::Pipeline;
use fieldlink::scheduler::Station;
use fieldlink::serial;
use fieldlink::telemetry::Uplink;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Fieldlink – polls Modbus RTU registers and relays them to a serial peer
/// and/or a telemetry endpoint.
///
/// Example:
///   fieldlink --config configs/thingspeak_relay.yaml
#[derive(Debug, Parser)]
#[command(name = "fieldlink", about = "Fieldlink register poller and relay", long_about = None)]
struct Cli {
    /// Path to the YAML station configuration file.
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Validate the configuration, print a summary and exit.
    #[arg(long = "check", default_value_t = false)]
    check: bool,

    /// Run a single cycle immediately, then exit.
    #[arg(long = "once", default_value_t = false)]
    once: bool,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    info!("Fieldlink starting up...");

    // ── Load configuration ────────────────────────────────────────────────────
    let config = match StationConfig::load_from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load station configuration: {:#}", e);
            process::exit(1);
        }
    };
    log_summary(&config);

    if cli.check {
        info!("Configuration OK");
        return;
    }

    if let Err(e) = run(&config, cli.once).await {
        error!("Fieldlink stopped: {:#}", e);
        process::exit(1);
    }
}

/// Open every collaborator and drive the station.
async fn run(config: &StationConfig, once: bool) -> Result<()> {
    let transport = ModbusRtuTransport::open(&config.device)
        .with_context(|| format!("Cannot open device port {}", config.device.serial.port))?;
    let acquirer = RegisterAcquirer::from_config(Box::new(transport), config);

    let forwarder = match &config.forward {
        Some(fwd) => {
            let port = serial::open(&fwd.serial)
                .with_context(|| format!("Cannot open forward port {}", fwd.serial.port))?;
            let sink = WriterSink::new(port, Duration::from_millis(fwd.write_timeout_ms));
            Some(FramedForwarder::from_config(Box::new(sink), fwd))
        }
        None => None,
    };

    let uplink = match config.telemetry.as_ref().filter(|t| t.enabled) {
        Some(tel) => Some(Uplink::from_config(tel).context("Cannot set up telemetry uplink")?),
        None => None,
    };

    let pipeline = Pipeline::new(
        config.device.addresses.clone(),
        acquirer,
        forwarder,
        uplink,
    );

    let pulses = liveness::from_config(&config.watchdog).context("Cannot arm watchdog")?;
    if config.watchdog.kind == WatchdogKind::Disabled {
        warn!("Watchdog disabled — no external liveness supervision");
    }

    let mut station = Station::from_config(config, pipeline, pulses);
    if once {
        let report = station.run_once().await;
        info!(
            read_ok = report.available(),
            unavailable = report.unavailable(),
            "single cycle done"
        );
        return Ok(());
    }

    station.run().await;
    Ok(())
}

fn log_summary(config: &StationConfig) {
    let addresses: Vec<String> = config
        .device
        .addresses
        .iter()
        .map(ToString::to_string)
        .collect();

    info!(
        device_port = %config.device.serial.port,
        baud        = config.device.serial.baud_rate,
        slave_id    = config.device.slave_id,
        period_ms   = config.cycle.period_ms,
        attempts    = config.retry.max_attempts,
        retry_ms    = config.retry.delay_ms,
        "Configuration"
    );
    info!("Polling {} address(es): {}", addresses.len(), addresses.join(", "));

    match &config.forward {
        Some(fwd) => info!(
            port   = %fwd.serial.port,
            policy = ?fwd.policy,
            format = ?fwd.format,
            "Forwarding frames"
        ),
        None => info!("No serial peer configured"),
    }
    match config.telemetry.as_ref().filter(|t| t.enabled) {
        Some(tel) => info!(endpoint = %tel.endpoint, "Publishing telemetry"),
        None => info!("Telemetry disabled"),
    }
    for (step, worst_case) in config.blocking_steps() {
        info!(
            "  worst case {step}: {}ms (deadline {}ms)",
            worst_case.as_millis(),
            config.watchdog.deadline_ms
        );
    }
}
