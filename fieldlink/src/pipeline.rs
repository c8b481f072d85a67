/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! One acquisition cycle: probe → read → forward → publish.
//!
//! ```text
//! ensure_connected?  (only when telemetry is enabled)
//!   for address in addresses:        (configured order)
//!       read ──► pulse ──► forward (per_address) ──► pulse
//!   forward (batched) ──► pulse
//!   publish?           (only when the probe succeeded)
//! ```
//!
//! Nothing in here can abort a cycle.  Every failure is mapped to an outcome
//! in the [`CycleReport`] and logged with an `error_kind` field.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::acquire::RegisterAcquirer;
use crate::error::PipelineError;
use crate::forward::FramedForwarder;
use crate::liveness::Liveness;
use crate::register::{Reading, RegisterAddress};
use crate::telemetry::Uplink;

// ── Report ────────────────────────────────────────────────────────────────────

/// What happened to this cycle's telemetry batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Telemetry is not configured.
    Disabled,
    /// The uplink probe failed; nothing was sent.
    SkippedOffline,
    Published,
    Failed,
}

impl PublishOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            PublishOutcome::Disabled => "disabled",
            PublishOutcome::SkippedOffline => "skipped_offline",
            PublishOutcome::Published => "published",
            PublishOutcome::Failed => "failed",
        }
    }
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// One reading per configured address, in acquisition order.
    pub readings: Vec<Reading>,
    pub frames_written: usize,
    pub frames_failed: usize,
    pub publish: PublishOutcome,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn available(&self) -> usize {
        self.readings
            .iter()
            .filter(|r| r.outcome.is_available())
            .count()
    }

    pub fn unavailable(&self) -> usize {
        self.readings.len() - self.available()
    }

    /// Values in address order, unavailable ones as the fallback value.
    pub fn values(&self) -> Vec<f32> {
        self.readings.iter().map(Reading::value_or_fallback).collect()
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

pub struct Pipeline {
    addresses: Vec<RegisterAddress>,
    acquirer: RegisterAcquirer,
    forwarder: Option<FramedForwarder>,
    uplink: Option<Uplink>,
}

impl Pipeline {
    pub fn new(
        addresses: Vec<RegisterAddress>,
        acquirer: RegisterAcquirer,
        forwarder: Option<FramedForwarder>,
        uplink: Option<Uplink>,
    ) -> Self {
        Self {
            addresses,
            acquirer,
            forwarder,
            uplink,
        }
    }

    pub fn addresses(&self) -> &[RegisterAddress] {
        &self.addresses
    }

    /// Run one full cycle, pulsing `liveness` between blocking steps.
    pub async fn run_cycle(&mut self, liveness: &mut dyn Liveness) -> CycleReport {
        let started = Instant::now();
        info!(addresses = self.addresses.len(), "--- acquisition cycle triggered ---");

        // ── Uplink probe ──────────────────────────────────────────────────────
        let online = match self.uplink.as_mut() {
            None => None,
            Some(uplink) => {
                let result = uplink.supervisor.ensure_connected().await;
                liveness.keep_alive();
                Some(match result {
                    Ok(()) => true,
                    Err(e) => {
                        let e = PipelineError::from(e);
                        warn!(error_kind = e.kind(), error = %e, "uplink down — publish skipped this cycle");
                        false
                    }
                })
            }
        };

        // ── Acquire + forward ─────────────────────────────────────────────────
        let mut readings = Vec::with_capacity(self.addresses.len());
        for &address in &self.addresses {
            let reading = self.acquirer.read(address).await;
            liveness.keep_alive();

            if let Some(fwd) = self.forwarder.as_mut() {
                fwd.accept(&reading).await;
                liveness.keep_alive();
            }
            readings.push(reading);
        }

        let (frames_written, frames_failed) = match self.forwarder.as_mut() {
            Some(fwd) => {
                fwd.finish_cycle().await;
                liveness.keep_alive();
                fwd.take_counters()
            }
            None => (0, 0),
        };

        // ── Publish ───────────────────────────────────────────────────────────
        let publish = match (self.uplink.as_mut(), online) {
            (Some(uplink), Some(true)) => {
                let values: Vec<f32> = readings.iter().map(Reading::value_or_fallback).collect();
                match uplink.publisher.publish(&values).await {
                    Ok(()) => PublishOutcome::Published,
                    Err(e) => {
                        let e = PipelineError::from(e);
                        warn!(error_kind = e.kind(), error = %e, "telemetry batch dropped");
                        PublishOutcome::Failed
                    }
                }
            }
            (Some(_), _) => PublishOutcome::SkippedOffline,
            (None, _) => PublishOutcome::Disabled,
        };

        let report = CycleReport {
            readings,
            frames_written,
            frames_failed,
            publish,
            elapsed: started.elapsed(),
        };

        info!(
            read_ok = report.available(),
            unavailable = report.unavailable(),
            frames_written = report.frames_written,
            frames_failed = report.frames_failed,
            publish = report.publish.as_str(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "=== cycle complete ==="
        );
        report
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
