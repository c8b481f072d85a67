/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Framed forwarding of readings to the outbound serial peer.
//!
//! | Policy | When a frame is written | Unavailable addresses |
//! |---|---|---|
//! | `per_address` | right after each read | skipped (no frame) |
//! | `batched` | once, after every address was attempted | fallback payload |
//!
//! Every write is one call bounded by the sink's timeout.  A failed write is
//! logged and counted; it never aborts the cycle.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{ForwardConfig, ForwardPolicy, FrameFormat};
use crate::error::{ForwardError, PipelineError};
use crate::frame::{Frame, FrameEntry};
use crate::register::Reading;

// ── FrameSink ─────────────────────────────────────────────────────────────────

/// Destination of encoded frames.
#[async_trait]
pub trait FrameSink: Send {
    async fn write_frame(&mut self, frame: &Frame) -> Result<(), ForwardError>;
}

/// Any async writer (serial port, pipe, buffer) with a per-frame timeout.
pub struct WriterSink<W> {
    writer: W,
    timeout: Duration,
}

impl<W> WriterSink<W> {
    pub fn new(writer: W, timeout: Duration) -> Self {
        Self { writer, timeout }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> FrameSink for WriterSink<W> {
    async fn write_frame(&mut self, frame: &Frame) -> Result<(), ForwardError> {
        let limit = self.timeout;
        let writer = &mut self.writer;
        let write = async move {
            writer.write_all(frame.as_bytes()).await?;
            writer.flush().await
        };
        timeout(limit, write)
            .await
            .map_err(|_| ForwardError::Timeout(limit))??;
        Ok(())
    }
}

// ── FramedForwarder ───────────────────────────────────────────────────────────

/// Turns readings into frames according to the configured policy and format.
pub struct FramedForwarder {
    sink: Box<dyn FrameSink>,
    policy: ForwardPolicy,
    format: FrameFormat,
    /// Entries held back until [`finish_cycle`](Self::finish_cycle) in batched mode.
    pending: Vec<FrameEntry>,
    written: usize,
    failed: usize,
}

impl FramedForwarder {
    pub fn new(sink: Box<dyn FrameSink>, policy: ForwardPolicy, format: FrameFormat) -> Self {
        Self {
            sink,
            policy,
            format,
            pending: Vec::new(),
            written: 0,
            failed: 0,
        }
    }

    pub fn from_config(sink: Box<dyn FrameSink>, cfg: &ForwardConfig) -> Self {
        Self::new(sink, cfg.policy, cfg.format)
    }

    pub fn policy(&self) -> ForwardPolicy {
        self.policy
    }

    fn entry_for(&self, reading: &Reading) -> FrameEntry {
        match self.format {
            FrameFormat::Raw => FrameEntry::raw(reading.address, reading.outcome.pair()),
            FrameFormat::Decoded => FrameEntry::decoded(reading.address, reading.value()),
        }
    }

    /// Accept one reading, in acquisition order.
    pub async fn accept(&mut self, reading: &Reading) {
        match self.policy {
            ForwardPolicy::PerAddress => {
                if reading.outcome.is_available() {
                    let entry = self.entry_for(reading);
                    self.emit(&[entry]).await;
                } else {
                    debug!(address = %reading.address, "unavailable — no frame in per_address mode");
                }
            }
            ForwardPolicy::Batched => {
                let entry = self.entry_for(reading);
                self.pending.push(entry);
            }
        }
    }

    /// Close the cycle: writes the batched frame, if any.
    pub async fn finish_cycle(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let entries = std::mem::take(&mut self.pending);
        self.emit(&entries).await;
    }

    /// Encode `entries` as one frame and write it.
    pub async fn emit(&mut self, entries: &[FrameEntry]) -> bool {
        let frame = Frame::encode(entries);
        match self.sink.write_frame(&frame).await {
            Ok(()) => {
                self.written += 1;
                info!(frame = %frame, "frame forwarded");
                true
            }
            Err(e) => {
                self.failed += 1;
                let e = PipelineError::from(e);
                warn!(error_kind = e.kind(), error = %e, frame = %frame, "frame not forwarded");
                false
            }
        }
    }

    /// Returns and resets `(written, failed)` frame counters.
    pub fn take_counters(&mut self) -> (usize, usize) {
        let counters = (self.written, self.failed);
        self.written = 0;
        self.failed = 0;
        counters
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
