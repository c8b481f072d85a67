/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Hand-written fakes for the pipeline seams (test builds only).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{ForwardError, LivenessError, NetworkError, PublishError, TransportError};
use crate::forward::FrameSink;
use crate::frame::Frame;
use crate::liveness::Liveness;
use crate::register::RegisterAddress;
use crate::telemetry::{ConnectivitySupervisor, TelemetryPublisher};

// ── Transport ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Script {
    /// Failures to return before answering; `None` = fail forever.
    fail_first: Option<u32>,
    words: Vec<u16>,
}

/// Transport answering from a per-address script.  Unscripted addresses fail.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: HashMap<u16, Script>,
    failures: HashMap<u16, u32>,
    calls: Arc<Mutex<Vec<(u8, u16, u16)>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, address: RegisterAddress, words: Vec<u16>) -> Self {
        self.fail_first(address, 0, words)
    }

    pub fn fail_first(mut self, address: RegisterAddress, k: u32, words: Vec<u16>) -> Self {
        self.scripts.insert(
            address.get(),
            Script {
                fail_first: Some(k),
                words,
            },
        );
        self
    }

    pub fn always_fail(mut self, address: RegisterAddress) -> Self {
        self.scripts.insert(
            address.get(),
            Script {
                fail_first: None,
                words: Vec::new(),
            },
        );
        self
    }

    /// Shared log of `(slave_id, address, count)` for every call.
    pub fn calls(&self) -> Arc<Mutex<Vec<(u8, u16, u16)>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl crate::acquire::RegisterTransport for ScriptedTransport {
    async fn read_holding_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        self.calls.lock().unwrap().push((slave_id, address, count));

        let no_response = || TransportError::Io(std::io::ErrorKind::TimedOut.into());
        let script = self.scripts.get(&address).ok_or_else(no_response)?;
        let failed = self.failures.entry(address).or_insert(0);

        match script.fail_first {
            Some(k) if *failed >= k => Ok(script.words.clone()),
            _ => {
                *failed += 1;
                Err(no_response())
            }
        }
    }
}

// ── Frame sink ────────────────────────────────────────────────────────────────

/// Records every frame written; optionally fails every write.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub frames: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn write_frame(&mut self, frame: &Frame) -> Result<(), ForwardError> {
        if self.fail {
            return Err(ForwardError::Io(std::io::ErrorKind::BrokenPipe.into()));
        }
        self.frames.lock().unwrap().push(frame.as_str().to_string());
        Ok(())
    }
}

// ── Telemetry ─────────────────────────────────────────────────────────────────

/// Records every publish attempt; every attempt fails when `fail` is set.
#[derive(Debug, Default, Clone)]
pub struct RecordingPublisher {
    pub batches: Arc<Mutex<Vec<Vec<f32>>>>,
    pub fail: bool,
}

#[async_trait]
impl TelemetryPublisher for RecordingPublisher {
    async fn publish(&mut self, values: &[f32]) -> Result<(), PublishError> {
        self.batches.lock().unwrap().push(values.to_vec());
        if self.fail {
            return Err(PublishError::NoValues);
        }
        Ok(())
    }
}

/// Supervisor with a fixed answer.
#[derive(Debug, Clone)]
pub struct StaticSupervisor {
    pub online: bool,
    pub probes: Arc<AtomicUsize>,
}

impl StaticSupervisor {
    pub fn new(online: bool) -> Self {
        Self {
            online,
            probes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ConnectivitySupervisor for StaticSupervisor {
    async fn ensure_connected(&mut self) -> Result<(), NetworkError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.online {
            Ok(())
        } else {
            Err(NetworkError::Unreachable {
                endpoint: "test:80".into(),
                source: std::io::ErrorKind::ConnectionRefused.into(),
            })
        }
    }
}

// ── Liveness ──────────────────────────────────────────────────────────────────

/// Counts pulses.
#[derive(Debug, Default, Clone)]
pub struct CountingLiveness {
    pub pulses: Arc<AtomicUsize>,
}

impl CountingLiveness {
    pub fn count(&self) -> usize {
        self.pulses.load(Ordering::SeqCst)
    }
}

impl Liveness for CountingLiveness {
    fn pulse(&mut self) -> Result<(), LivenessError> {
        self.pulses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
