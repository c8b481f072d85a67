/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Liveness pulses towards the external supervisor.
//!
//! The supervisor force-restarts the process when it hears nothing for the
//! configured deadline.  Only the contract matters to the pipeline: call
//! [`Liveness::keep_alive`] often enough.  Three implementations are selected
//! by [`WatchdogKind`]:
//!
//! | Kind | Pulse |
//! |---|---|
//! | `device` | one byte written to the Linux watchdog device |
//! | `heartbeat_file` | file rewritten with the current UNIX time |
//! | `disabled` | nothing (bench use) |
//!
//! The watchdog device is never closed with the magic `'V'` byte: once armed
//! it must keep being fed or the board restarts.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::runtime::Handle;
use tracing::{error, trace};

use crate::config::{WatchdogConfig, WatchdogKind};
use crate::error::{LivenessError, PipelineError};

/// Sink for liveness pulses.
///
/// Pulses are called from the async cycle and must return promptly; an
/// implementation that may block on I/O hands the work off (see
/// [`HeartbeatFile`]).
pub trait Liveness: Send {
    /// Deliver one pulse.
    fn pulse(&mut self) -> Result<(), LivenessError>;

    /// Deliver one pulse, logging instead of returning a failure.
    ///
    /// Call sites inside the cycle use this so that no error path can skip
    /// the pulse obligation.
    fn keep_alive(&mut self) {
        if let Err(e) = self.pulse() {
            let e = PipelineError::from(e);
            error!(error_kind = e.kind(), error = %e, "liveness pulse not delivered");
        }
    }
}

/// Builds the liveness sink described by `cfg`.
pub fn from_config(cfg: &WatchdogConfig) -> Result<Box<dyn Liveness>, LivenessError> {
    Ok(match (cfg.kind, cfg.path.as_deref()) {
        (WatchdogKind::Device, Some(path)) => Box::new(WatchdogDevice::open(path)?),
        (WatchdogKind::HeartbeatFile, Some(path)) => Box::new(HeartbeatFile::new(path)),
        _ => Box::new(Disabled),
    })
}

// ── Watchdog device ───────────────────────────────────────────────────────────

/// Linux watchdog character device.  Opening it arms the hardware timer.
///
/// A write to the device only resets the driver's timer and does not touch a
/// filesystem, so it is done inline.
#[derive(Debug)]
pub struct WatchdogDevice {
    path: PathBuf,
    file: File,
}

impl WatchdogDevice {
    pub fn open(path: &Path) -> Result<Self, LivenessError> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|source| LivenessError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

impl Liveness for WatchdogDevice {
    fn pulse(&mut self) -> Result<(), LivenessError> {
        self.file
            .write_all(b"\0")
            .and_then(|()| self.file.flush())
            .map_err(|source| LivenessError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        trace!("watchdog fed");
        Ok(())
    }
}

// ── Heartbeat file ────────────────────────────────────────────────────────────

/// Heartbeat file checked for freshness by an external supervisor.
///
/// Inside a tokio runtime the write runs on the blocking pool, so a stalled
/// filesystem cannot hold up the executor thread.  At most one write is in
/// flight; a pulse arriving while one is pending is folded into it.  Failures
/// of an offloaded write are logged by the background task.
#[derive(Debug, Clone)]
pub struct HeartbeatFile {
    path: PathBuf,
    in_flight: Arc<AtomicBool>,
}

impl HeartbeatFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    fn write_now(path: &Path) -> Result<(), LivenessError> {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        std::fs::write(path, format!("{secs}\n")).map_err(|source| LivenessError::Io {
            path: path.display().to_string(),
            source,
        })?;
        trace!(path = %path.display(), "heartbeat written");
        Ok(())
    }
}

impl Liveness for HeartbeatFile {
    fn pulse(&mut self) -> Result<(), LivenessError> {
        let Ok(runtime) = Handle::try_current() else {
            return Self::write_now(&self.path);
        };
        if self.in_flight.swap(true, Ordering::AcqRel) {
            trace!(path = %self.path.display(), "heartbeat write still pending");
            return Ok(());
        }

        let path = self.path.clone();
        let in_flight = Arc::clone(&self.in_flight);
        runtime.spawn_blocking(move || {
            if let Err(e) = Self::write_now(&path) {
                let e = PipelineError::from(e);
                error!(error_kind = e.kind(), error = %e, "liveness pulse not delivered");
            }
            in_flight.store(false, Ordering::Release);
        });
        Ok(())
    }
}

// ── Disabled ──────────────────────────────────────────────────────────────────

/// No supervisor attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

impl Liveness for Disabled {
    fn pulse(&mut self) -> Result<(), LivenessError> {
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
