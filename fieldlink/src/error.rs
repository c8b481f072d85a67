/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the acquisition pipeline.
//!
//! One enum per failure layer, each recovered at a different boundary:
//!
//! | Error | Raised by | Recovery |
//! |---|---|---|
//! | [`TransportError`] | one register read attempt | retry; after the budget → `Unavailable` |
//! | [`ForwardError`] | one frame write | logged, counted, cycle continues |
//! | [`NetworkError`] | connectivity probe | publish skipped for this cycle |
//! | [`PublishError`] | telemetry push | logged and discarded |
//! | [`LivenessError`] | watchdog pulse | logged; next pulse tries again |
//! | [`ConfigError`] | startup validation | fatal, process exits |
//!
//! [`PipelineError`] wraps the runtime layers so log sites can attach a stable
//! `error_kind` field without matching on every variant.
//!
//! **Do not** collapse these into `anyhow::Error` inside the pipeline — the
//! cycle branches on which layer failed.

use std::time::Duration;

use thiserror::Error;

use crate::register::RegisterAddress;

// ── Transport ─────────────────────────────────────────────────────────────────

/// A single register read attempt failed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing / CRC / protocol-level failure reported by the Modbus client.
    #[error("modbus protocol error: {0}")]
    Protocol(String),

    /// The device answered with a Modbus exception code.
    #[error("device exception: {0}")]
    Exception(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The device returned a different number of words than requested.
    #[error("expected {expected} register word(s), device returned {got}")]
    WordCount { expected: usize, got: usize },
}

// ── Forwarding ────────────────────────────────────────────────────────────────

/// Writing a frame to the outbound serial peer failed.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("frame write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame write did not complete within {0:?}")]
    Timeout(Duration),
}

// ── Network / telemetry ───────────────────────────────────────────────────────

/// The uplink required for publishing is not available.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("endpoint '{0}' has no host to probe")]
    InvalidEndpoint(String),

    #[error("cannot reach {endpoint}: {source}")]
    Unreachable {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connecting to {endpoint} timed out after {after:?}")]
    Timeout { endpoint: String, after: Duration },
}

/// The telemetry push did not complete.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("telemetry request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("nothing to publish — value list is empty")]
    NoValues,
}

// ── Liveness ──────────────────────────────────────────────────────────────────

/// A liveness pulse could not be delivered.
#[derive(Debug, Error)]
pub enum LivenessError {
    #[error("watchdog pulse to '{path}' failed: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// The configuration parsed but describes a station that cannot run safely.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no register addresses configured")]
    NoAddresses,

    #[error("register address {0} is listed more than once")]
    DuplicateAddress(RegisterAddress),

    #[error("retry.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("cycle.period_ms must be greater than zero")]
    ZeroPeriod,

    #[error("slave id {0} is outside the Modbus range 1..=247")]
    InvalidSlaveId(u8),

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error(
        "pulse interval {pulse:?} must be less than half the watchdog deadline {deadline:?}"
    )]
    UnsafePulseInterval { pulse: Duration, deadline: Duration },

    #[error(
        "worst-case blocking step '{step}' takes {worst_case:?}; with a {pulse:?} pulse interval \
         the watchdog deadline {deadline:?} could lapse"
    )]
    LivenessBudgetExceeded {
        step: &'static str,
        worst_case: Duration,
        pulse: Duration,
        deadline: Duration,
    },

    #[error("telemetry endpoint '{0}' is not a valid http(s) URL")]
    InvalidEndpoint(String),

    #[error("watchdog kind '{0}' needs a path")]
    MissingWatchdogPath(&'static str),
}

// ── Pipeline umbrella ─────────────────────────────────────────────────────────

/// Any runtime failure observed while driving the station.
///
/// `Unexpected` covers everything outside the named layers.  Such failures
/// are logged with context and the loop continues — they never suppress the
/// liveness pulse.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl From<LivenessError> for PipelineError {
    fn from(e: LivenessError) -> Self {
        PipelineError::Unexpected(e.to_string())
    }
}

impl PipelineError {
    /// Stable short name used as the `error_kind` log field.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Transport(_) => "transport",
            PipelineError::Forward(_) => "forward",
            PipelineError::Network(_) => "network",
            PipelineError::Publish(_) => "publish",
            PipelineError::Unexpected(_) => "unexpected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_error_kinds_are_stable() {
        let e: PipelineError = TransportError::Timeout(Duration::from_millis(5)).into();
        assert_eq!(e.kind(), "transport");

        let e: PipelineError = ForwardError::Timeout(Duration::from_millis(5)).into();
        assert_eq!(e.kind(), "forward");

        let e: PipelineError = PublishError::NoValues.into();
        assert_eq!(e.kind(), "publish");

        let e: PipelineError = LivenessError::Io {
            path: "/dev/watchdog".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        }
        .into();
        assert_eq!(e.kind(), "unexpected");
        assert!(e.to_string().contains("/dev/watchdog"));
    }

    #[test]
    fn word_count_message_names_both_counts() {
        let msg = TransportError::WordCount { expected: 2, got: 3 }.to_string();
        assert!(msg.contains('2') && msg.contains('3'), "{msg}");
    }
}
