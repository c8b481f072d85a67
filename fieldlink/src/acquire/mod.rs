/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Bounded-retry register acquisition.
//!
//! [`RegisterAcquirer::read`] turns a flaky request/response link into a
//! definite per-address outcome.  Transport errors never cross this boundary:
//! after the [`RetryBudget`] is spent the address is reported as
//! [`Acquisition::Unavailable`] and the cycle moves on.
//!
//! ```text
//! attempt 1 ──✗── sleep(delay) ── attempt 2 ──✗── sleep(delay) ── attempt 3 ──✗──► Unavailable
//!     └──✓──► Acquired { pair, attempts: 1 }
//! ```
//!
//! There is no sleep after the final failed attempt.

pub mod transport;

pub use transport::{ModbusRtuTransport, RegisterTransport};

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::StationConfig;
use crate::register::{Acquisition, RegisterAddress, RegisterPair, Reading, PAIR_WORDS};

// ── RetryBudget ───────────────────────────────────────────────────────────────

/// How hard to try one address before giving up.  Applies per address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    max_attempts: u32,
    delay: Duration,
}

impl RetryBudget {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

// ── RegisterAcquirer ──────────────────────────────────────────────────────────

/// Reads register pairs from one slave through an owned transport.
///
/// The transport is the single shared resource of the station; owning it here
/// makes every read sequential by construction.
pub struct RegisterAcquirer {
    transport: Box<dyn RegisterTransport>,
    slave_id: u8,
    budget: RetryBudget,
}

impl RegisterAcquirer {
    pub fn new(transport: Box<dyn RegisterTransport>, slave_id: u8, budget: RetryBudget) -> Self {
        Self {
            transport,
            slave_id,
            budget,
        }
    }

    pub fn from_config(transport: Box<dyn RegisterTransport>, cfg: &StationConfig) -> Self {
        Self::new(
            transport,
            cfg.device.slave_id,
            RetryBudget::new(cfg.retry.max_attempts, cfg.retry_delay()),
        )
    }

    pub fn budget(&self) -> RetryBudget {
        self.budget
    }

    /// Read the pair at `address`, retrying within the budget.
    pub async fn read(&mut self, address: RegisterAddress) -> Reading {
        let max = self.budget.max_attempts;

        for attempt in 1..=max {
            debug!(%address, attempt, "reading holding registers");

            let result = self
                .transport
                .read_holding_registers(self.slave_id, address.get(), PAIR_WORDS)
                .await
                .and_then(|words| RegisterPair::try_from(words.as_slice()));

            match result {
                Ok(pair) => {
                    debug!(
                        %address,
                        attempt,
                        high = pair.high,
                        low = pair.low,
                        "registers read"
                    );
                    return Reading {
                        address,
                        outcome: Acquisition::Acquired {
                            pair,
                            attempts: attempt,
                        },
                    };
                }
                Err(e) => {
                    warn!(%address, attempt, max_attempts = max, error = %e, "register read failed");
                    if attempt < max {
                        sleep(self.budget.delay).await;
                    }
                }
            }
        }

        warn!(%address, attempts = max, "giving up on address for this cycle");
        Reading {
            address,
            outcome: Acquisition::Unavailable { attempts: max },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
