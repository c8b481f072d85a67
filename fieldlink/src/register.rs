/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Register-level data model shared by the whole pipeline.
//!
//! ```text
//! device ──(2 × u16)──►  RegisterPair  ──(decode)──►  f32  ──►  Frame / telemetry
//!                         ↑ exactly two words            ↑ big-endian IEEE-754
//! ```
//!
//! # Word order
//! The field device stores one 32-bit float across two consecutive holding
//! registers with the **high** word first.  The pair is reassembled as
//! `(high << 16) | low` and those four bytes, read big-endian, are the
//! IEEE-754 single-precision value.  Any other order produces garbage, so the
//! order lives in exactly one place: [`RegisterPair::decode`].

use std::fmt;

use serde::{Deserialize, Deserializer};

use crate::error::TransportError;

/// Number of words requested by every register read.
pub const PAIR_WORDS: u16 = 2;

/// Value published for an address that could not be read this cycle.
pub const FALLBACK_VALUE: f32 = 0.0;

// ── RegisterAddress ───────────────────────────────────────────────────────────

/// Protocol-level start address of one register pair on the field device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegisterAddress(u16);

impl RegisterAddress {
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u16 {
        self.0
    }

    /// Parse `0x`-prefixed hex (`"0x0BCD"`) or plain decimal (`"3021"`).
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let parsed = match text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
        {
            Some(hex) => u16::from_str_radix(hex, 16).ok(),
            None => text.parse::<u16>().ok(),
        };
        parsed.map(Self)
    }
}

impl From<u16> for RegisterAddress {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RegisterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Accepts either a YAML integer or a hex/decimal string.
impl<'de> Deserialize<'de> for RegisterAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u16),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(Self(n)),
            Repr::Text(s) => Self::parse(&s).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid register address '{s}'"))
            }),
        }
    }
}

// ── RegisterPair ──────────────────────────────────────────────────────────────

/// The two words returned by one successful read, high word first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterPair {
    pub high: u16,
    pub low: u16,
}

impl RegisterPair {
    pub const fn new(high: u16, low: u16) -> Self {
        Self { high, low }
    }

    /// The 32-bit word `(high << 16) | low`.
    pub const fn combined(self) -> u32 {
        ((self.high as u32) << 16) | self.low as u32
    }

    /// Reinterpret the pair as a big-endian IEEE-754 single.
    ///
    /// Total: NaN and infinity bit patterns come back unmodified.
    pub fn decode(self) -> f32 {
        f32::from_be_bytes(self.combined().to_be_bytes())
    }
}

/// A response is only a pair when it holds exactly [`PAIR_WORDS`] words.
impl TryFrom<&[u16]> for RegisterPair {
    type Error = TransportError;

    fn try_from(words: &[u16]) -> Result<Self, Self::Error> {
        match *words {
            [high, low] => Ok(Self { high, low }),
            _ => Err(TransportError::WordCount {
                expected: PAIR_WORDS as usize,
                got: words.len(),
            }),
        }
    }
}

// ── Reading ───────────────────────────────────────────────────────────────────

/// Outcome of acquiring one address, after the retry budget is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acquisition {
    /// Read succeeded on attempt number `attempts` (1-based).
    Acquired { pair: RegisterPair, attempts: u32 },
    /// Every attempt failed.
    Unavailable { attempts: u32 },
}

impl Acquisition {
    pub fn pair(&self) -> Option<RegisterPair> {
        match self {
            Acquisition::Acquired { pair, .. } => Some(*pair),
            Acquisition::Unavailable { .. } => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Acquisition::Acquired { attempts, .. } | Acquisition::Unavailable { attempts } => {
                *attempts
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.pair().is_some()
    }
}

/// One address together with its acquisition outcome for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub address: RegisterAddress,
    pub outcome: Acquisition,
}

impl Reading {
    /// Decoded engineering value, `None` when the address was unavailable.
    pub fn value(&self) -> Option<f32> {
        self.outcome.pair().map(RegisterPair::decode)
    }

    /// Decoded value with unavailable addresses mapped to [`FALLBACK_VALUE`].
    pub fn value_or_fallback(&self) -> f32 {
        self.value().unwrap_or(FALLBACK_VALUE)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
