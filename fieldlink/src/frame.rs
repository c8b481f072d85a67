/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Outbound serial frame format.
//!
//! A frame is one ASCII line:
//!
//! ```text
//! <ENTRY,ENTRY,...>\n
//!
//! raw entry      AAAA:HHHH,LLLL     address, high word, low word (uppercase hex)
//! decoded entry  AAAA:F.FFFF        address, value with 4 decimals
//! ```
//!
//! Examples: `<0BCD:1234,5678>\n`, `<0BCD:3.1416,0BCF:0.0000>\n`.
//! Unavailable addresses carry the fallback payload (`0000,0000` or
//! `0.0000`) so a batched frame always lists every configured address.

use std::fmt::{self, Write as _};

use thiserror::Error;

use crate::register::{RegisterAddress, RegisterPair, FALLBACK_VALUE};

const START: char = '<';
const END: char = '>';

// ── Entries ───────────────────────────────────────────────────────────────────

/// What one entry carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    Raw(Option<RegisterPair>),
    Decoded(Option<f32>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameEntry {
    pub address: RegisterAddress,
    pub payload: Payload,
}

impl FrameEntry {
    pub fn raw(address: RegisterAddress, pair: Option<RegisterPair>) -> Self {
        Self {
            address,
            payload: Payload::Raw(pair),
        }
    }

    pub fn decoded(address: RegisterAddress, value: Option<f32>) -> Self {
        Self {
            address,
            payload: Payload::Decoded(value),
        }
    }

    fn write_to(&self, out: &mut String) {
        // Writing into a String cannot fail.
        let _ = write!(out, "{:04X}:", self.address.get());
        let _ = match self.payload {
            Payload::Raw(pair) => {
                let p = pair.unwrap_or(RegisterPair::new(0, 0));
                write!(out, "{:04X},{:04X}", p.high, p.low)
            }
            Payload::Decoded(value) => write!(out, "{:.4}", value.unwrap_or(FALLBACK_VALUE)),
        };
    }
}

// ── Frame ─────────────────────────────────────────────────────────────────────

/// One encoded, newline-terminated frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(String);

impl Frame {
    /// Encode `entries` in order.
    pub fn encode(entries: &[FrameEntry]) -> Self {
        let mut out = String::with_capacity(2 + entries.len() * 16);
        out.push(START);
        for (i, entry) in entries.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            entry.write_to(&mut out);
        }
        out.push(END);
        out.push('\n');
        Frame(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Displays the frame without its terminating newline (for log lines).
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.trim_end_matches('\n'))
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Why a line is not a valid frame.
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("frame must start with '<' and end with '>'")]
    Delimiters,
    #[error("frame has no entries")]
    Empty,
    #[error("malformed entry '{0}'")]
    Entry(String),
}

/// One entry recovered from a received frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedEntry {
    Raw {
        address: RegisterAddress,
        pair: RegisterPair,
    },
    Decoded {
        address: RegisterAddress,
        value: f32,
    },
}

impl ParsedEntry {
    pub fn address(&self) -> RegisterAddress {
        match self {
            ParsedEntry::Raw { address, .. } | ParsedEntry::Decoded { address, .. } => *address,
        }
    }

    /// Engineering value: decoded directly or reassembled from the raw pair.
    pub fn value(&self) -> f32 {
        match self {
            ParsedEntry::Raw { pair, .. } => pair.decode(),
            ParsedEntry::Decoded { value, .. } => *value,
        }
    }
}

/// Parse one received line (trailing `\n` / `\r\n` optional).
///
/// Entries are separated by `,`; a token without `:` is the low word of the
/// raw entry before it.
pub fn parse_frame(line: &str) -> Result<Vec<ParsedEntry>, FrameError> {
    let body = line
        .trim_end_matches(['\r', '\n'])
        .strip_prefix(START)
        .and_then(|s| s.strip_suffix(END))
        .ok_or(FrameError::Delimiters)?;
    if body.is_empty() {
        return Err(FrameError::Empty);
    }

    let mut entries = Vec::new();
    let mut tokens = body.split(',').peekable();

    while let Some(token) = tokens.next() {
        let bad = || FrameError::Entry(token.to_string());
        let (addr, first) = token.split_once(':').ok_or_else(bad)?;
        let address = hex_word(addr).map(RegisterAddress::new).ok_or_else(bad)?;

        let low = match tokens.peek() {
            Some(next) if !next.contains(':') => tokens.next(),
            _ => None,
        };

        let entry = match low {
            Some(low) => {
                let (high, low) = hex_word(first)
                    .zip(hex_word(low))
                    .ok_or_else(|| FrameError::Entry(format!("{token},{low}")))?;
                ParsedEntry::Raw {
                    address,
                    pair: RegisterPair::new(high, low),
                }
            }
            None => ParsedEntry::Decoded {
                address,
                value: first.parse::<f32>().map_err(|_| bad())?,
            },
        };
        entries.push(entry);
    }

    Ok(entries)
}

/// Exactly four hex digits, no sign.
fn hex_word(s: &str) -> Option<u16> {
    if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(s, 16).ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
