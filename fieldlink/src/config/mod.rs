/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Station configuration loading and validation.
//!
//! The whole station is described by one YAML file, parsed once at startup
//! into an immutable [`StationConfig`] that is passed explicitly to every
//! component.  Nothing reads configuration from process-wide state.
//!
//! The expected YAML structure is:
//! ```yaml
//! cycle:
//!   period_ms: 30000
//! device:
//!   serial: { port: /dev/ttyUSB0, baud_rate: 19200 }
//!   slave_id: 1
//!   addresses: ["0x0BCD", "0x0BCF", "0x0BD1", "0x0BF5"]
//! retry:
//!   max_attempts: 3
//!   delay_ms: 100
//! forward:
//!   serial: { port: /dev/ttyS1, baud_rate: 9600 }
//!   policy: per_address
//!   format: raw
//! telemetry:
//!   endpoint: "http://api.thingspeak.com/update"
//!   api_key: "XXXXXXXXXXXXXXXX"
//! watchdog:
//!   kind: device
//!   path: /dev/watchdog
//!   deadline_ms: 60000
//!   pulse_interval_ms: 1000
//! ```
//!
//! Every section except `device` is optional; absent values fall back to the
//! reference field configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::register::RegisterAddress;

// ── Serde defaults ────────────────────────────────────────────────────────────

fn default_period_ms() -> u64 {
    30_000
}
fn default_baud_rate() -> u32 {
    9_600
}
fn default_data_bits() -> u8 {
    8
}
fn default_stop_bits() -> u8 {
    1
}
fn default_slave_id() -> u8 {
    1
}
fn default_read_timeout_ms() -> u64 {
    1_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    100
}
fn default_write_timeout_ms() -> u64 {
    500
}
fn default_true() -> bool {
    true
}
fn default_publish_timeout_ms() -> u64 {
    10_000
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_deadline_ms() -> u64 {
    60_000
}
fn default_pulse_interval_ms() -> u64 {
    1_000
}

// ── Serial line ───────────────────────────────────────────────────────────────

/// Parity setting of a serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// One serial port and its line settings (8N1 unless stated otherwise).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
}

// ── Sections ──────────────────────────────────────────────────────────────────

/// Timing of the acquisition cycle.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CycleConfig {
    /// Time from the end of one cycle to the start of the next.
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    /// Fire the first cycle immediately instead of after one full period.
    #[serde(default)]
    pub run_on_start: bool,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            run_on_start: false,
        }
    }
}

/// The field device polled over Modbus RTU.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceConfig {
    pub serial: SerialConfig,
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,
    /// Upper bound on a single read request/response exchange.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Register pairs to poll, in acquisition order.
    pub addresses: Vec<RegisterAddress>,
}

/// Per-address retry budget.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

/// When frames are written to the serial peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardPolicy {
    /// One frame immediately after each successful read.
    #[default]
    PerAddress,
    /// One frame per cycle holding every address.
    Batched,
}

/// What each frame entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameFormat {
    /// Register words as hex: `0BCD:4049,0FDB`.
    #[default]
    Raw,
    /// Decoded float with 4 decimals: `0BCD:3.1416`.
    Decoded,
}

/// Outbound serial peer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForwardConfig {
    pub serial: SerialConfig,
    #[serde(default)]
    pub policy: ForwardPolicy,
    #[serde(default)]
    pub format: FrameFormat,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

/// Remote telemetry endpoint (ThingSpeak-style `update` API).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub endpoint: String,
    pub api_key: String,
    /// Whole-request timeout for one publish.
    #[serde(default = "default_publish_timeout_ms")]
    pub timeout_ms: u64,
    /// Timeout of the connectivity probe run before publishing.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// How liveness pulses are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchdogKind {
    /// Linux watchdog character device (`/dev/watchdog`).
    Device,
    /// A file rewritten with the current UNIX time on every pulse.
    HeartbeatFile,
    /// No external supervisor (bench use).
    #[default]
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WatchdogConfig {
    #[serde(default)]
    pub kind: WatchdogKind,
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Maximum silence before the supervisor restarts the process.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    /// Longest gap the station leaves between two pulses while idle.
    #[serde(default = "default_pulse_interval_ms")]
    pub pulse_interval_ms: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            kind: WatchdogKind::default(),
            path: None,
            deadline_ms: default_deadline_ms(),
            pulse_interval_ms: default_pulse_interval_ms(),
        }
    }
}

// ── StationConfig ─────────────────────────────────────────────────────────────

/// Complete, validated station configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StationConfig {
    #[serde(default)]
    pub cycle: CycleConfig,
    pub device: DeviceConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub forward: Option<ForwardConfig>,
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
}

impl StationConfig {
    /// Reads, parses and validates `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, the YAML is structurally
    /// invalid, or [`validate`](Self::validate) rejects the contents.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading station configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid configuration file: {}", path.display()))
    }

    /// Parses and validates an in-memory YAML document.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: StationConfig =
            serde_yaml::from_str(content).context("Failed to parse YAML")?;
        config.validate()?;

        debug!(
            addresses = config.device.addresses.len(),
            period_ms = config.cycle.period_ms,
            forward = config.forward.is_some(),
            telemetry = config.telemetry_enabled(),
            "configuration validated"
        );
        Ok(config)
    }

    /// Checks every cross-field constraint, including the liveness budget.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.addresses.is_empty() {
            return Err(ConfigError::NoAddresses);
        }
        let mut seen = HashSet::new();
        for addr in &self.device.addresses {
            if !seen.insert(*addr) {
                return Err(ConfigError::DuplicateAddress(*addr));
            }
        }

        if !(1..=247).contains(&self.device.slave_id) {
            return Err(ConfigError::InvalidSlaveId(self.device.slave_id));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.cycle.period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if self.device.read_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout {
                field: "device.read_timeout_ms",
            });
        }
        if let Some(fwd) = &self.forward {
            if fwd.write_timeout_ms == 0 {
                return Err(ConfigError::ZeroTimeout {
                    field: "forward.write_timeout_ms",
                });
            }
        }
        if let Some(tel) = self.telemetry.as_ref().filter(|t| t.enabled) {
            validate_endpoint(&tel.endpoint)?;
            if tel.timeout_ms == 0 || tel.connect_timeout_ms == 0 {
                return Err(ConfigError::ZeroTimeout {
                    field: "telemetry.timeout_ms / telemetry.connect_timeout_ms",
                });
            }
        }

        match self.watchdog.kind {
            WatchdogKind::Device if self.watchdog.path.is_none() => {
                return Err(ConfigError::MissingWatchdogPath("device"))
            }
            WatchdogKind::HeartbeatFile if self.watchdog.path.is_none() => {
                return Err(ConfigError::MissingWatchdogPath("heartbeat_file"))
            }
            _ => {}
        }

        let pulse = self.pulse_interval();
        let deadline = self.liveness_deadline();
        if pulse.is_zero() || pulse.saturating_mul(2) >= deadline {
            return Err(ConfigError::UnsafePulseInterval { pulse, deadline });
        }

        // Each blocking step sits between two pulses.  The step plus the idle
        // slice that preceded it must stay strictly below the deadline.
        for (step, worst_case) in self.blocking_steps() {
            if worst_case.saturating_add(pulse) >= deadline {
                return Err(ConfigError::LivenessBudgetExceeded {
                    step,
                    worst_case,
                    pulse,
                    deadline,
                });
            }
        }

        Ok(())
    }

    /// Worst-case duration of every step the pipeline runs between two
    /// liveness pulses.
    pub fn blocking_steps(&self) -> Vec<(&'static str, Duration)> {
        let attempts = self.retry.max_attempts.max(1);
        let read = self
            .read_timeout()
            .saturating_mul(attempts)
            .saturating_add(self.retry_delay().saturating_mul(attempts - 1));

        let mut steps = vec![("register read", read)];
        if let Some(fwd) = &self.forward {
            steps.push(("frame write", Duration::from_millis(fwd.write_timeout_ms)));
        }
        if let Some(tel) = self.telemetry.as_ref().filter(|t| t.enabled) {
            steps.push((
                "connectivity probe",
                Duration::from_millis(tel.connect_timeout_ms),
            ));
            steps.push(("telemetry publish", Duration::from_millis(tel.timeout_ms)));
        }
        steps
    }

    /// `true` when a telemetry section is present and enabled.
    pub fn telemetry_enabled(&self) -> bool {
        self.telemetry.as_ref().is_some_and(|t| t.enabled)
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.cycle.period_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.device.read_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry.delay_ms)
    }

    pub fn pulse_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog.pulse_interval_ms)
    }

    pub fn liveness_deadline(&self) -> Duration {
        Duration::from_millis(self.watchdog.deadline_ms)
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(endpoint)
        .map_err(|_| ConfigError::InvalidEndpoint(endpoint.to_string()))?;
    let http = matches!(url.scheme(), "http" | "https");
    if !http || url.host_str().is_none() {
        return Err(ConfigError::InvalidEndpoint(endpoint.to_string()));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    const MINIMAL: &str = r#"
device:
  serial:
    port: /dev/ttyUSB0
  addresses: [0]
"#;

    fn minimal() -> StationConfig {
        StationConfig::from_yaml_str(MINIMAL).unwrap()
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn load_full_yaml() {
        let yaml = r#"
cycle:
  period_ms: 30000
device:
  serial:
    port: /dev/ttyUSB0
    baud_rate: 19200
  slave_id: 1
  read_timeout_ms: 800
  addresses: ["0x0BCD", "0x0BCF", "0x0BD1", "0x0BF5"]
retry:
  max_attempts: 3
  delay_ms: 100
forward:
  serial:
    port: /dev/ttyS1
  policy: per_address
  format: raw
telemetry:
  endpoint: "http://api.thingspeak.com/update"
  api_key: "KEY"
watchdog:
  kind: device
  path: /dev/watchdog
  deadline_ms: 60000
  pulse_interval_ms: 1000
"#;
        let f = yaml_tempfile(yaml);
        let cfg = StationConfig::load_from_file(f.path()).unwrap();

        assert_eq!(cfg.period(), Duration::from_secs(30));
        assert_eq!(cfg.device.serial.baud_rate, 19_200);
        assert_eq!(cfg.device.serial.parity, Parity::None);
        assert_eq!(
            cfg.device.addresses,
            vec![
                RegisterAddress::new(0x0BCD),
                RegisterAddress::new(0x0BCF),
                RegisterAddress::new(0x0BD1),
                RegisterAddress::new(0x0BF5),
            ]
        );
        let fwd = cfg.forward.as_ref().unwrap();
        assert_eq!(fwd.serial.baud_rate, 9_600); // default
        assert_eq!(fwd.policy, ForwardPolicy::PerAddress);
        assert_eq!(fwd.format, FrameFormat::Raw);
        assert!(cfg.telemetry_enabled());
        assert_eq!(cfg.watchdog.kind, WatchdogKind::Device);
    }

    #[test]
    fn shipped_configs_are_valid() {
        for (name, yaml) in [
            (
                "thingspeak_relay",
                include_str!("../../../configs/thingspeak_relay.yaml"),
            ),
            (
                "wind_sensor_raw",
                include_str!("../../../configs/wind_sensor_raw.yaml"),
            ),
            (
                "batched_decoded",
                include_str!("../../../configs/batched_decoded.yaml"),
            ),
        ] {
            let cfg = StationConfig::from_yaml_str(yaml)
                .unwrap_or_else(|e| panic!("{name}: {e:#}"));
            assert!(!cfg.device.addresses.is_empty(), "{name}");
        }
    }

    #[test]
    fn optional_sections_use_reference_defaults() {
        let cfg = minimal();
        assert_eq!(cfg.cycle.period_ms, 30_000);
        assert!(!cfg.cycle.run_on_start);
        assert_eq!(cfg.device.slave_id, 1);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.delay_ms, 100);
        assert!(cfg.forward.is_none());
        assert!(!cfg.telemetry_enabled());
        assert_eq!(cfg.watchdog.kind, WatchdogKind::Disabled);
        assert_eq!(cfg.liveness_deadline(), Duration::from_secs(60));
        assert_eq!(cfg.pulse_interval(), Duration::from_secs(1));
    }

    #[test]
    fn batched_decoded_policy_parses() {
        let yaml = format!(
            "{MINIMAL}forward:\n  serial: {{ port: /dev/ttyS1 }}\n  policy: batched\n  format: decoded\n"
        );
        let cfg = StationConfig::from_yaml_str(&yaml).unwrap();
        let fwd = cfg.forward.unwrap();
        assert_eq!(fwd.policy, ForwardPolicy::Batched);
        assert_eq!(fwd.format, FrameFormat::Decoded);
    }

    #[test]
    fn disabled_telemetry_is_not_validated() {
        let yaml = format!(
            "{MINIMAL}telemetry:\n  enabled: false\n  endpoint: not a url\n  api_key: k\n"
        );
        let cfg = StationConfig::from_yaml_str(&yaml).unwrap();
        assert!(!cfg.telemetry_enabled());
    }

    #[test]
    fn missing_file_returns_error() {
        let result = StationConfig::load_from_file(Path::new("/nonexistent/path/station.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("this is: not: valid: yaml: content:::");
        assert!(StationConfig::load_from_file(f.path()).is_err());
    }

    #[test]
    fn invalid_address_string_returns_error() {
        let yaml = "device:\n  serial: { port: p }\n  addresses: [\"0xZZZZ\"]\n";
        assert!(StationConfig::from_yaml_str(yaml).is_err());
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn empty_address_list_is_rejected() {
        let mut cfg = minimal();
        cfg.device.addresses.clear();
        assert_eq!(cfg.validate(), Err(ConfigError::NoAddresses));
    }

    #[test]
    fn duplicate_address_is_rejected() {
        let mut cfg = minimal();
        cfg.device.addresses = vec![
            RegisterAddress::new(0x0BCD),
            RegisterAddress::new(0x0BCF),
            RegisterAddress::new(0x0BCD),
        ];
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::DuplicateAddress(RegisterAddress::new(0x0BCD)))
        );
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let mut cfg = minimal();
        cfg.retry.max_attempts = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroAttempts));
    }

    #[test]
    fn zero_period_is_rejected() {
        let mut cfg = minimal();
        cfg.cycle.period_ms = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroPeriod));
    }

    #[test]
    fn broadcast_slave_id_is_rejected() {
        let mut cfg = minimal();
        cfg.device.slave_id = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidSlaveId(0)));
    }

    #[test]
    fn pulse_interval_must_be_under_half_the_deadline() {
        let mut cfg = minimal();
        cfg.watchdog.pulse_interval_ms = 30_000;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::UnsafePulseInterval { .. })
        ));

        cfg.watchdog.pulse_interval_ms = 29_999;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn slow_retry_budget_exceeds_liveness_deadline() {
        let mut cfg = minimal();
        cfg.device.read_timeout_ms = 20_000;
        cfg.retry.max_attempts = 3; // 60 s of reads alone
        match cfg.validate() {
            Err(ConfigError::LivenessBudgetExceeded { step, worst_case, .. }) => {
                assert_eq!(step, "register read");
                assert_eq!(worst_case, Duration::from_millis(60_200));
            }
            other => panic!("expected LivenessBudgetExceeded, got {other:?}"),
        }
    }

    #[test]
    fn huge_retry_budget_is_rejected_without_overflow() {
        let yaml = r#"
device:
  serial: { port: /dev/ttyUSB0 }
  addresses: [0]
  read_timeout_ms: 18446744073709551615
retry:
  max_attempts: 4294967295
  delay_ms: 1000
"#;
        let err = StationConfig::from_yaml_str(yaml).unwrap_err();
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::LivenessBudgetExceeded { step, worst_case, .. }) => {
                assert_eq!(*step, "register read");
                assert_eq!(*worst_case, Duration::MAX);
            }
            other => panic!("expected LivenessBudgetExceeded, got {other:?}"),
        }
    }

    #[test]
    fn slow_publish_timeout_exceeds_liveness_deadline() {
        let yaml = format!(
            "{MINIMAL}telemetry:\n  endpoint: http://example.com/update\n  api_key: k\n  timeout_ms: 59500\n"
        );
        let err = StationConfig::from_yaml_str(&yaml).unwrap_err();
        let cfg_err = err.downcast_ref::<ConfigError>().unwrap();
        assert!(matches!(
            cfg_err,
            ConfigError::LivenessBudgetExceeded {
                step: "telemetry publish",
                ..
            }
        ));
    }

    #[test]
    fn non_http_endpoint_is_rejected() {
        let mut cfg = minimal();
        cfg.telemetry = Some(TelemetryConfig {
            enabled: true,
            endpoint: "ftp://example.com/x".into(),
            api_key: "k".into(),
            timeout_ms: 1_000,
            connect_timeout_ms: 1_000,
        });
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn device_watchdog_requires_path() {
        let mut cfg = minimal();
        cfg.watchdog.kind = WatchdogKind::Device;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::MissingWatchdogPath("device"))
        );
    }

    #[test]
    fn blocking_steps_cover_enabled_collaborators() {
        let cfg = minimal();
        let names: Vec<_> = cfg.blocking_steps().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["register read"]);
        // 3 × 1000 ms reads + 2 × 100 ms delays
        assert_eq!(cfg.blocking_steps()[0].1, Duration::from_millis(3_200));
    }
}
