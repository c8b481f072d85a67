/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Telemetry uplink: connectivity check plus best-effort publish.
//!
//! Publishing is fire-and-forget.  The remote response body is logged but not
//! inspected; a request that completes at the transport level counts as
//! delivered, whatever the HTTP status.  Nothing is retried or queued.
//!
//! Request shape (ThingSpeak `update` API):
//! ```text
//! GET <endpoint>?api_key=<key>&field1=3.1416&field2=0.0000&...
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::error::{NetworkError, PublishError};

// ── Traits ────────────────────────────────────────────────────────────────────

/// Pushes one batch of decoded values to the remote aggregator.
#[async_trait]
pub trait TelemetryPublisher: Send {
    async fn publish(&mut self, values: &[f32]) -> Result<(), PublishError>;
}

/// Idempotent, bounded "is the uplink usable" check.
#[async_trait]
pub trait ConnectivitySupervisor: Send {
    async fn ensure_connected(&mut self) -> Result<(), NetworkError>;
}

/// The two uplink collaborators, always configured together.
pub struct Uplink {
    pub supervisor: Box<dyn ConnectivitySupervisor>,
    pub publisher: Box<dyn TelemetryPublisher>,
}

impl Uplink {
    /// HTTP publisher and TCP probe for `cfg.endpoint`.
    pub fn from_config(cfg: &TelemetryConfig) -> anyhow::Result<Self> {
        Ok(Self {
            supervisor: Box::new(TcpProbe::for_endpoint(
                &cfg.endpoint,
                Duration::from_millis(cfg.connect_timeout_ms),
            )?),
            publisher: Box::new(HttpPublisher::new(cfg)?),
        })
    }
}

// ── HTTP publisher ────────────────────────────────────────────────────────────

pub struct HttpPublisher {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl HttpPublisher {
    pub fn new(cfg: &TelemetryConfig) -> anyhow::Result<Self> {
        let endpoint = Url::parse(&cfg.endpoint)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            api_key: cfg.api_key.clone(),
        })
    }

    /// `api_key` followed by `field1..fieldN`, values with 4 decimals.
    pub fn query_pairs(&self, values: &[f32]) -> Vec<(String, String)> {
        std::iter::once(("api_key".to_string(), self.api_key.clone()))
            .chain(
                values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (format!("field{}", i + 1), format!("{v:.4}"))),
            )
            .collect()
    }
}

#[async_trait]
impl TelemetryPublisher for HttpPublisher {
    async fn publish(&mut self, values: &[f32]) -> Result<(), PublishError> {
        if values.is_empty() {
            return Err(PublishError::NoValues);
        }

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&self.query_pairs(values))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            info!(status = status.as_u16(), body = %body.trim(), "telemetry response");
        } else {
            warn!(status = status.as_u16(), body = %body.trim(), "telemetry endpoint answered with an error status");
        }
        Ok(())
    }
}

// ── TCP probe ─────────────────────────────────────────────────────────────────

/// Checks that the endpoint's host accepts TCP connections.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Probe the host and port (scheme default if absent) of `endpoint`.
    pub fn for_endpoint(endpoint: &str, timeout: Duration) -> Result<Self, NetworkError> {
        let invalid = || NetworkError::InvalidEndpoint(endpoint.to_string());
        let url = Url::parse(endpoint).map_err(|_| invalid())?;
        let host = url.host_str().ok_or_else(invalid)?;
        let port = url.port_or_known_default().ok_or_else(invalid)?;
        Ok(Self::new(host, port, timeout))
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[async_trait]
impl ConnectivitySupervisor for TcpProbe {
    async fn ensure_connected(&mut self) -> Result<(), NetworkError> {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match timeout(self.timeout, connect).await {
            Ok(Ok(_stream)) => {
                debug!(endpoint = %self.endpoint(), "uplink reachable");
                Ok(())
            }
            Ok(Err(source)) => Err(NetworkError::Unreachable {
                endpoint: self.endpoint(),
                source,
            }),
            Err(_) => Err(NetworkError::Timeout {
                endpoint: self.endpoint(),
                after: self.timeout,
            }),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cfg(endpoint: String) -> TelemetryConfig {
        TelemetryConfig {
            enabled: true,
            endpoint,
            api_key: "TESTKEY".into(),
            timeout_ms: 2_000,
            connect_timeout_ms: 500,
        }
    }

    // ── HttpPublisher ─────────────────────────────────────────────────────────

    #[test]
    fn query_lists_key_then_numbered_fields() {
        let p = HttpPublisher::new(&cfg("http://example.com/update".into())).unwrap();
        let q = p.query_pairs(&[std::f32::consts::PI, 0.0, -1.5]);
        let q: Vec<(&str, &str)> = q.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(
            q,
            vec![
                ("api_key", "TESTKEY"),
                ("field1", "3.1416"),
                ("field2", "0.0000"),
                ("field3", "-1.5000"),
            ]
        );
    }

    #[tokio::test]
    async fn publish_sends_one_get_with_all_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/update"))
            .and(query_param("api_key", "TESTKEY"))
            .and(query_param("field1", "3.1416"))
            .and(query_param("field2", "0.0000"))
            .respond_with(ResponseTemplate::new(200).set_body_string("17"))
            .expect(1)
            .mount(&server)
            .await;

        let mut p = HttpPublisher::new(&cfg(format!("{}/update", server.uri()))).unwrap();
        p.publish(&[std::f32::consts::PI, 0.0]).await.unwrap();
    }

    #[tokio::test]
    async fn error_status_still_counts_as_delivered() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("0"))
            .expect(1)
            .mount(&server)
            .await;

        let mut p = HttpPublisher::new(&cfg(format!("{}/update", server.uri()))).unwrap();
        assert!(p.publish(&[1.0]).await.is_ok());
    }

    #[tokio::test]
    async fn empty_batch_is_not_sent() {
        let mut p = HttpPublisher::new(&cfg("http://127.0.0.1:9/update".into())).unwrap();
        assert!(matches!(p.publish(&[]).await, Err(PublishError::NoValues)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_publish_error() {
        // Bind then drop to obtain a port nobody listens on.
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let mut p = HttpPublisher::new(&cfg(format!("http://127.0.0.1:{port}/update"))).unwrap();
        assert!(matches!(p.publish(&[1.0]).await, Err(PublishError::Request(_))));
    }

    // ── TcpProbe ──────────────────────────────────────────────────────────────

    #[test]
    fn probe_uses_scheme_default_port() {
        let p = TcpProbe::for_endpoint("http://api.thingspeak.com/update", Duration::from_secs(1))
            .unwrap();
        assert_eq!(p.endpoint(), "api.thingspeak.com:80");

        let p = TcpProbe::for_endpoint("https://example.com:8443/x", Duration::from_secs(1)).unwrap();
        assert_eq!(p.endpoint(), "example.com:8443");

        assert!(TcpProbe::for_endpoint("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn probe_succeeds_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut probe = TcpProbe::new("127.0.0.1", port, Duration::from_millis(500));
        assert!(probe.ensure_connected().await.is_ok());
        // idempotent
        assert!(probe.ensure_connected().await.is_ok());
    }

    #[tokio::test]
    async fn probe_reports_refused_connection() {
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let mut probe = TcpProbe::new("127.0.0.1", port, Duration::from_millis(500));
        assert!(matches!(
            probe.ensure_connected().await,
            Err(NetworkError::Unreachable { .. })
        ));
    }
}
