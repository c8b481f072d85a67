/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Register transport: the seam between the acquirer and the serial bus.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tokio_modbus::client::{rtu, Context};
use tokio_modbus::prelude::*;
use tracing::{debug, info};

use crate::config::DeviceConfig;
use crate::error::TransportError;
use crate::serial;

/// A request/response link to the field device.
///
/// Implementations perform exactly one exchange per call; retrying is the
/// caller's job.
#[async_trait]
pub trait RegisterTransport: Send {
    async fn read_holding_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError>;
}

// ── Modbus RTU ────────────────────────────────────────────────────────────────

/// Opens a fresh RTU client context.
pub type Connector = Box<dyn FnMut() -> Result<Context, TransportError> + Send>;

/// Modbus RTU client over a serial port, each exchange bounded by a timeout.
///
/// After a timed-out exchange the context is dropped and rebuilt before the
/// next request, so a late reply to the abandoned request is never matched
/// to a later one.
pub struct ModbusRtuTransport {
    connect: Connector,
    ctx: Option<Context>,
    timeout: Duration,
}

impl ModbusRtuTransport {
    /// Open the device port described by `cfg` and attach an RTU client.
    pub fn open(cfg: &DeviceConfig) -> Result<Self, TransportError> {
        let serial_cfg = cfg.serial.clone();
        let slave = Slave(cfg.slave_id);
        let connect: Connector = Box::new(move || {
            let port = serial::open(&serial_cfg).map_err(|e| TransportError::Io(e.into()))?;
            Ok(rtu::attach_slave(port, slave))
        });
        let transport = Self::with_connector(connect, Duration::from_millis(cfg.read_timeout_ms))?;
        info!(
            port = %cfg.serial.port,
            baud = cfg.serial.baud_rate,
            slave_id = cfg.slave_id,
            "Modbus RTU link opened"
        );
        Ok(transport)
    }

    /// Build the first context right away; later ones are built after timeouts.
    pub fn with_connector(mut connect: Connector, timeout: Duration) -> Result<Self, TransportError> {
        let ctx = connect()?;
        Ok(Self {
            connect,
            ctx: Some(ctx),
            timeout,
        })
    }

    fn context(&mut self) -> Result<&mut Context, TransportError> {
        let ctx = match self.ctx.take() {
            Some(ctx) => ctx,
            None => {
                debug!("reopening Modbus RTU link after a timed-out exchange");
                (self.connect)()?
            }
        };
        Ok(self.ctx.insert(ctx))
    }
}

#[async_trait]
impl RegisterTransport for ModbusRtuTransport {
    async fn read_holding_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        let limit = self.timeout;
        let ctx = self.context()?;
        ctx.set_slave(Slave(slave_id));

        // Outer Result = timeout, middle = transport/protocol, inner = Modbus exception
        let result = timeout(limit, ctx.read_holding_registers(address, count)).await;
        match result {
            Err(_) => {
                self.ctx = None;
                Err(TransportError::Timeout(limit))
            }
            Ok(Err(e)) => Err(TransportError::Protocol(e.to_string())),
            Ok(Ok(Err(exception))) => Err(TransportError::Exception(exception.to_string())),
            Ok(Ok(Ok(words))) => Ok(words),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
