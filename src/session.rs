/*
 * SPDX-License-Identifier: Apache-2.0
 *
 * Copyright The Asahi Linux Contributors
 */

//! Device session: backend selection, connection, and the one-shot bus
//! speed configuration. The session owns the transport exclusively; all
//! transactions go through a framer borrowed from it.

use crate::error::{FramerError, SessionError};
use crate::mcp2221::Device;
use crate::transport::callback::CallbackTransport;
use crate::transport::usb::UsbTransport;
use crate::transport::Transport;
use log::info;
use std::str::FromStr;

/// Which host USB stack carries the reports. `Usb` drives the endpoint
/// pair directly; `Hid` goes through the report-based layer and its
/// push-style delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Usb,
    Hid,
}

impl FromStr for Backend {
    type Err = ();

    fn from_str(input: &str) -> std::result::Result<Backend, ()> {
        match input {
            "usb" => Ok(Backend::Usb),
            "hid" => Ok(Backend::Hid),
            _ => Err(()),
        }
    }
}

pub struct Session {
    transport: Box<dyn Transport>,
}

impl Session {
    pub fn connect(backend: Backend) -> Result<Self, SessionError> {
        let transport: Box<dyn Transport> = match backend {
            Backend::Usb => Box::new(UsbTransport::open()?),
            Backend::Hid => Box::new(CallbackTransport::open()?),
        };
        info!("connected via {backend:?} backend");
        Ok(Self { transport })
    }

    /// Set the converter's bus speed. Issued once, right after connecting.
    pub fn configure(&mut self, bus_speed_hz: u32) -> Result<(), FramerError> {
        self.framer().set_bus_speed(bus_speed_hz)
    }

    /// Borrow a framer for a sequence of transactions. The mutable borrow
    /// keeps a single transaction in flight per transport.
    pub fn framer(&mut self) -> Device<'_> {
        Device::new(self.transport.as_mut())
    }
}
