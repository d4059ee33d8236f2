/*
 * SPDX-License-Identifier: Apache-2.0
 *
 * Copyright The Asahi Linux Contributors
 */

use thiserror::Error;

/// Failures moving a single HID report across the wire.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("device not connected")]
    NotConnected,

    #[error("usb i/o error: {0}")]
    IoFailure(String),

    #[error("timed out waiting for a report")]
    Timeout,
}

/// Failures of a logical I2C transaction against the converter.
#[derive(Debug, Error)]
pub enum FramerError {
    #[error("converter is busy or the slave did not acknowledge")]
    DeviceBusy,

    #[error("i2c bus error reported by the converter")]
    BusError,

    #[error("malformed response: declared length {0} exceeds the report capacity")]
    MalformedResponse(usize),

    #[error("requested transfer of {0} bytes exceeds the 60-byte report capacity")]
    RequestTooLarge(usize),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures locating or claiming the converter on the USB bus.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no MCP2221A found (04d8:00dd)")]
    DeviceNotFound,

    #[error("failed to claim device: {0}")]
    ClaimFailed(String),
}
