/*
 * SPDX-License-Identifier: Apache-2.0
 *
 * Copyright The Asahi Linux Contributors
 */

pub mod callback;
pub mod usb;

use crate::error::TransportError;
use crate::protocol::HidReport;
use std::time::Duration;

/// Per-exchange timeout applied to every response read.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_millis(100);

/// Moves fixed 64-byte HID reports to and from the converter. One logical
/// transaction at a time per transport; the protocol has no pipelining.
pub trait Transport {
    /// Transmit exactly one report to the command endpoint.
    fn send(&mut self, report: &HidReport) -> Result<(), TransportError>;

    /// Wait for one inbound report, at most `timeout`. A timeout means the
    /// exchange did not complete; no partial data is ever returned.
    fn receive(&mut self, timeout: Duration) -> Result<HidReport, TransportError>;
}
