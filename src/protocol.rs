/*
 * SPDX-License-Identifier: Apache-2.0
 *
 * Copyright The Asahi Linux Contributors
 */

//! MCP2221A command framing: opcodes, report layout, and encoding of the
//! converter's HID command set.

pub const VENDOR_ID: u16 = 0x04d8;
pub const PRODUCT_ID: u16 = 0x00dd;

pub const ENDPOINT_OUT: u8 = 0x03;
pub const ENDPOINT_IN: u8 = 0x83;

pub const CMD_STATUS: u8 = 0x10;
pub const SUBCMD_SET_SPEED: u8 = 0x20;
pub const CMD_WRITE_DATA: u8 = 0x90;
pub const CMD_READ_REQUEST: u8 = 0x91;
pub const CMD_FETCH_RESULT: u8 = 0x40;

/// Every exchange with the converter is exactly one report this size.
pub const REPORT_SIZE: usize = 64;

/// Fetch-result responses carry their data after a 5-byte header, with the
/// returned length at byte 4.
pub const RESPONSE_HEADER_LEN: usize = 5;
pub const LEN_OFFSET: usize = 4;

/// Largest transfer the converter moves in one transaction.
pub const MAX_TRANSFER: usize = 60;

/// Reference clock the bus-speed divisor is derived from.
pub const CLOCK_BASE: u32 = 12_000_000;

/// One 64-byte HID report. Commands shorter than the report are
/// zero-padded; trailing bytes of a response are undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidReport([u8; REPORT_SIZE]);

impl HidReport {
    pub fn zeroed() -> Self {
        Self([0u8; REPORT_SIZE])
    }

    pub fn as_bytes(&self) -> &[u8; REPORT_SIZE] {
        &self.0
    }
}

impl Default for HidReport {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl From<[u8; REPORT_SIZE]> for HidReport {
    fn from(buf: [u8; REPORT_SIZE]) -> Self {
        Self(buf)
    }
}

/// One converter command, encoding to exactly one outbound report.
/// Crate-internal: the framer validates transfer sizes before encoding,
/// and encoding assumes that check has happened.
pub(crate) enum Command<'a> {
    Configure { divisor: u8 },
    WriteData { address: u8, payload: &'a [u8] },
    ReadRequest { address: u8, length: u8 },
    FetchResult,
    StatusPoll,
}

impl Command<'_> {
    pub(crate) fn encode(&self) -> HidReport {
        let mut buf = [0u8; REPORT_SIZE];
        match *self {
            Command::Configure { divisor } => {
                buf[0] = CMD_STATUS;
                buf[3] = SUBCMD_SET_SPEED;
                buf[4] = divisor;
            }
            Command::WriteData { address, payload } => {
                debug_assert!(payload.len() <= MAX_TRANSFER);
                buf[0] = CMD_WRITE_DATA;
                buf[1] = payload.len() as u8;
                buf[3] = address.wrapping_shl(1);
                buf[4..4 + payload.len()].copy_from_slice(payload);
            }
            Command::ReadRequest { address, length } => {
                buf[0] = CMD_READ_REQUEST;
                buf[1] = length; // length MSB at byte 2 is unsupported, left zero
                buf[3] = address.wrapping_shl(1) | 1;
            }
            Command::FetchResult => {
                buf[0] = CMD_FETCH_RESULT;
            }
            Command::StatusPoll => {
                buf[0] = CMD_STATUS;
            }
        }
        HidReport(buf)
    }
}

/// The converter echoes the opcode at byte 0 and reports completion at
/// byte 1, zero meaning success.
pub fn command_succeeded(response: &HidReport) -> bool {
    response.as_bytes()[1] == 0
}

/// Divisor written into the configure report: `CLOCK_BASE / bus speed`,
/// truncated to one byte.
pub fn bus_speed_divisor(bus_speed_hz: u32) -> u8 {
    (CLOCK_BASE / bus_speed_hz.max(1)).min(u8::MAX as u32) as u8
}
