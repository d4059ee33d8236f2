/*
 * SPDX-License-Identifier: Apache-2.0
 *
 * Copyright The Asahi Linux Contributors
 */

//! Protocol framer for the MCP2221A. Turns logical I2C writes and reads
//! into the converter's two-phase command exchanges and validates the
//! acknowledgements.
//!
//! A write is a data phase followed by a status phase; a read issues the
//! request and then fetches the buffered result. The phases of one
//! transaction must run in strict sequence on the same transport, so the
//! framer holds the transport exclusively for its lifetime.

use crate::error::FramerError;
use crate::protocol::{
    bus_speed_divisor, command_succeeded, Command, HidReport, LEN_OFFSET, MAX_TRANSFER,
    REPORT_SIZE, RESPONSE_HEADER_LEN,
};
use crate::transport::{Transport, EXCHANGE_TIMEOUT};
use log::trace;

pub struct Device<'a> {
    transport: &'a mut dyn Transport,
}

impl<'a> Device<'a> {
    pub fn new(transport: &'a mut dyn Transport) -> Self {
        Self { transport }
    }

    /// One request/response round-trip. Transport failures, including a
    /// timed-out response, propagate unchanged; the command sequence has
    /// no retry window and a blind resend would desynchronize the
    /// converter's two-phase state.
    fn exchange(&mut self, cmd: &Command) -> Result<HidReport, FramerError> {
        self.transport.send(&cmd.encode())?;
        Ok(self.transport.receive(EXCHANGE_TIMEOUT)?)
    }

    /// Execute an I2C write to a 7-bit slave address.
    pub fn write(&mut self, address: u8, payload: &[u8]) -> Result<(), FramerError> {
        if payload.len() > MAX_TRANSFER {
            return Err(FramerError::RequestTooLarge(payload.len()));
        }
        trace!("i2c write addr={address:#04x} len={}", payload.len());

        let ack = self.exchange(&Command::WriteData { address, payload })?;
        if !command_succeeded(&ack) {
            return Err(FramerError::DeviceBusy);
        }

        // Status stage: confirm the transfer completed on the bus.
        let status = self.exchange(&Command::StatusPoll)?;
        if !command_succeeded(&status) {
            return Err(FramerError::BusError);
        }
        Ok(())
    }

    /// Execute an I2C read from a 7-bit slave address. The returned length
    /// comes from the converter's response, not from the request; zero
    /// bytes is a valid outcome.
    pub fn read(&mut self, address: u8, length: u8) -> Result<Vec<u8>, FramerError> {
        if usize::from(length) > MAX_TRANSFER {
            return Err(FramerError::RequestTooLarge(usize::from(length)));
        }
        trace!("i2c read addr={address:#04x} len={length}");

        let _ack = self.exchange(&Command::ReadRequest { address, length })?;

        let response = self.exchange(&Command::FetchResult)?;
        let n = usize::from(response.as_bytes()[LEN_OFFSET]);
        if n > MAX_TRANSFER || RESPONSE_HEADER_LEN + n > REPORT_SIZE {
            return Err(FramerError::MalformedResponse(n));
        }
        Ok(response.as_bytes()[RESPONSE_HEADER_LEN..RESPONSE_HEADER_LEN + n].to_vec())
    }

    /// Set the converter's I2C bus speed. Some device states return no
    /// acknowledgement for this command, so a failed readback is
    /// tolerated.
    pub fn set_bus_speed(&mut self, bus_speed_hz: u32) -> Result<(), FramerError> {
        let divisor = bus_speed_divisor(bus_speed_hz);
        trace!("bus speed {bus_speed_hz} Hz, divisor {divisor}");
        self.transport
            .send(&Command::Configure { divisor }.encode())?;
        let _ = self.transport.receive(EXCHANGE_TIMEOUT);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct MockTransport {
        sent: Vec<HidReport>,
        responses: VecDeque<Result<HidReport, TransportError>>,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                sent: Vec::new(),
                responses: VecDeque::new(),
            }
        }

        fn respond(mut self, report: HidReport) -> Self {
            self.responses.push_back(Ok(report));
            self
        }

        fn fail(mut self, err: TransportError) -> Self {
            self.responses.push_back(Err(err));
            self
        }
    }

    impl Transport for MockTransport {
        fn send(&mut self, report: &HidReport) -> Result<(), TransportError> {
            self.sent.push(*report);
            Ok(())
        }

        fn receive(&mut self, _timeout: Duration) -> Result<HidReport, TransportError> {
            self.responses
                .pop_front()
                .unwrap_or(Err(TransportError::Timeout))
        }
    }

    fn ok_response() -> HidReport {
        HidReport::zeroed()
    }

    fn failed_response() -> HidReport {
        let mut buf = [0u8; REPORT_SIZE];
        buf[1] = 0x01;
        HidReport::from(buf)
    }

    fn fetch_response(data: &[u8]) -> HidReport {
        let mut buf = [0u8; REPORT_SIZE];
        buf[LEN_OFFSET] = data.len() as u8;
        buf[RESPONSE_HEADER_LEN..RESPONSE_HEADER_LEN + data.len()].copy_from_slice(data);
        HidReport::from(buf)
    }

    #[test]
    fn write_frames_opcode_length_and_address() {
        for &address in &[0x00u8, 0x18, 0x50, 0x7f] {
            for payload in [&[][..], &[0xfd][..], &[0u8; 60][..]] {
                let mut mock = MockTransport::new()
                    .respond(ok_response())
                    .respond(ok_response());
                {
                    let mut dev = Device::new(&mut mock);
                    dev.write(address, payload).unwrap();
                }
                let out = mock.sent[0].as_bytes();
                assert_eq!(out[0], 0x90);
                assert_eq!(out[1], payload.len() as u8);
                assert_eq!(out[3], (address << 1) & 0xff);
                assert_eq!(&out[4..4 + payload.len()], payload);
            }
        }
    }

    #[test]
    fn write_runs_data_then_status_phase() {
        let mut mock = MockTransport::new()
            .respond(ok_response())
            .respond(ok_response());
        {
            let mut dev = Device::new(&mut mock);
            dev.write(0x18, &[0xfd]).unwrap();
        }
        assert_eq!(mock.sent.len(), 2);
        assert_eq!(mock.sent[1].as_bytes()[0], 0x10);
        assert!(mock.sent[1].as_bytes()[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn write_rejects_oversize_payload_before_sending() {
        let mut mock = MockTransport::new();
        {
            let mut dev = Device::new(&mut mock);
            let res = dev.write(0x18, &[0u8; 61]);
            assert!(matches!(res, Err(FramerError::RequestTooLarge(61))));
        }
        assert!(mock.sent.is_empty());
    }

    #[test]
    fn busy_write_ack_is_device_busy() {
        let mut mock = MockTransport::new().respond(failed_response());
        let mut dev = Device::new(&mut mock);
        let res = dev.write(0x18, &[0xfd]);
        assert!(matches!(res, Err(FramerError::DeviceBusy)));
    }

    #[test]
    fn failed_status_poll_is_bus_error() {
        let mut mock = MockTransport::new()
            .respond(ok_response())
            .respond(failed_response());
        let mut dev = Device::new(&mut mock);
        let res = dev.write(0x18, &[0xfd]);
        assert!(matches!(res, Err(FramerError::BusError)));
    }

    #[test]
    fn read_frames_request_with_read_bit_set() {
        for length in [1u8, 2, 32, 60] {
            let mut mock = MockTransport::new()
                .respond(ok_response())
                .respond(fetch_response(&[0x57]));
            {
                let mut dev = Device::new(&mut mock);
                dev.read(0x18, length).unwrap();
            }
            let out = mock.sent[0].as_bytes();
            assert_eq!(out[0], 0x91);
            assert_eq!(out[1], length);
            assert_eq!(out[3], (0x18 << 1) | 1);
            assert_eq!(mock.sent[1].as_bytes()[0], 0x40);
        }
    }

    #[test]
    fn read_returns_bytes_declared_by_the_response() {
        let mut mock = MockTransport::new()
            .respond(ok_response())
            .respond(fetch_response(&[0x57]));
        let mut dev = Device::new(&mut mock);
        assert_eq!(dev.read(0x18, 1).unwrap(), vec![0x57]);
    }

    #[test]
    fn zero_length_fetch_is_empty_not_an_error() {
        let mut mock = MockTransport::new()
            .respond(ok_response())
            .respond(fetch_response(&[]));
        let mut dev = Device::new(&mut mock);
        assert_eq!(dev.read(0x18, 1).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn overlong_declared_length_is_malformed() {
        let mut buf = [0u8; REPORT_SIZE];
        buf[LEN_OFFSET] = 61;
        let mut mock = MockTransport::new()
            .respond(ok_response())
            .respond(HidReport::from(buf));
        let mut dev = Device::new(&mut mock);
        let res = dev.read(0x18, 1);
        assert!(matches!(res, Err(FramerError::MalformedResponse(61))));
    }

    #[test]
    fn declared_length_of_sixty_cannot_fit_the_report() {
        // The converter caps a transfer at 60 bytes, but 60 bytes after
        // the 5-byte header would run past the 64-byte report, so a
        // declared 60 is rejected rather than read out of bounds.
        let mut buf = [0u8; REPORT_SIZE];
        buf[LEN_OFFSET] = 60;
        let mut mock = MockTransport::new()
            .respond(ok_response())
            .respond(HidReport::from(buf));
        let mut dev = Device::new(&mut mock);
        let res = dev.read(0x18, 1);
        assert!(matches!(res, Err(FramerError::MalformedResponse(60))));
    }

    #[test]
    fn read_rejects_oversize_length_before_sending() {
        let mut mock = MockTransport::new();
        {
            let mut dev = Device::new(&mut mock);
            let res = dev.read(0x18, 61);
            assert!(matches!(res, Err(FramerError::RequestTooLarge(61))));
        }
        assert!(mock.sent.is_empty());
    }

    #[test]
    fn receive_timeout_propagates_as_transport_error() {
        let mut mock = MockTransport::new();
        let mut dev = Device::new(&mut mock);
        let res = dev.read(0x18, 1);
        assert!(matches!(
            res,
            Err(FramerError::Transport(TransportError::Timeout))
        ));

        let mut mock = MockTransport::new().fail(TransportError::Timeout);
        let mut dev = Device::new(&mut mock);
        let res = dev.write(0x18, &[0xfd]);
        assert!(matches!(
            res,
            Err(FramerError::Transport(TransportError::Timeout))
        ));
    }

    #[test]
    fn bus_speed_configure_framing_and_ack_tolerance() {
        // 12 MHz / 400 kHz = 30. A missing acknowledgement is not an error.
        let mut mock = MockTransport::new().fail(TransportError::Timeout);
        {
            let mut dev = Device::new(&mut mock);
            dev.set_bus_speed(400_000).unwrap();
        }
        let out = mock.sent[0].as_bytes();
        assert_eq!(out[0], 0x10);
        assert_eq!(out[3], 0x20);
        assert_eq!(out[4], 30);
    }

    #[test]
    fn product_id_register_scenario() {
        // Point the sensor at its product ID register, then read one byte
        // from a device that always acknowledges and returns 0x57.
        let mut mock = MockTransport::new()
            .respond(ok_response())
            .respond(ok_response())
            .respond(ok_response())
            .respond(fetch_response(&[0x57]));
        let mut dev = Device::new(&mut mock);
        dev.write(0x18, &[0xfd]).unwrap();
        assert_eq!(dev.read(0x18, 1).unwrap(), vec![0x57]);
    }
}
