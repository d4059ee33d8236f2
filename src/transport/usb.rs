/*
 * SPDX-License-Identifier: Apache-2.0
 *
 * Copyright The Asahi Linux Contributors
 */

//! Blocking transport: raw interrupt transfers on the converter's endpoint
//! pair through libusb. The calling thread is suspended inside the OS read
//! for at most the requested timeout.

use crate::error::{SessionError, TransportError};
use crate::protocol::{
    HidReport, ENDPOINT_IN, ENDPOINT_OUT, PRODUCT_ID, REPORT_SIZE, VENDOR_ID,
};
use crate::transport::Transport;
use log::debug;
use rusb::{DeviceHandle, GlobalContext};
use std::time::Duration;

const SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// The I2C command endpoints live on the third interface of the composite
/// device.
const HID_INTERFACE: u8 = 2;

pub struct UsbTransport {
    handle: DeviceHandle<GlobalContext>,
    reattach: Vec<u8>,
}

impl UsbTransport {
    /// Find and claim the converter, detaching any kernel drivers bound to
    /// its interfaces. Detached drivers are reattached when the transport
    /// is dropped, or immediately if claiming fails partway through.
    pub fn open() -> Result<Self, SessionError> {
        let handle = rusb::open_device_with_vid_pid(VENDOR_ID, PRODUCT_ID)
            .ok_or(SessionError::DeviceNotFound)?;

        let mut reattach = Vec::new();
        match Self::claim(&handle, &mut reattach) {
            Ok(()) => {
                debug!("claimed 04d8:00dd, detached drivers on {reattach:?}");
                Ok(Self { handle, reattach })
            }
            Err(e) => {
                for &iface in &reattach {
                    let _ = handle.attach_kernel_driver(iface);
                }
                Err(e)
            }
        }
    }

    fn claim(
        handle: &DeviceHandle<GlobalContext>,
        reattach: &mut Vec<u8>,
    ) -> Result<(), SessionError> {
        for iface in 0..3 {
            if handle.kernel_driver_active(iface).unwrap_or(false) {
                handle
                    .detach_kernel_driver(iface)
                    .map_err(|e| SessionError::ClaimFailed(e.to_string()))?;
                reattach.push(iface);
            }
        }

        handle
            .set_active_configuration(1)
            .map_err(|e| SessionError::ClaimFailed(e.to_string()))?;
        handle
            .claim_interface(HID_INTERFACE)
            .map_err(|e| SessionError::ClaimFailed(e.to_string()))?;
        Ok(())
    }
}

fn map_usb_error(e: rusb::Error) -> TransportError {
    match e {
        rusb::Error::Timeout => TransportError::Timeout,
        rusb::Error::NoDevice => TransportError::NotConnected,
        other => TransportError::IoFailure(other.to_string()),
    }
}

impl Transport for UsbTransport {
    fn send(&mut self, report: &HidReport) -> Result<(), TransportError> {
        self.handle
            .write_interrupt(ENDPOINT_OUT, report.as_bytes(), SEND_TIMEOUT)
            .map_err(map_usb_error)?;
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<HidReport, TransportError> {
        let mut buf = [0u8; REPORT_SIZE];
        self.handle
            .read_interrupt(ENDPOINT_IN, &mut buf, timeout)
            .map_err(map_usb_error)?;
        Ok(HidReport::from(buf))
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        let _ = self.handle.release_interface(HID_INTERFACE);
        for &iface in &self.reattach {
            let _ = self.handle.attach_kernel_driver(iface);
        }
    }
}
