/*
 * SPDX-License-Identifier: Apache-2.0
 *
 * Copyright The Asahi Linux Contributors
 */

//! Callback-style transport for platforms that only push inbound reports at
//! the application. A reader thread delivers each report into a single-slot
//! buffer stamped with its arrival time; `receive` waits on the slot and
//! accepts only reports that arrived after the call started, so a late
//! response from an abandoned exchange is never replayed into the next one.

use crate::error::{SessionError, TransportError};
use crate::protocol::{HidReport, PRODUCT_ID, REPORT_SIZE, VENDOR_ID};
use crate::transport::Transport;
use hidapi::{HidApi, HidDevice};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// How long the reader thread blocks in one OS read before rechecking the
/// shutdown flag. Also bounds how long `send` can wait for the device lock.
const READ_POLL: Duration = Duration::from_millis(20);

/// Single-slot mailbox between the report producer and the polling
/// consumer. Timestamp and payload are updated under one lock so a
/// consumer never observes a fresh stamp on stale bytes.
pub(crate) struct ReportSlot {
    slot: Mutex<Option<(Instant, HidReport)>>,
    cvar: Condvar,
}

impl ReportSlot {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            cvar: Condvar::new(),
        }
    }

    pub(crate) fn publish(&self, report: HidReport) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some((Instant::now(), report));
        self.cvar.notify_all();
    }

    /// Wait until a report that arrived strictly after `since` is
    /// available, at most `timeout`. Anything older is from a previous
    /// exchange and is discarded.
    pub(crate) fn await_fresh(
        &self,
        since: Instant,
        timeout: Duration,
    ) -> Result<HidReport, TransportError> {
        let deadline = since + timeout;
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some((stamp, report)) = slot.take() {
                if stamp > since {
                    return Ok(report);
                }
                debug!("discarding stale report from a previous exchange");
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(TransportError::Timeout);
            }
            let (guard, _) = self
                .cvar
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            slot = guard;
        }
    }
}

pub struct CallbackTransport {
    device: Arc<Mutex<HidDevice>>,
    slot: Arc<ReportSlot>,
    online: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    reader: Option<thread::JoinHandle<()>>,
}

impl CallbackTransport {
    /// Open the converter through the HID report layer and start the
    /// reader thread feeding the report slot.
    pub fn open() -> Result<Self, SessionError> {
        let api = HidApi::new().map_err(|e| SessionError::ClaimFailed(e.to_string()))?;

        let present = api
            .device_list()
            .any(|d| d.vendor_id() == VENDOR_ID && d.product_id() == PRODUCT_ID);
        if !present {
            return Err(SessionError::DeviceNotFound);
        }

        let device = api
            .open(VENDOR_ID, PRODUCT_ID)
            .map_err(|e| SessionError::ClaimFailed(e.to_string()))?;

        let device = Arc::new(Mutex::new(device));
        let slot = Arc::new(ReportSlot::new());
        let online = Arc::new(AtomicBool::new(true));
        let shutdown = Arc::new(AtomicBool::new(false));

        let reader = {
            let device = Arc::clone(&device);
            let slot = Arc::clone(&slot);
            let online = Arc::clone(&online);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                let mut buf = [0u8; REPORT_SIZE];
                while !shutdown.load(Ordering::Acquire) {
                    let res = {
                        let dev = device.lock().unwrap_or_else(PoisonError::into_inner);
                        dev.read_timeout(&mut buf, READ_POLL.as_millis() as i32)
                    };
                    match res {
                        // Poll interval elapsed with nothing inbound.
                        Ok(0) => {}
                        Ok(_) => slot.publish(HidReport::from(buf)),
                        Err(e) => {
                            warn!("hid reader stopping: {e}");
                            online.store(false, Ordering::Release);
                            break;
                        }
                    }
                }
            })
        };

        Ok(Self {
            device,
            slot,
            online,
            shutdown,
            reader: Some(reader),
        })
    }

    fn check_online(&self) -> Result<(), TransportError> {
        if self.online.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }
}

impl Transport for CallbackTransport {
    fn send(&mut self, report: &HidReport) -> Result<(), TransportError> {
        self.check_online()?;

        // The report layer wants the report ID (0x00) ahead of the payload.
        let mut buf = [0u8; REPORT_SIZE + 1];
        buf[1..].copy_from_slice(report.as_bytes());

        let dev = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        dev.write(&buf)
            .map_err(|e| TransportError::IoFailure(e.to_string()))?;
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<HidReport, TransportError> {
        self.check_online()?;
        self.slot.await_fresh(Instant::now(), timeout)
    }
}

impl Drop for CallbackTransport {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}
