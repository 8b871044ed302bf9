#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! BLE surface bridging the orchestrator with the radio task.
//!
//! The orchestrator drives advertising and HID reports through the
//! [`AdvertisingChannel`] and [`HidChannel`] adapters, which only enqueue a
//! [`BleRequest`]. The radio task owns the host stack and applies requests to
//! an [`AdvertisingPlan`] between connection events.

#[cfg(target_os = "none")]
pub mod server;

use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use portable_atomic::{AtomicBool, Ordering};
use remote_core::beacon::{AdvertisingControl, AdvertisingError, AdvertisingPayload};
use remote_core::hid::{HidReport, HidReportSink, HidSendError};
use remote_core::link::PeerAddress;

use crate::events::RemoteMutex;

/// Depth of the request queue drained by the radio task.
pub const BLE_REQUEST_QUEUE_DEPTH: usize = 8;

/// HID over GATT report map: consumer control, vendor page and a keyboard
/// input report (id `0x0a`) that carries the power key.
pub const HID_REPORT_MAP: [u8; 144] = [
    0x05, 0x0c, 0x09, 0x01, 0xa1, 0x01, 0x85, 0x01, 0x19, 0x00, 0x2a, 0x9c, //
    0x02, 0x15, 0x00, 0x26, 0x9c, 0x02, 0x95, 0x01, 0x75, 0x10, 0x81, 0x00, //
    0x09, 0x02, 0xa1, 0x02, 0x05, 0x09, 0x19, 0x01, 0x29, 0x0a, 0x15, 0x01, //
    0x25, 0x0a, 0x95, 0x01, 0x75, 0x08, 0x81, 0x40, 0xc0, 0xc0, 0x06, 0x01, //
    0xff, 0x09, 0x01, 0xa1, 0x02, 0x85, 0x05, 0x09, 0x14, 0x75, 0x08, 0x95, //
    0x14, 0x15, 0x80, 0x25, 0x7f, 0x81, 0x22, 0x85, 0x04, 0x09, 0x04, 0x75, //
    0x08, 0x95, 0x01, 0x91, 0x02, 0xc0, 0x05, 0x01, 0x09, 0x06, 0xa1, 0x01, //
    0x85, 0x0a, 0x75, 0x01, 0x95, 0x08, 0x05, 0x07, 0x19, 0xe0, 0x29, 0xe7, //
    0x15, 0x00, 0x25, 0x01, 0x81, 0x02, 0x95, 0x01, 0x75, 0x08, 0x81, 0x01, //
    0x95, 0x05, 0x75, 0x01, 0x05, 0x08, 0x19, 0x01, 0x29, 0x05, 0x91, 0x02, //
    0x95, 0x01, 0x75, 0x03, 0x91, 0x01, 0x95, 0x06, 0x75, 0x08, 0x15, 0x00, //
    0x26, 0xff, 0x00, 0x05, 0x07, 0x19, 0x00, 0x29, 0xff, 0x81, 0x00, 0xc0, //
];

/// bcdHID 1.11, country code 0, remote-wake capable.
pub const HID_INFORMATION: [u8; 4] = [0x11, 0x01, 0x00, 0x01];

/// Report id `0x0a`, input report.
pub const REPORT_REFERENCE: [u8; 2] = [0x0a, 0x01];

/// Legacy advertising payload limit.
pub const ADVERTISING_DATA_MAX: usize = 31;

pub const AD_TYPE_INCOMPLETE_SERVICE_UUIDS16: u8 = 0x02;
pub const AD_TYPE_APPEARANCE: u8 = 0x19;

/// GAP appearance: HID keyboard.
pub const KEYBOARD_APPEARANCE: [u8; 2] = [0xc1, 0x03];

/// HID (`0x1812`) and battery (`0x180f`) services, little-endian. Both
/// advertisements list them, as the receiver saw when it paired.
pub const ADVERTISED_SERVICES: [u8; 4] = [0x12, 0x18, 0x0f, 0x18];

/// Flags, appearance and the service list, each with its two-byte header.
const FIXED_AD_LEN: usize = 3 + (2 + KEYBOARD_APPEARANCE.len()) + (2 + ADVERTISED_SERVICES.len());

/// Returns the part of `name` that fits beside the fixed structures and
/// whether that part is the complete name.
pub fn advertised_name(name: &str) -> (&[u8], bool) {
    let room = ADVERTISING_DATA_MAX - FIXED_AD_LEN - 2;
    let bytes = name.as_bytes();
    if bytes.len() <= room {
        (bytes, true)
    } else {
        (&bytes[..room], false)
    }
}

/// Work queued for the radio task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BleRequest {
    StartAdvertising,
    StopAdvertising,
    SetPayload(AdvertisingPayload),
    RestrictTo(PeerAddress),
    SendReport(HidReport),
}

pub type BleRequestQueue = Channel<RemoteMutex, BleRequest, BLE_REQUEST_QUEUE_DEPTH>;

pub type BleRequestSender<'a> = Sender<'a, RemoteMutex, BleRequest, BLE_REQUEST_QUEUE_DEPTH>;

pub type BleRequestReceiver<'a> = Receiver<'a, RemoteMutex, BleRequest, BLE_REQUEST_QUEUE_DEPTH>;

/// Connection flag maintained by the radio task.
pub struct LinkFlag(AtomicBool);

impl LinkFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn set(&self, connected: bool) {
        self.0.store(connected, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for LinkFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// [`AdvertisingControl`] backed by the radio request queue.
pub struct AdvertisingChannel<'a> {
    sender: BleRequestSender<'a>,
}

impl<'a> AdvertisingChannel<'a> {
    pub fn new(sender: BleRequestSender<'a>) -> Self {
        Self { sender }
    }

    fn enqueue(&mut self, request: BleRequest) -> Result<(), AdvertisingError> {
        self.sender
            .try_send(request)
            .map_err(|TrySendError::Full(_)| AdvertisingError::Unavailable)
    }
}

impl AdvertisingControl for AdvertisingChannel<'_> {
    fn start_advertising(&mut self) -> Result<(), AdvertisingError> {
        self.enqueue(BleRequest::StartAdvertising)
    }

    fn stop_advertising(&mut self) -> Result<(), AdvertisingError> {
        self.enqueue(BleRequest::StopAdvertising)
    }

    fn set_payload(&mut self, payload: AdvertisingPayload) -> Result<(), AdvertisingError> {
        self.enqueue(BleRequest::SetPayload(payload))
    }

    fn restrict_to(&mut self, peer: PeerAddress) -> Result<(), AdvertisingError> {
        self.enqueue(BleRequest::RestrictTo(peer))
    }
}

/// [`HidReportSink`] backed by the radio request queue.
pub struct HidChannel<'a> {
    sender: BleRequestSender<'a>,
    link: &'a LinkFlag,
}

impl<'a> HidChannel<'a> {
    pub fn new(sender: BleRequestSender<'a>, link: &'a LinkFlag) -> Self {
        Self { sender, link }
    }
}

impl HidReportSink for HidChannel<'_> {
    fn send_report(&mut self, report: &HidReport) -> Result<(), HidSendError> {
        if !self.link.is_connected() {
            return Err(HidSendError::NotConnected);
        }
        self.sender
            .try_send(BleRequest::SendReport(*report))
            .map_err(|TrySendError::Full(_)| HidSendError::Unavailable)
    }
}

/// Advertising state owned by the radio task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AdvertisingPlan {
    enabled: bool,
    payload: AdvertisingPayload,
    allowed: Option<PeerAddress>,
}

impl AdvertisingPlan {
    pub const fn new() -> Self {
        Self {
            enabled: false,
            payload: AdvertisingPayload::DeviceName,
            allowed: None,
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub const fn payload(&self) -> AdvertisingPayload {
        self.payload
    }

    pub const fn allowed_peer(&self) -> Option<PeerAddress> {
        self.allowed
    }

    /// Applies a request, handing back the report when it has to be sent.
    pub fn apply(&mut self, request: BleRequest) -> Option<HidReport> {
        match request {
            BleRequest::StartAdvertising => self.enabled = true,
            BleRequest::StopAdvertising => self.enabled = false,
            BleRequest::SetPayload(payload) => self.payload = payload,
            BleRequest::RestrictTo(peer) => {
                // First restriction wins.
                if self.allowed.is_none() {
                    self.allowed = Some(peer);
                }
            }
            BleRequest::SendReport(report) => return Some(report),
        }
        None
    }

    /// Returns `true` when `peer` may hold a connection.
    pub fn admits(&self, peer: PeerAddress) -> bool {
        self.allowed.is_none_or(|allowed| allowed == peer)
    }
}

impl Default for AdvertisingPlan {
    fn default() -> Self {
        Self::new()
    }
}
