//! Wake beacon control.
//!
//! While the receiver is disconnected the peripheral always advertises, either
//! with its device name or, for a bounded window after a power-on request,
//! with a manufacturer-data signature the sleeping receiver treats as a wake
//! signal.

use core::fmt;

use crate::link::PeerAddress;

/// Manufacturer-specific data recognised by the receiver as a wake request.
pub const WAKE_MANUFACTURER_DATA: [u8; 13] = [
    0x46, 0x00, 0x46, 0xFA, 0xC1, 0x69, 0x04, 0xC8, 0x38, 0xFF, 0xFF, 0xFF, 0xFF,
];

/// Advertising payload variants understood by the peripheral collaborator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AdvertisingPayload {
    /// Normal discoverable advertisement carrying the device name.
    DeviceName,
    /// Wake signal carrying [`WAKE_MANUFACTURER_DATA`] in place of the name.
    WakeSignal,
}

impl AdvertisingPayload {
    /// Manufacturer data to embed, if any.
    #[must_use]
    pub const fn manufacturer_data(self) -> Option<&'static [u8]> {
        match self {
            AdvertisingPayload::DeviceName => None,
            AdvertisingPayload::WakeSignal => Some(&WAKE_MANUFACTURER_DATA),
        }
    }
}

impl fmt::Display for AdvertisingPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvertisingPayload::DeviceName => f.write_str("name"),
            AdvertisingPayload::WakeSignal => f.write_str("wake-signal"),
        }
    }
}

/// Failure reported by the advertising layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AdvertisingError {
    /// The request could not be handed to the radio task.
    Unavailable,
    /// The controller refused the request.
    Rejected,
}

impl fmt::Display for AdvertisingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvertisingError::Unavailable => f.write_str("advertising unavailable"),
            AdvertisingError::Rejected => f.write_str("advertising request rejected"),
        }
    }
}

/// Advertising surface of the BLE peripheral.
pub trait AdvertisingControl {
    /// Begins (or resumes) advertising with the current payload.
    fn start_advertising(&mut self) -> Result<(), AdvertisingError>;

    /// Stops advertising.
    fn stop_advertising(&mut self) -> Result<(), AdvertisingError>;

    /// Replaces the payload used by subsequent advertising.
    fn set_payload(&mut self, payload: AdvertisingPayload) -> Result<(), AdvertisingError>;

    /// Restricts advertising (and connections) to a single peer.
    fn restrict_to(&mut self, peer: PeerAddress) -> Result<(), AdvertisingError>;
}

/// Toggles the peripheral between normal and wake advertising.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct WakeBeacon {
    waking: bool,
}

impl WakeBeacon {
    #[must_use]
    pub const fn new() -> Self {
        Self { waking: false }
    }

    #[must_use]
    pub const fn is_waking(&self) -> bool {
        self.waking
    }

    /// Switches to the wake payload and starts advertising.
    pub fn start_waking<A>(&mut self, advertiser: &mut A) -> Result<(), AdvertisingError>
    where
        A: AdvertisingControl,
    {
        advertiser.set_payload(AdvertisingPayload::WakeSignal)?;
        advertiser.start_advertising()?;
        self.waking = true;
        Ok(())
    }

    /// Reverts to the name-bearing advertisement and keeps advertising.
    ///
    /// The waking flag is cleared even if the advertiser fails, since the
    /// window is over either way.
    pub fn stop_waking<A>(&mut self, advertiser: &mut A) -> Result<(), AdvertisingError>
    where
        A: AdvertisingControl,
    {
        self.waking = false;
        self.resume_normal(advertiser)
    }

    /// Advertises the device name.
    pub fn resume_normal<A>(&mut self, advertiser: &mut A) -> Result<(), AdvertisingError>
    where
        A: AdvertisingControl,
    {
        advertiser.set_payload(AdvertisingPayload::DeviceName)?;
        advertiser.start_advertising()
    }

    /// Stops advertising altogether, as done once the receiver connects.
    pub fn silence<A>(&mut self, advertiser: &mut A) -> Result<(), AdvertisingError>
    where
        A: AdvertisingControl,
    {
        self.waking = false;
        advertiser.set_payload(AdvertisingPayload::DeviceName)?;
        advertiser.stop_advertising()
    }
}

#[cfg(test)]
mod tests {
    use heapless::Vec;

    use super::*;

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    enum Call {
        Start,
        Stop,
        Payload(AdvertisingPayload),
        Restrict(PeerAddress),
    }

    #[derive(Default)]
    struct RecordingAdvertiser {
        calls: Vec<Call, 8>,
        fail_start: bool,
    }

    impl AdvertisingControl for RecordingAdvertiser {
        fn start_advertising(&mut self) -> Result<(), AdvertisingError> {
            if self.fail_start {
                return Err(AdvertisingError::Rejected);
            }
            self.calls.push(Call::Start).unwrap();
            Ok(())
        }

        fn stop_advertising(&mut self) -> Result<(), AdvertisingError> {
            self.calls.push(Call::Stop).unwrap();
            Ok(())
        }

        fn set_payload(&mut self, payload: AdvertisingPayload) -> Result<(), AdvertisingError> {
            self.calls.push(Call::Payload(payload)).unwrap();
            Ok(())
        }

        fn restrict_to(&mut self, peer: PeerAddress) -> Result<(), AdvertisingError> {
            self.calls.push(Call::Restrict(peer)).unwrap();
            Ok(())
        }
    }

    #[test]
    fn waking_swaps_payload_then_reverts_to_name() {
        let mut advertiser = RecordingAdvertiser::default();
        let mut beacon = WakeBeacon::new();

        beacon.start_waking(&mut advertiser).unwrap();
        assert!(beacon.is_waking());
        beacon.stop_waking(&mut advertiser).unwrap();
        assert!(!beacon.is_waking());

        assert_eq!(
            advertiser.calls.as_slice(),
            &[
                Call::Payload(AdvertisingPayload::WakeSignal),
                Call::Start,
                Call::Payload(AdvertisingPayload::DeviceName),
                Call::Start,
            ]
        );
    }

    #[test]
    fn failed_start_leaves_beacon_idle() {
        let mut advertiser = RecordingAdvertiser {
            fail_start: true,
            ..RecordingAdvertiser::default()
        };
        let mut beacon = WakeBeacon::new();

        assert_eq!(
            beacon.start_waking(&mut advertiser),
            Err(AdvertisingError::Rejected)
        );
        assert!(!beacon.is_waking());
    }

    #[test]
    fn wake_payload_carries_signature() {
        assert_eq!(
            AdvertisingPayload::WakeSignal.manufacturer_data(),
            Some(&WAKE_MANUFACTURER_DATA[..])
        );
        assert_eq!(AdvertisingPayload::DeviceName.manufacturer_data(), None);
        assert_eq!(WAKE_MANUFACTURER_DATA[..2], [0x46, 0x00]);
    }
}
