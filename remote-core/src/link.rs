//! Connection tracking for the single paired receiver.
//!
//! The BLE stack reports connects and disconnects from its own execution
//! context; those reports are queued as [`LinkEvent`]s and applied here by the
//! orchestrator. A connect is authoritative the moment it is applied, with the
//! exception of peers rejected by the [`BondingPolicy`].

use core::fmt;

use crate::bonding::{BondDecision, BondingPolicy};

/// 48-bit Bluetooth device address, most significant byte first.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PeerAddress([u8; 6]);

impl PeerAddress {
    #[must_use]
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Builds an address from the little-endian byte order used on the air.
    #[must_use]
    pub const fn from_le_bytes(bytes: [u8; 6]) -> Self {
        Self([bytes[5], bytes[4], bytes[3], bytes[2], bytes[1], bytes[0]])
    }

    #[must_use]
    pub const fn to_le_bytes(&self) -> [u8; 6] {
        let b = self.0;
        [b[5], b[4], b[3], b[2], b[1], b[0]]
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Connection-state notification delivered by the peripheral stack.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkEvent {
    Connected(PeerAddress),
    Disconnected,
}

/// Result of applying a [`LinkEvent`] to the monitor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkUpdate {
    /// First connection ever; the peer is now the bonded receiver.
    Bonded(PeerAddress),
    /// The bonded receiver connected again.
    Reconnected(PeerAddress),
    /// A connect from a foreign address after bonding; ignored.
    Rejected(PeerAddress),
    /// The connected peer went away.
    Lost,
    /// Event carried no new information.
    Unchanged,
}

impl LinkUpdate {
    /// Returns `true` when the update changed the connected flag.
    #[must_use]
    pub const fn is_transition(self) -> bool {
        matches!(
            self,
            LinkUpdate::Bonded(_) | LinkUpdate::Reconnected(_) | LinkUpdate::Lost
        )
    }
}

/// Tracks whether the receiver is currently connected.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LinkMonitor {
    connected: Option<PeerAddress>,
}

impl LinkMonitor {
    #[must_use]
    pub const fn new() -> Self {
        Self { connected: None }
    }

    #[must_use]
    pub const fn is_peer_connected(&self) -> bool {
        self.connected.is_some()
    }

    #[must_use]
    pub const fn connected_peer(&self) -> Option<PeerAddress> {
        self.connected
    }

    /// Applies a stack notification, consulting the bonding policy on connects.
    pub fn apply(&mut self, event: LinkEvent, bonding: &mut BondingPolicy) -> LinkUpdate {
        match event {
            LinkEvent::Connected(address) => match bonding.evaluate(address) {
                BondDecision::Rejected => LinkUpdate::Rejected(address),
                decision => {
                    let already = self.connected == Some(address);
                    self.connected = Some(address);
                    match decision {
                        BondDecision::NewlyBonded => LinkUpdate::Bonded(address),
                        _ if already => LinkUpdate::Unchanged,
                        _ => LinkUpdate::Reconnected(address),
                    }
                }
            },
            LinkEvent::Disconnected => {
                if self.connected.take().is_some() {
                    LinkUpdate::Lost
                } else {
                    LinkUpdate::Unchanged
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECEIVER: PeerAddress = PeerAddress::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    const STRANGER: PeerAddress = PeerAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);

    #[test]
    fn first_connect_bonds_and_marks_connected() {
        let mut monitor = LinkMonitor::new();
        let mut bonding = BondingPolicy::new();

        let update = monitor.apply(LinkEvent::Connected(RECEIVER), &mut bonding);

        assert_eq!(update, LinkUpdate::Bonded(RECEIVER));
        assert!(monitor.is_peer_connected());
        assert_eq!(monitor.connected_peer(), Some(RECEIVER));
        assert_eq!(bonding.bonded_peer(), Some(RECEIVER));
    }

    #[test]
    fn foreign_peer_is_ignored_after_bonding() {
        let mut monitor = LinkMonitor::new();
        let mut bonding = BondingPolicy::new();
        monitor.apply(LinkEvent::Connected(RECEIVER), &mut bonding);
        monitor.apply(LinkEvent::Disconnected, &mut bonding);

        let update = monitor.apply(LinkEvent::Connected(STRANGER), &mut bonding);

        assert_eq!(update, LinkUpdate::Rejected(STRANGER));
        assert!(!monitor.is_peer_connected());
        assert_eq!(bonding.bonded_peer(), Some(RECEIVER));
    }

    #[test]
    fn reconnect_of_bonded_peer_is_reported() {
        let mut monitor = LinkMonitor::new();
        let mut bonding = BondingPolicy::new();
        monitor.apply(LinkEvent::Connected(RECEIVER), &mut bonding);
        assert_eq!(
            monitor.apply(LinkEvent::Disconnected, &mut bonding),
            LinkUpdate::Lost
        );

        let update = monitor.apply(LinkEvent::Connected(RECEIVER), &mut bonding);
        assert_eq!(update, LinkUpdate::Reconnected(RECEIVER));
        assert!(update.is_transition());
    }

    #[test]
    fn duplicate_events_are_unchanged() {
        let mut monitor = LinkMonitor::new();
        let mut bonding = BondingPolicy::new();

        assert_eq!(
            monitor.apply(LinkEvent::Disconnected, &mut bonding),
            LinkUpdate::Unchanged
        );
        monitor.apply(LinkEvent::Connected(RECEIVER), &mut bonding);
        assert_eq!(
            monitor.apply(LinkEvent::Connected(RECEIVER), &mut bonding),
            LinkUpdate::Unchanged
        );
    }

    #[test]
    fn address_formats_and_swaps_byte_order() {
        let address = PeerAddress::from_le_bytes([0x03, 0x00, 0x00, 0x52, 0xde, 0xc0]);
        let mut rendered = heapless::String::<17>::new();
        core::fmt::write(&mut rendered, format_args!("{address}")).unwrap();

        assert_eq!(rendered.as_str(), "c0:de:52:00:00:03");
        assert_eq!(address.to_le_bytes(), [0x03, 0x00, 0x00, 0x52, 0xde, 0xc0]);
    }
}
