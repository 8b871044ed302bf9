//! Single-peer allow-list.
//!
//! The first receiver that connects becomes the only peer accepted for the
//! rest of the process lifetime. There is no unbind operation.

use crate::link::PeerAddress;

/// Verdict for a connecting address.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BondDecision {
    /// No peer was bonded; this address now is.
    NewlyBonded,
    /// Address matches the bonded peer.
    Recognized,
    /// A different peer is already bonded.
    Rejected,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BondingPolicy {
    bonded: Option<PeerAddress>,
}

impl BondingPolicy {
    #[must_use]
    pub const fn new() -> Self {
        Self { bonded: None }
    }

    #[must_use]
    pub const fn bonded_peer(&self) -> Option<PeerAddress> {
        self.bonded
    }

    /// Evaluates a connecting address, bonding it when no peer is bonded yet.
    pub fn evaluate(&mut self, address: PeerAddress) -> BondDecision {
        match self.bonded {
            None => {
                self.bonded = Some(address);
                BondDecision::NewlyBonded
            }
            Some(bonded) if bonded == address => BondDecision::Recognized,
            Some(_) => BondDecision::Rejected,
        }
    }
}
