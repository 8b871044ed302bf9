//! Point-in-time status summaries for logs and the emulator.

use core::fmt;

use crate::command::PowerIntent;
use crate::link::PeerAddress;
use crate::orchestrator::LifecycleState;
use crate::reconciler::PowerStatus;
use crate::toggle::ExpectedTransition;

/// Snapshot of orchestrator and reconciler state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusSnapshot {
    pub lifecycle: LifecycleState,
    pub peer_connected: bool,
    pub bonded_peer: Option<PeerAddress>,
    pub pending: Option<PowerIntent>,
    pub awaiting: Option<ExpectedTransition>,
    pub published: Option<PowerStatus>,
}

impl StatusSnapshot {
    /// Returns `true` when a command arriving now would be dropped as busy.
    #[must_use]
    pub const fn busy(&self) -> bool {
        self.lifecycle.is_transient() || self.pending.is_some() || self.awaiting.is_some()
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "state={} link={}",
            self.lifecycle,
            if self.peer_connected { "up" } else { "down" }
        )?;

        match self.bonded_peer {
            Some(peer) => write!(f, " bonded={peer}")?,
            None => f.write_str(" bonded=none")?,
        }
        if let Some(intent) = self.pending {
            write!(f, " pending={intent}")?;
        }
        if let Some(expected) = self.awaiting {
            write!(f, " awaiting={expected}")?;
        }
        match self.published {
            Some(status) => write!(f, " published={status}"),
            None => f.write_str(" published=none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use core::fmt::Write;

    use heapless::String;

    use super::*;

    #[test]
    fn renders_single_line_summary() {
        let snapshot = StatusSnapshot {
            lifecycle: LifecycleState::Connected,
            peer_connected: true,
            bonded_peer: Some(PeerAddress::new([0xc0, 0xde, 0x52, 0, 0, 3])),
            pending: None,
            awaiting: Some(ExpectedTransition::Disconnect),
            published: Some(PowerStatus::On),
        };

        let mut line = String::<128>::new();
        write!(line, "{snapshot}").unwrap();

        assert_eq!(
            line.as_str(),
            "state=connected link=up bonded=c0:de:52:00:00:03 awaiting=disconnect published=ON"
        );
        assert!(snapshot.busy());
    }
}
