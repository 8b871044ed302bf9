//! Telemetry event catalog shared by firmware and host targets.
//!
//! The core never logs. Every decision worth observing is recorded into a
//! fixed-capacity ring of timestamped [`TelemetryRecord`]s; the firmware
//! forwards new records to defmt and the emulator prints them on request.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::beacon::AdvertisingError;
use crate::command::{IngestRejection, PowerIntent};
use crate::hid::HidSendError;
use crate::link::PeerAddress;
use crate::orchestrator::LifecycleState;
use crate::reconciler::{PowerStatus, PublishError};
use crate::toggle::ExpectedTransition;

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    LifecycleChanged(LifecycleState),
    CommandAccepted(PowerIntent),
    CommandDropped(IngestRejection),
    PeerBonded(PeerAddress),
    PeerRejected(PeerAddress),
    PowerKeyDown,
    PowerKeyUp,
    ToggleConfirmed(ExpectedTransition),
    ToggleTimedOut(ExpectedTransition),
    StatusPublished(PowerStatus),
    PublishFailed(PublishError),
    AdvertisingFailed(AdvertisingError),
    /// A previously refused advertising request was accepted on retry.
    AdvertisingRestored,
    HidSendFailed(HidSendError),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::LifecycleChanged(state) => write!(f, "lifecycle {state}"),
            TelemetryEventKind::CommandAccepted(intent) => write!(f, "command-accepted {intent}"),
            TelemetryEventKind::CommandDropped(reason) => write!(f, "command-dropped {reason}"),
            TelemetryEventKind::PeerBonded(peer) => write!(f, "peer-bonded {peer}"),
            TelemetryEventKind::PeerRejected(peer) => write!(f, "peer-rejected {peer}"),
            TelemetryEventKind::PowerKeyDown => f.write_str("power-key-down"),
            TelemetryEventKind::PowerKeyUp => f.write_str("power-key-up"),
            TelemetryEventKind::ToggleConfirmed(expected) => {
                write!(f, "toggle-confirmed {expected}")
            }
            TelemetryEventKind::ToggleTimedOut(expected) => {
                write!(f, "toggle-timed-out awaiting {expected}")
            }
            TelemetryEventKind::StatusPublished(status) => write!(f, "status-published {status}"),
            TelemetryEventKind::PublishFailed(err) => write!(f, "publish-failed ({err})"),
            TelemetryEventKind::AdvertisingFailed(err) => {
                write!(f, "advertising-failed ({err})")
            }
            TelemetryEventKind::AdvertisingRestored => f.write_str("advertising-restored"),
            TelemetryEventKind::HidSendFailed(err) => write!(f, "hid-send-failed ({err})"),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    None,
    /// Lifecycle transition details.
    Lifecycle(LifecycleTelemetry),
    /// Status publish details.
    Publish(PublishTelemetry),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LifecycleTelemetry {
    pub from: LifecycleState,
    /// Time spent in `from`, when an earlier transition was recorded.
    pub dwell: Option<Duration>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PublishTelemetry {
    /// Publish was forced by the resync cadence or a republish request.
    pub forced: bool,
}

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_transition_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_transition_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Records with an id of at least `first`, oldest first.
    ///
    /// Used to forward only what was recorded since the previous drain.
    pub fn since(&self, first: EventId) -> impl Iterator<Item = &TelemetryRecord<TInstant>> {
        self.oldest_first().filter(move |record| record.id >= first)
    }

    /// Id that the next recorded event will receive.
    #[must_use]
    pub const fn next_id(&self) -> EventId {
        self.next_event_id
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records a lifecycle transition with the dwell time in the previous state.
    pub fn record_transition(
        &mut self,
        from: LifecycleState,
        to: LifecycleState,
        timestamp: TInstant,
    ) -> EventId {
        let dwell = self
            .last_transition_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_transition_at = Some(timestamp);

        self.record(
            TelemetryEventKind::LifecycleChanged(to),
            TelemetryPayload::Lifecycle(LifecycleTelemetry { from, dwell }),
            timestamp,
        )
    }

    /// Records an event that carries no payload.
    pub fn record_event(&mut self, event: TelemetryEventKind, timestamp: TInstant) -> EventId {
        self.record(event, TelemetryPayload::None, timestamp)
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}
