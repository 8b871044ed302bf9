//! Status reconciliation with the MQTT topic.
//!
//! The externally visible status is derived from the lifecycle on every tick.
//! It is published when it differs from what was last published successfully,
//! and unconditionally on a fixed cadence so a message dropped by the broker
//! cannot leave subscribers stale for long.

use core::{fmt, ops::Add, time::Duration};

use crate::orchestrator::LifecycleState;
use crate::telemetry::{
    PublishTelemetry, TelemetryEventKind, TelemetryInstant, TelemetryPayload, TelemetryRecorder,
};

/// Power status as seen by MQTT subscribers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerStatus {
    On,
    Off,
}

impl PowerStatus {
    /// `On` while the receiver is connected or being shut down.
    #[must_use]
    pub const fn from_lifecycle(state: LifecycleState) -> Self {
        match state {
            LifecycleState::Connected | LifecycleState::ShuttingDown => PowerStatus::On,
            LifecycleState::Standby | LifecycleState::WakingUp => PowerStatus::Off,
        }
    }

    #[must_use]
    pub const fn as_payload(self) -> &'static str {
        match self {
            PowerStatus::On => "ON",
            PowerStatus::Off => "OFF",
        }
    }
}

impl fmt::Display for PowerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_payload())
    }
}

/// Failure reported by the status transport.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PublishError {
    /// No broker session is established.
    NotConnected,
    /// Outbound queue is full.
    QueueFull,
    /// Transport rejected the publish.
    Transport,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::NotConnected => f.write_str("broker not connected"),
            PublishError::QueueFull => f.write_str("outbound queue full"),
            PublishError::Transport => f.write_str("transport error"),
        }
    }
}

/// Outbound side of the network collaborator.
pub trait StatusPublisher {
    fn publish(&mut self, status: PowerStatus) -> Result<(), PublishError>;
}

/// Result of a reconciliation pass.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SyncOutcome {
    /// Status unchanged and no forced publish was due.
    Skipped,
    Published { status: PowerStatus, forced: bool },
    Failed(PublishError),
}

/// Publishes lifecycle-derived status with change detection and forced resync.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusReconciler<TInstant> {
    interval: Duration,
    last_published: Option<PowerStatus>,
    next_forced_at: Option<TInstant>,
    republish_requested: bool,
}

impl<TInstant> StatusReconciler<TInstant>
where
    TInstant: TelemetryInstant + Ord + Add<Duration, Output = TInstant>,
{
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_published: None,
            next_forced_at: None,
            republish_requested: false,
        }
    }

    /// Last status the transport accepted, if any.
    #[must_use]
    pub const fn last_published(&self) -> Option<PowerStatus> {
        self.last_published
    }

    #[must_use]
    pub const fn next_forced_at(&self) -> Option<TInstant> {
        self.next_forced_at
    }

    /// Forces the next pass to publish, as after a timed-out toggle.
    pub fn request_republish(&mut self) {
        self.republish_requested = true;
    }

    /// Forgets the last publish, as after the broker session is re-established.
    pub fn invalidate(&mut self) {
        self.last_published = None;
    }

    /// Pushes the forced-resync deadline a full interval past `now`.
    pub fn restart_cadence(&mut self, now: TInstant) {
        self.next_forced_at = Some(now + self.interval);
    }

    /// Publishes the status for `state` when it changed or a publish is forced.
    pub fn sync<P, const CAP: usize>(
        &mut self,
        state: LifecycleState,
        now: TInstant,
        publisher: &mut P,
        telemetry: &mut TelemetryRecorder<TInstant, CAP>,
    ) -> SyncOutcome
    where
        P: StatusPublisher,
    {
        let status = PowerStatus::from_lifecycle(state);

        let cadence_due = match self.next_forced_at {
            Some(deadline) => now >= deadline,
            None => {
                self.restart_cadence(now);
                false
            }
        };
        if cadence_due {
            self.restart_cadence(now);
        }

        let forced = cadence_due || self.republish_requested;
        if !forced && self.last_published == Some(status) {
            return SyncOutcome::Skipped;
        }
        self.republish_requested = false;

        match publisher.publish(status) {
            Ok(()) => {
                self.last_published = Some(status);
                telemetry.record(
                    TelemetryEventKind::StatusPublished(status),
                    TelemetryPayload::Publish(PublishTelemetry { forced }),
                    now,
                );
                SyncOutcome::Published { status, forced }
            }
            Err(err) => {
                // Retry unconditionally on the next pass.
                self.last_published = None;
                telemetry.record_event(TelemetryEventKind::PublishFailed(err), now);
                SyncOutcome::Failed(err)
            }
        }
    }
}
