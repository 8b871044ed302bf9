//! Single owner of all remote state.
//!
//! Stack callbacks only produce [`RemoteEvent`]s. The task that owns the
//! [`RemoteContext`] applies them, then ticks the orchestrator and reconciles
//! the published status, so every piece of mutable state has one writer.

use crate::beacon::{AdvertisingControl, AdvertisingError};
use crate::command::{CommandParseError, IngestRejection, PowerIntent, RemoteCommand};
use crate::config::OrchestratorConfig;
use crate::hid::HidReportSink;
use crate::link::{LinkEvent, LinkUpdate};
use crate::orchestrator::{Orchestrator, OrchestratorInstant, TickReport};
use crate::reconciler::{StatusPublisher, StatusReconciler, SyncOutcome};
use crate::status::StatusSnapshot;
use crate::telemetry::{TELEMETRY_RING_CAPACITY, TelemetryRecorder};

/// Event queued by a stack callback for the orchestration context.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RemoteEvent {
    Link(LinkEvent),
    /// Inbound command, parsed by the transport as it arrived.
    Command(Result<RemoteCommand, CommandParseError>),
    /// Broker session (re)established and subscribed.
    BrokerSessionUp,
}

impl RemoteEvent {
    /// Builds a command event from a raw payload.
    #[must_use]
    pub fn from_payload(payload: &[u8]) -> Self {
        RemoteEvent::Command(RemoteCommand::parse(payload))
    }
}

/// How the context disposed of a [`RemoteEvent`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EventDisposition {
    Link(LinkUpdate),
    Command(Result<PowerIntent, IngestRejection>),
    StatusInvalidated,
}

/// Result of one [`RemoteContext::tick`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ContextTick {
    pub report: TickReport,
    pub sync: SyncOutcome,
}

/// Orchestrator, reconciler, publisher and telemetry, owned together.
pub struct RemoteContext<TInstant, A, H, P, const CAP: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    orchestrator: Orchestrator<TInstant, A, H>,
    reconciler: StatusReconciler<TInstant>,
    publisher: P,
    telemetry: TelemetryRecorder<TInstant, CAP>,
}

impl<TInstant, A, H, P, const CAP: usize> RemoteContext<TInstant, A, H, P, CAP>
where
    TInstant: OrchestratorInstant,
    A: AdvertisingControl,
    H: HidReportSink,
    P: StatusPublisher,
{
    pub fn new(config: OrchestratorConfig, advertiser: A, hid: H, publisher: P) -> Self {
        Self {
            orchestrator: Orchestrator::new(config, advertiser, hid),
            reconciler: StatusReconciler::new(config.force_sync_interval()),
            publisher,
            telemetry: TelemetryRecorder::new(),
        }
    }

    /// Starts normal advertising.
    pub fn start(&mut self) -> Result<(), AdvertisingError> {
        self.orchestrator.start()
    }

    /// Applies a queued event.
    pub fn handle(&mut self, event: RemoteEvent, now: TInstant) -> EventDisposition {
        match event {
            RemoteEvent::Link(link) => EventDisposition::Link(self.orchestrator.on_link_event(
                link,
                now,
                &mut self.telemetry,
            )),
            RemoteEvent::Command(parsed) => {
                let result = self
                    .orchestrator
                    .submit_parsed(parsed, now, &mut self.telemetry);
                if result.is_ok() {
                    self.reconciler.restart_cadence(now);
                }
                EventDisposition::Command(result)
            }
            RemoteEvent::BrokerSessionUp => {
                self.reconciler.invalidate();
                EventDisposition::StatusInvalidated
            }
        }
    }

    /// Ticks the orchestrator and reconciles the published status.
    ///
    /// A failed or timed-out operation forces a republish so subscribers see
    /// the real state again and can retry.
    pub fn tick(&mut self, now: TInstant) -> ContextTick {
        let report = self.orchestrator.tick(now, &mut self.telemetry);
        if report.failed.is_some() {
            self.reconciler.request_republish();
        }

        let sync = self.reconciler.sync(
            self.orchestrator.lifecycle(),
            now,
            &mut self.publisher,
            &mut self.telemetry,
        );

        ContextTick { report, sync }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            lifecycle: self.orchestrator.lifecycle(),
            peer_connected: self.orchestrator.is_peer_connected(),
            bonded_peer: self.orchestrator.bonded_peer(),
            pending: self.orchestrator.pending_intent(),
            awaiting: self.orchestrator.awaiting(),
            published: self.reconciler.last_published(),
        }
    }

    pub const fn orchestrator(&self) -> &Orchestrator<TInstant, A, H> {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator<TInstant, A, H> {
        &mut self.orchestrator
    }

    pub const fn reconciler(&self) -> &StatusReconciler<TInstant> {
        &self.reconciler
    }

    pub const fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    pub const fn telemetry(&self) -> &TelemetryRecorder<TInstant, CAP> {
        &self.telemetry
    }
}
