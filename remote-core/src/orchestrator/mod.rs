//! Power-state orchestrator.
//!
//! The orchestrator owns the canonical [`LifecycleState`] and is its only
//! writer. Link events and admitted commands are queued into it cheaply; all
//! timed behaviour happens in [`Orchestrator::tick`], which is evaluated on a
//! fixed period and never blocks. Deadlines are absolute instants derived from
//! [`OrchestratorConfig`], so the tick period only bounds latency.
//!
//! Each tick runs in a fixed order:
//! 1. re-apply advertising requests the radio refused earlier,
//! 2. reconcile the lifecycle with the link state,
//! 3. advance the wake window or the key press,
//! 4. judge any armed outcome watch,
//! 5. consume the pending intent, if it still fits the state.
//!
//! A refused advertising request is never dropped: the orchestrator keeps
//! re-issuing whatever the current state calls for (name, wake signal or
//! silence) and any outstanding peer restriction until the radio accepts.

use core::{fmt, ops::Add, time::Duration};

use crate::beacon::{AdvertisingControl, AdvertisingError, WakeBeacon};
use crate::bonding::BondingPolicy;
use crate::command::{
    CommandParseError, IngestRejection, IngestView, PowerIntent, RemoteCommand, admit,
};
use crate::config::OrchestratorConfig;
use crate::hid::HidReportSink;
use crate::link::{LinkEvent, LinkMonitor, LinkUpdate, PeerAddress};
use crate::telemetry::{TelemetryEventKind, TelemetryInstant, TelemetryRecorder};
use crate::toggle::{
    ExpectedTransition, OutcomeVerdict, OutcomeWatch, PowerToggleSequencer, PressProgress,
};

/// Instant types the orchestrator can schedule against.
pub trait OrchestratorInstant:
    TelemetryInstant + Ord + Add<Duration, Output = Self>
{
}

impl<T> OrchestratorInstant for T where T: TelemetryInstant + Ord + Add<Duration, Output = T> {}

/// Device lifecycle. `WakingUp` and `ShuttingDown` are transient.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum LifecycleState {
    #[default]
    Standby,
    WakingUp,
    Connected,
    ShuttingDown,
}

impl LifecycleState {
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, LifecycleState::WakingUp | LifecycleState::ShuttingDown)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Standby => f.write_str("standby"),
            LifecycleState::WakingUp => f.write_str("waking-up"),
            LifecycleState::Connected => f.write_str("connected"),
            LifecycleState::ShuttingDown => f.write_str("shutting-down"),
        }
    }
}

/// Summary of one [`Orchestrator::tick`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickReport {
    /// Lifecycle at the start of the tick.
    pub previous: LifecycleState,
    /// Lifecycle at the end of the tick.
    pub lifecycle: LifecycleState,
    /// An operation's expected transition was observed.
    pub confirmed: Option<ExpectedTransition>,
    /// An operation timed out or could not be started.
    pub failed: Option<ExpectedTransition>,
}

impl TickReport {
    const fn new(state: LifecycleState) -> Self {
        Self {
            previous: state,
            lifecycle: state,
            confirmed: None,
            failed: None,
        }
    }

    #[must_use]
    pub fn changed(&self) -> bool {
        self.previous != self.lifecycle
    }
}

/// Central state machine driving the beacon and the power-button press.
pub struct Orchestrator<TInstant, A, H> {
    config: OrchestratorConfig,
    state: LifecycleState,
    pending: Option<PowerIntent>,
    link: LinkMonitor,
    bonding: BondingPolicy,
    beacon: WakeBeacon,
    sequencer: PowerToggleSequencer<TInstant>,
    watch: Option<OutcomeWatch<TInstant>>,
    wake_deadline: Option<TInstant>,
    /// The radio may not match the state's advertising.
    advertising_stale: bool,
    restriction_pending: Option<PeerAddress>,
    advertiser: A,
    hid: H,
}

impl<TInstant, A, H> Orchestrator<TInstant, A, H>
where
    TInstant: OrchestratorInstant,
    A: AdvertisingControl,
    H: HidReportSink,
{
    pub fn new(config: OrchestratorConfig, advertiser: A, hid: H) -> Self {
        Self {
            config,
            state: LifecycleState::Standby,
            pending: None,
            link: LinkMonitor::new(),
            bonding: BondingPolicy::new(),
            beacon: WakeBeacon::new(),
            sequencer: PowerToggleSequencer::new(config.press_hold()),
            watch: None,
            wake_deadline: None,
            advertising_stale: false,
            restriction_pending: None,
            advertiser,
            hid,
        }
    }

    /// Begins normal advertising so the device is never silent while disconnected.
    ///
    /// A failure is retried on every tick until the radio accepts.
    pub fn start(&mut self) -> Result<(), AdvertisingError> {
        let result = self.beacon.resume_normal(&mut self.advertiser);
        self.advertising_stale = result.is_err();
        result
    }

    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub const fn lifecycle(&self) -> LifecycleState {
        self.state
    }

    pub const fn is_peer_connected(&self) -> bool {
        self.link.is_peer_connected()
    }

    pub const fn bonded_peer(&self) -> Option<PeerAddress> {
        self.bonding.bonded_peer()
    }

    pub const fn pending_intent(&self) -> Option<PowerIntent> {
        self.pending
    }

    /// Expected transition still being watched for, if any.
    pub fn awaiting(&self) -> Option<ExpectedTransition> {
        self.watch.map(|watch| watch.expected())
    }

    pub const fn is_waking(&self) -> bool {
        self.beacon.is_waking()
    }

    /// Advertising or a peer restriction is still waiting to be re-applied.
    pub const fn advertising_pending(&self) -> bool {
        self.advertising_stale || self.restriction_pending.is_some()
    }

    pub fn ingest_view(&self) -> IngestView {
        IngestView {
            lifecycle: self.state,
            peer_connected: self.link.is_peer_connected(),
            pending: self.pending,
            awaiting_outcome: self.watch.is_some(),
        }
    }

    pub fn operation_in_flight(&self) -> bool {
        self.ingest_view().operation_in_flight()
    }

    pub const fn advertiser(&self) -> &A {
        &self.advertiser
    }

    pub fn advertiser_mut(&mut self) -> &mut A {
        &mut self.advertiser
    }

    pub const fn hid(&self) -> &H {
        &self.hid
    }

    pub fn hid_mut(&mut self) -> &mut H {
        &mut self.hid
    }

    /// Applies a connection notification. Does no waiting.
    ///
    /// The lifecycle follows on the next tick.
    pub fn on_link_event<const CAP: usize>(
        &mut self,
        event: LinkEvent,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, CAP>,
    ) -> LinkUpdate {
        let update = self.link.apply(event, &mut self.bonding);
        match update {
            LinkUpdate::Bonded(peer) => {
                telemetry.record_event(TelemetryEventKind::PeerBonded(peer), now);
                if let Err(err) = self.advertiser.restrict_to(peer) {
                    telemetry.record_event(TelemetryEventKind::AdvertisingFailed(err), now);
                    self.restriction_pending = Some(peer);
                }
            }
            LinkUpdate::Rejected(peer) => {
                telemetry.record_event(TelemetryEventKind::PeerRejected(peer), now);
            }
            LinkUpdate::Reconnected(_) | LinkUpdate::Lost | LinkUpdate::Unchanged => {}
        }
        update
    }

    /// Admits a command as the pending intent or drops it.
    pub fn submit<const CAP: usize>(
        &mut self,
        command: RemoteCommand,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, CAP>,
    ) -> Result<PowerIntent, IngestRejection> {
        match admit(command, &self.ingest_view()) {
            Ok(intent) => {
                self.pending = Some(intent);
                telemetry.record_event(TelemetryEventKind::CommandAccepted(intent), now);
                Ok(intent)
            }
            Err(reason) => {
                telemetry.record_event(TelemetryEventKind::CommandDropped(reason), now);
                Err(reason)
            }
        }
    }

    /// Submits a command parsed by the transport, dropping parse failures.
    pub fn submit_parsed<const CAP: usize>(
        &mut self,
        parsed: Result<RemoteCommand, CommandParseError>,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, CAP>,
    ) -> Result<PowerIntent, IngestRejection> {
        match parsed {
            Ok(command) => self.submit(command, now, telemetry),
            Err(err) => {
                let reason = IngestRejection::Malformed(err);
                telemetry.record_event(TelemetryEventKind::CommandDropped(reason), now);
                Err(reason)
            }
        }
    }

    /// Evaluates the state machine once.
    pub fn tick<const CAP: usize>(
        &mut self,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, CAP>,
    ) -> TickReport {
        let mut report = TickReport::new(self.state);

        self.repair_advertising(now, telemetry);
        self.reconcile_link(now, telemetry, &mut report);
        self.advance_timers(now, telemetry, &mut report);
        self.judge_outcome(now, telemetry, &mut report);
        self.consume_intent(now, telemetry, &mut report);

        report.lifecycle = self.state;
        report
    }

    fn repair_advertising<const CAP: usize>(
        &mut self,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, CAP>,
    ) {
        if let Some(peer) = self.restriction_pending
            && self.advertiser.restrict_to(peer).is_ok()
        {
            self.restriction_pending = None;
            telemetry.record_event(TelemetryEventKind::AdvertisingRestored, now);
        }

        if !self.advertising_stale {
            return;
        }
        let result = if self.link.is_peer_connected() {
            self.beacon.silence(&mut self.advertiser)
        } else if self.beacon.is_waking() {
            self.beacon.start_waking(&mut self.advertiser)
        } else {
            self.beacon.resume_normal(&mut self.advertiser)
        };
        if result.is_ok() {
            self.advertising_stale = false;
            telemetry.record_event(TelemetryEventKind::AdvertisingRestored, now);
        }
    }

    fn reconcile_link<const CAP: usize>(
        &mut self,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, CAP>,
        report: &mut TickReport,
    ) {
        match (self.state, self.link.is_peer_connected()) {
            (LifecycleState::Standby | LifecycleState::WakingUp, true) => {
                self.wake_deadline = None;
                let result = self.beacon.silence(&mut self.advertiser);
                self.note_advertising(result, now, telemetry);
                self.transition(LifecycleState::Connected, now, telemetry);
            }
            (LifecycleState::Connected, false) => {
                let result = self.beacon.resume_normal(&mut self.advertiser);
                self.note_advertising(result, now, telemetry);
                self.transition(LifecycleState::Standby, now, telemetry);
            }
            (LifecycleState::ShuttingDown, false) => {
                // Receiver powered off before the press finished.
                if self.sequencer.abort(&mut self.hid) {
                    telemetry.record_event(TelemetryEventKind::PowerKeyUp, now);
                }
                let result = self.beacon.resume_normal(&mut self.advertiser);
                self.note_advertising(result, now, telemetry);
                self.transition(LifecycleState::Standby, now, telemetry);
                telemetry.record_event(
                    TelemetryEventKind::ToggleConfirmed(ExpectedTransition::Disconnect),
                    now,
                );
                report.confirmed = Some(ExpectedTransition::Disconnect);
            }
            _ => {}
        }
    }

    fn advance_timers<const CAP: usize>(
        &mut self,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, CAP>,
        report: &mut TickReport,
    ) {
        match self.state {
            LifecycleState::WakingUp => {
                if self.wake_deadline.is_some_and(|deadline| now >= deadline) {
                    self.wake_deadline = None;
                    let result = self.beacon.stop_waking(&mut self.advertiser);
                    self.note_advertising(result, now, telemetry);
                    self.watch = Some(OutcomeWatch::arm(
                        ExpectedTransition::Connect,
                        now,
                        self.config.wake_confirmation(),
                    ));
                    self.transition(LifecycleState::Standby, now, telemetry);
                }
            }
            LifecycleState::ShuttingDown => match self.sequencer.poll(now, &mut self.hid) {
                PressProgress::Holding => {}
                PressProgress::Released(result) => {
                    let event = match result {
                        Ok(()) => TelemetryEventKind::PowerKeyUp,
                        Err(err) => TelemetryEventKind::HidSendFailed(err),
                    };
                    telemetry.record_event(event, now);
                    self.watch = Some(OutcomeWatch::arm(
                        ExpectedTransition::Disconnect,
                        now,
                        self.config.shutdown_confirmation(),
                    ));
                    self.transition(LifecycleState::Connected, now, telemetry);
                }
                PressProgress::Idle => {
                    // No press to finish; settle back so the state stays bounded.
                    report.failed = Some(ExpectedTransition::Disconnect);
                    self.transition(LifecycleState::Connected, now, telemetry);
                }
            },
            LifecycleState::Standby | LifecycleState::Connected => {}
        }
    }

    fn judge_outcome<const CAP: usize>(
        &mut self,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, CAP>,
        report: &mut TickReport,
    ) {
        let Some(watch) = self.watch else {
            return;
        };

        match watch.evaluate(now, self.link.is_peer_connected()) {
            OutcomeVerdict::Pending => {}
            OutcomeVerdict::Confirmed => {
                self.watch = None;
                telemetry.record_event(TelemetryEventKind::ToggleConfirmed(watch.expected()), now);
                report.confirmed = Some(watch.expected());
            }
            OutcomeVerdict::TimedOut => {
                self.watch = None;
                telemetry.record_event(TelemetryEventKind::ToggleTimedOut(watch.expected()), now);
                report.failed = Some(watch.expected());
            }
        }
    }

    fn consume_intent<const CAP: usize>(
        &mut self,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, CAP>,
        report: &mut TickReport,
    ) {
        let Some(intent) = self.pending.take() else {
            return;
        };

        if self.watch.is_some() {
            telemetry.record_event(
                TelemetryEventKind::CommandDropped(IngestRejection::Busy),
                now,
            );
            return;
        }

        match (intent, self.state) {
            (PowerIntent::WakeRequested, LifecycleState::Standby) => {
                match self.beacon.start_waking(&mut self.advertiser) {
                    Ok(()) => {
                        self.advertising_stale = false;
                        self.wake_deadline = Some(now + self.config.wake_window());
                        self.transition(LifecycleState::WakingUp, now, telemetry);
                    }
                    Err(err) => {
                        // The wake payload may already be set; put the name back.
                        telemetry.record_event(TelemetryEventKind::AdvertisingFailed(err), now);
                        self.advertising_stale = true;
                        report.failed = Some(ExpectedTransition::Connect);
                    }
                }
            }
            (PowerIntent::ShutdownRequested, LifecycleState::Connected) => {
                match self.sequencer.press(now, &mut self.hid) {
                    Ok(()) => {
                        telemetry.record_event(TelemetryEventKind::PowerKeyDown, now);
                        self.transition(LifecycleState::ShuttingDown, now, telemetry);
                    }
                    Err(err) => {
                        telemetry.record_event(TelemetryEventKind::HidSendFailed(err), now);
                        report.failed = Some(ExpectedTransition::Disconnect);
                    }
                }
            }
            _ => {
                telemetry.record_event(
                    TelemetryEventKind::CommandDropped(IngestRejection::Redundant),
                    now,
                );
            }
        }
    }

    /// Records a refused request and leaves the repair to later ticks.
    fn note_advertising<const CAP: usize>(
        &mut self,
        result: Result<(), AdvertisingError>,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, CAP>,
    ) {
        match result {
            Ok(()) => self.advertising_stale = false,
            Err(err) => {
                telemetry.record_event(TelemetryEventKind::AdvertisingFailed(err), now);
                self.advertising_stale = true;
            }
        }
    }

    fn transition<const CAP: usize>(
        &mut self,
        next: LifecycleState,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, CAP>,
    ) {
        if self.state != next {
            telemetry.record_transition(self.state, next, now);
            self.state = next;
        }
    }
}


#[cfg(test)]
mod tests {
    use heapless::Vec;

    use super::*;
    use crate::beacon::AdvertisingPayload;
    use crate::hid::{HidReport, HidSendError};

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
    struct MockInstant(u64);

    impl MockInstant {
        fn millis(value: u64) -> Self {
            Self(value)
        }
    }

    impl Add<Duration> for MockInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            MockInstant(self.0 + u64::try_from(rhs.as_millis()).unwrap())
        }
    }

    impl TelemetryInstant for MockInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    #[derive(Default)]
    struct MockRadio {
        advertising: bool,
        payload: Option<AdvertisingPayload>,
        restricted_to: Option<PeerAddress>,
        refused_starts: usize,
        refused_restrictions: usize,
    }

    impl AdvertisingControl for MockRadio {
        fn start_advertising(&mut self) -> Result<(), AdvertisingError> {
            if self.refused_starts > 0 {
                self.refused_starts -= 1;
                return Err(AdvertisingError::Unavailable);
            }
            self.advertising = true;
            Ok(())
        }

        fn stop_advertising(&mut self) -> Result<(), AdvertisingError> {
            self.advertising = false;
            Ok(())
        }

        fn set_payload(&mut self, payload: AdvertisingPayload) -> Result<(), AdvertisingError> {
            self.payload = Some(payload);
            Ok(())
        }

        fn restrict_to(&mut self, peer: PeerAddress) -> Result<(), AdvertisingError> {
            if self.refused_restrictions > 0 {
                self.refused_restrictions -= 1;
                return Err(AdvertisingError::Unavailable);
            }
            self.restricted_to = Some(peer);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockHid {
        reports: Vec<HidReport, 8>,
        offline: bool,
    }

    impl HidReportSink for MockHid {
        fn send_report(&mut self, report: &HidReport) -> Result<(), HidSendError> {
            if self.offline {
                return Err(HidSendError::NotConnected);
            }
            self.reports.push(*report).unwrap();
            Ok(())
        }
    }

    type TestOrchestrator = Orchestrator<MockInstant, MockRadio, MockHid>;
    type Telemetry = TelemetryRecorder<MockInstant>;

    const RECEIVER: PeerAddress = PeerAddress::new([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);

    fn orchestrator() -> TestOrchestrator {
        let mut orchestrator = Orchestrator::new(
            OrchestratorConfig::default(),
            MockRadio::default(),
            MockHid::default(),
        );
        orchestrator.start().unwrap();
        orchestrator
    }

    fn connected(telemetry: &mut Telemetry) -> TestOrchestrator {
        let mut orchestrator = orchestrator();
        orchestrator.on_link_event(LinkEvent::Connected(RECEIVER), MockInstant(0), telemetry);
        orchestrator.tick(MockInstant(0), telemetry);
        orchestrator
    }

    #[test]
    fn starts_in_standby_advertising_name() {
        let orchestrator = orchestrator();

        assert_eq!(orchestrator.lifecycle(), LifecycleState::Standby);
        assert!(orchestrator.advertiser().advertising);
        assert_eq!(
            orchestrator.advertiser().payload,
            Some(AdvertisingPayload::DeviceName)
        );
    }

    #[test]
    fn connect_stops_advertising_and_restricts_to_bonded_peer() {
        let mut telemetry = Telemetry::new();
        let orchestrator = connected(&mut telemetry);

        assert_eq!(orchestrator.lifecycle(), LifecycleState::Connected);
        assert!(!orchestrator.advertiser().advertising);
        assert_eq!(orchestrator.advertiser().restricted_to, Some(RECEIVER));
        assert_eq!(orchestrator.bonded_peer(), Some(RECEIVER));
    }

    #[test]
    fn disconnect_resumes_name_advertising() {
        let mut telemetry = Telemetry::new();
        let mut orchestrator = connected(&mut telemetry);

        orchestrator.on_link_event(LinkEvent::Disconnected, MockInstant(50), &mut telemetry);
        let report = orchestrator.tick(MockInstant(50), &mut telemetry);

        assert!(report.changed());
        assert_eq!(report.lifecycle, LifecycleState::Standby);
        assert!(orchestrator.advertiser().advertising);
        assert_eq!(
            orchestrator.advertiser().payload,
            Some(AdvertisingPayload::DeviceName)
        );
    }

    #[test]
    fn refused_resume_is_retried_until_advertising() {
        let mut telemetry = Telemetry::new();
        let mut orchestrator = connected(&mut telemetry);
        orchestrator.advertiser_mut().refused_starts = 2;

        orchestrator.on_link_event(LinkEvent::Disconnected, MockInstant(50), &mut telemetry);
        orchestrator.tick(MockInstant(50), &mut telemetry);
        assert_eq!(orchestrator.lifecycle(), LifecycleState::Standby);
        assert!(!orchestrator.advertiser().advertising);
        assert!(orchestrator.advertising_pending());
        let refused = TelemetryEventKind::AdvertisingFailed(AdvertisingError::Unavailable);
        assert!(telemetry.oldest_first().any(|record| record.event == refused));

        orchestrator.tick(MockInstant(100), &mut telemetry);
        assert!(!orchestrator.advertiser().advertising);

        orchestrator.tick(MockInstant(150), &mut telemetry);
        assert!(orchestrator.advertiser().advertising);
        assert_eq!(
            orchestrator.advertiser().payload,
            Some(AdvertisingPayload::DeviceName)
        );
        assert!(!orchestrator.advertising_pending());
        assert_eq!(
            telemetry.latest().map(|record| record.event),
            Some(TelemetryEventKind::AdvertisingRestored)
        );
    }

    #[test]
    fn refused_start_at_boot_is_retried() {
        let mut telemetry = Telemetry::new();
        let radio = MockRadio {
            refused_starts: 1,
            ..MockRadio::default()
        };
        let mut orchestrator: TestOrchestrator =
            Orchestrator::new(OrchestratorConfig::default(), radio, MockHid::default());

        assert_eq!(orchestrator.start(), Err(AdvertisingError::Unavailable));
        assert!(!orchestrator.advertiser().advertising);

        orchestrator.tick(MockInstant(0), &mut telemetry);
        assert!(orchestrator.advertiser().advertising);
        assert_eq!(orchestrator.lifecycle(), LifecycleState::Standby);
    }

    #[test]
    fn refused_restriction_is_retried_until_accepted() {
        let mut telemetry = Telemetry::new();
        let mut orchestrator = orchestrator();
        orchestrator.advertiser_mut().refused_restrictions = 4;

        orchestrator.on_link_event(LinkEvent::Connected(RECEIVER), MockInstant(0), &mut telemetry);
        assert_eq!(orchestrator.bonded_peer(), Some(RECEIVER));
        assert_eq!(orchestrator.advertiser().restricted_to, None);

        for at in [0, 50, 100] {
            orchestrator.tick(MockInstant(at), &mut telemetry);
        }
        assert_eq!(orchestrator.advertiser().restricted_to, None);
        assert!(orchestrator.advertising_pending());

        orchestrator.tick(MockInstant(150), &mut telemetry);
        assert_eq!(orchestrator.advertiser().restricted_to, Some(RECEIVER));
        assert!(!orchestrator.advertising_pending());
        assert_eq!(orchestrator.lifecycle(), LifecycleState::Connected);
    }

    #[test]
    fn refused_wake_start_fails_the_wake_and_stays_in_standby() {
        let mut telemetry = Telemetry::new();
        let mut orchestrator = orchestrator();
        orchestrator.advertiser_mut().refused_starts = 1;

        orchestrator
            .submit(RemoteCommand::On, MockInstant(0), &mut telemetry)
            .unwrap();
        let report = orchestrator.tick(MockInstant(0), &mut telemetry);

        assert_eq!(report.failed, Some(ExpectedTransition::Connect));
        assert_eq!(orchestrator.lifecycle(), LifecycleState::Standby);
        assert!(!orchestrator.is_waking());
        assert!(!orchestrator.operation_in_flight());
        assert_eq!(
            telemetry.latest().map(|record| record.event),
            Some(TelemetryEventKind::AdvertisingFailed(
                AdvertisingError::Unavailable
            ))
        );

        orchestrator.tick(MockInstant(50), &mut telemetry);
        assert!(orchestrator.advertiser().advertising);
        assert_eq!(
            orchestrator.advertiser().payload,
            Some(AdvertisingPayload::DeviceName)
        );
        assert!(!orchestrator.advertising_pending());
    }

    #[test]
    fn wake_intent_switches_to_wake_payload() {
        let mut telemetry = Telemetry::new();
        let mut orchestrator = orchestrator();

        orchestrator
            .submit(RemoteCommand::On, MockInstant(0), &mut telemetry)
            .unwrap();
        orchestrator.tick(MockInstant(0), &mut telemetry);

        assert_eq!(orchestrator.lifecycle(), LifecycleState::WakingUp);
        assert!(orchestrator.is_waking());
        assert_eq!(
            orchestrator.advertiser().payload,
            Some(AdvertisingPayload::WakeSignal)
        );
        assert!(orchestrator.operation_in_flight());
    }

    #[test]
    fn failed_key_down_reports_failure_and_stays_connected() {
        let mut telemetry = Telemetry::new();
        let mut orchestrator = connected(&mut telemetry);
        orchestrator.hid_mut().offline = true;

        orchestrator
            .submit(RemoteCommand::Off, MockInstant(50), &mut telemetry)
            .unwrap();
        let report = orchestrator.tick(MockInstant(50), &mut telemetry);

        assert_eq!(report.lifecycle, LifecycleState::Connected);
        assert_eq!(report.failed, Some(ExpectedTransition::Disconnect));
        assert!(!orchestrator.operation_in_flight());
    }

    #[test]
    fn stale_intent_is_discarded_after_link_change() {
        let mut telemetry = Telemetry::new();
        let mut orchestrator = connected(&mut telemetry);

        orchestrator
            .submit(RemoteCommand::Off, MockInstant(50), &mut telemetry)
            .unwrap();
        orchestrator.on_link_event(LinkEvent::Disconnected, MockInstant(60), &mut telemetry);
        orchestrator.tick(MockInstant(100), &mut telemetry);

        assert_eq!(orchestrator.lifecycle(), LifecycleState::Standby);
        assert!(orchestrator.hid().reports.is_empty());
        assert_eq!(orchestrator.pending_intent(), None);
        assert_eq!(
            telemetry.latest().map(|record| record.event),
            Some(TelemetryEventKind::CommandDropped(IngestRejection::Redundant))
        );
    }

    #[test]
    fn malformed_payload_is_dropped() {
        let mut telemetry = Telemetry::new();
        let mut orchestrator = orchestrator();

        let result = orchestrator.submit_parsed(
            RemoteCommand::parse(b"POWER"),
            MockInstant(0),
            &mut telemetry,
        );

        assert!(matches!(result, Err(IngestRejection::Malformed(_))));
        assert_eq!(orchestrator.pending_intent(), None);
        assert_eq!(orchestrator.lifecycle(), LifecycleState::Standby);
    }
}
