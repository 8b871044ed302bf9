#![allow(dead_code)]

use core::ops::Add;
use core::time::Duration;

use remote_core::beacon::{AdvertisingControl, AdvertisingError, AdvertisingPayload};
use remote_core::config::OrchestratorConfig;
use remote_core::context::{ContextTick, EventDisposition, RemoteContext, RemoteEvent};
use remote_core::hid::{HidReport, HidReportSink, HidSendError};
use remote_core::link::{LinkEvent, PeerAddress};
use remote_core::orchestrator::LifecycleState;
use remote_core::reconciler::{PowerStatus, PublishError, StatusPublisher};
use remote_core::telemetry::TelemetryInstant;

pub const RECEIVER: PeerAddress = PeerAddress::new([0x38, 0xc8, 0x04, 0x69, 0xc1, 0xfa]);
pub const STRANGER: PeerAddress = PeerAddress::new([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct MockInstant(pub u64);

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

#[derive(Debug, Default)]
pub struct SimRadio {
    pub advertising: bool,
    pub payload: Option<AdvertisingPayload>,
    pub restricted_to: Vec<PeerAddress>,
    pub wake_windows: usize,
    /// Number of upcoming `start_advertising` calls to refuse.
    pub refused_starts: usize,
    /// Number of upcoming `restrict_to` calls to refuse.
    pub refused_restrictions: usize,
}

impl AdvertisingControl for SimRadio {
    fn start_advertising(&mut self) -> Result<(), AdvertisingError> {
        if self.refused_starts > 0 {
            self.refused_starts -= 1;
            return Err(AdvertisingError::Unavailable);
        }
        if self.payload == Some(AdvertisingPayload::WakeSignal) {
            self.wake_windows += 1;
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
        self.restricted_to.push(peer);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SimHid {
    pub reports: Vec<(MockInstant, HidReport)>,
    pub clock: MockInstant,
}

impl HidReportSink for SimHid {
    fn send_report(&mut self, report: &HidReport) -> Result<(), HidSendError> {
        self.reports.push((self.clock, *report));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SimBroker {
    pub published: Vec<(MockInstant, PowerStatus)>,
    pub offline: bool,
    pub clock: MockInstant,
}

impl StatusPublisher for SimBroker {
    fn publish(&mut self, status: PowerStatus) -> Result<(), PublishError> {
        if self.offline {
            return Err(PublishError::NotConnected);
        }
        self.published.push((self.clock, status));
        Ok(())
    }
}

impl SimBroker {
    pub fn statuses(&self) -> Vec<PowerStatus> {
        self.published.iter().map(|(_, status)| *status).collect()
    }
}

/// Drives a context tick by tick on a virtual 50 ms clock.
pub struct Bench {
    pub context: RemoteContext<MockInstant, SimRadio, SimHid, SimBroker>,
    pub now: MockInstant,
    pub tick_ms: u64,
}

impl Bench {
    pub fn new() -> Self {
        let config = OrchestratorConfig::default();
        let tick_ms = u64::try_from(config.tick_period().as_millis()).unwrap();
        let mut context = RemoteContext::new(
            config,
            SimRadio::default(),
            SimHid::default(),
            SimBroker::default(),
        );
        context.start().unwrap();
        Self {
            context,
            now: MockInstant(0),
            tick_ms,
        }
    }

    /// A bench whose receiver is bonded, connected and reported `ON`.
    pub fn connected() -> Self {
        let mut bench = Self::new();
        bench.connect(RECEIVER);
        bench.tick();
        assert_eq!(bench.lifecycle(), LifecycleState::Connected);
        bench
    }

    pub fn tick(&mut self) -> ContextTick {
        let now = self.now;
        self.context.orchestrator_mut().hid_mut().clock = now;
        self.context.publisher_mut().clock = now;
        let result = self.context.tick(now);
        self.now = MockInstant(now.0 + self.tick_ms);
        result
    }

    pub fn ticks(&mut self, count: usize) -> ContextTick {
        let mut last = self.tick();
        for _ in 1..count {
            last = self.tick();
        }
        last
    }

    pub fn command(&mut self, payload: &str) -> EventDisposition {
        self.context
            .handle(RemoteEvent::from_payload(payload.as_bytes()), self.now)
    }

    pub fn connect(&mut self, peer: PeerAddress) -> EventDisposition {
        self.context
            .handle(RemoteEvent::Link(LinkEvent::Connected(peer)), self.now)
    }

    pub fn disconnect(&mut self) -> EventDisposition {
        self.context
            .handle(RemoteEvent::Link(LinkEvent::Disconnected), self.now)
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.context.orchestrator().lifecycle()
    }

    pub fn radio(&self) -> &SimRadio {
        self.context.orchestrator().advertiser()
    }

    pub fn radio_mut(&mut self) -> &mut SimRadio {
        self.context.orchestrator_mut().advertiser_mut()
    }

    pub fn hid_reports(&self) -> Vec<HidReport> {
        self.context
            .orchestrator()
            .hid()
            .reports
            .iter()
            .map(|(_, report)| *report)
            .collect()
    }

    pub fn broker(&self) -> &SimBroker {
        self.context.publisher()
    }
}
