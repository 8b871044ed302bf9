#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Orchestration task body.
//!
//! Owns the [`RemoteContext`]: every tick drains the event queue, ticks the
//! state machine, reconciles the published status and forwards telemetry.

use remote_core::context::{ContextTick, EventDisposition, RemoteContext};
use remote_core::link::LinkUpdate;
use remote_core::status::StatusSnapshot;

use crate::ble::{AdvertisingChannel, HidChannel};
use crate::clock::FirmwareInstant;
use crate::events::EventReceiver;
use crate::mqtt::MqttPublisher;
use crate::status;
use crate::telemetry::TelemetryForwarder;

/// Context wired to the firmware's queue-backed collaborators.
pub type FirmwareContext<'a> =
    RemoteContext<FirmwareInstant, AdvertisingChannel<'a>, HidChannel<'a>, MqttPublisher<'a>>;

/// Single consumer of the event queue.
pub struct RemotePump<'a> {
    context: FirmwareContext<'a>,
    events: EventReceiver<'a>,
    forwarder: TelemetryForwarder,
}

impl<'a> RemotePump<'a> {
    pub fn new(context: FirmwareContext<'a>, events: EventReceiver<'a>) -> Self {
        Self {
            context,
            events,
            forwarder: TelemetryForwarder::new(),
        }
    }

    #[cfg(test)]
    pub const fn context(&self) -> &FirmwareContext<'a> {
        &self.context
    }

    /// Begins normal advertising.
    pub fn start(&mut self) {
        if let Err(err) = self.context.start() {
            log_start_failed(err);
        }
        status::record_lifecycle(self.context.orchestrator().lifecycle());
    }

    /// Applies queued events, then ticks once at `now`.
    pub fn step(&mut self, now: FirmwareInstant) -> ContextTick {
        while let Ok(event) = self.events.try_receive() {
            let disposition = self.context.handle(event, now);
            log_disposition(disposition);
        }

        let tick = self.context.tick(now);
        if tick.report.changed() {
            status::record_lifecycle(tick.report.lifecycle);
            log_snapshot(&self.context.snapshot());
        }
        self.forwarder.forward(self.context.telemetry());
        tick
    }

    /// Runs the fixed-period tick loop forever.
    #[cfg(target_os = "none")]
    pub async fn run(mut self) -> ! {
        let period = self.context.orchestrator().config().tick_period();
        let mut ticker = embassy_time::Ticker::every(crate::clock::core_duration_to_embassy(period));

        self.start();
        loop {
            ticker.next().await;
            self.step(FirmwareInstant::now());
        }
    }
}

fn log_disposition(disposition: EventDisposition) {
    match disposition {
        EventDisposition::Link(LinkUpdate::Reconnected(peer)) => log_reconnected(peer),
        EventDisposition::Link(LinkUpdate::Lost) => log_link_lost(),
        EventDisposition::StatusInvalidated => log_status_invalidated(),
        // Bonding and command decisions reach the log through telemetry.
        EventDisposition::Link(_) | EventDisposition::Command(_) => {}
    }
}

#[cfg(target_os = "none")]
fn log_start_failed(err: remote_core::beacon::AdvertisingError) {
    defmt::error!("orchestrator: advertising did not start ({})", defmt::Display2Format(&err));
}

#[cfg(not(target_os = "none"))]
fn log_start_failed(err: remote_core::beacon::AdvertisingError) {
    println!("orchestrator: advertising did not start ({err})");
}

#[cfg(target_os = "none")]
fn log_reconnected(peer: remote_core::link::PeerAddress) {
    defmt::info!("orchestrator: receiver {} reconnected", defmt::Display2Format(&peer));
}

#[cfg(not(target_os = "none"))]
fn log_reconnected(peer: remote_core::link::PeerAddress) {
    println!("orchestrator: receiver {peer} reconnected");
}

#[cfg(target_os = "none")]
fn log_link_lost() {
    defmt::info!("orchestrator: receiver link lost");
}

#[cfg(not(target_os = "none"))]
fn log_link_lost() {
    println!("orchestrator: receiver link lost");
}

#[cfg(target_os = "none")]
fn log_status_invalidated() {
    defmt::info!("orchestrator: broker session up, republishing status");
}

#[cfg(not(target_os = "none"))]
fn log_status_invalidated() {
    println!("orchestrator: broker session up, republishing status");
}

#[cfg(target_os = "none")]
fn log_snapshot(snapshot: &StatusSnapshot) {
    defmt::info!("orchestrator: {}", defmt::Display2Format(snapshot));
}

#[cfg(not(target_os = "none"))]
fn log_snapshot(snapshot: &StatusSnapshot) {
    println!("orchestrator: {snapshot}");
}
