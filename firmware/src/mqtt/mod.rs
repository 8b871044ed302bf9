#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! MQTT transport glue.
//!
//! Status leaves the orchestration task through [`MqttPublisher`], which
//! hands the value to the session task over a short queue. Inbound payloads
//! on the command topic become [`RemoteEvent::Command`]s.

#[cfg(target_os = "none")]
pub mod session;
pub mod socket;

use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use portable_atomic::{AtomicBool, Ordering};
use remote_core::context::RemoteEvent;
use remote_core::reconciler::{PowerStatus, PublishError, StatusPublisher};

use crate::config::DeploymentConfig;
use crate::events::RemoteMutex;

/// Depth of the outbound status queue.
pub const STATUS_QUEUE_DEPTH: usize = 4;

pub type StatusQueue = Channel<RemoteMutex, PowerStatus, STATUS_QUEUE_DEPTH>;

pub type StatusSender<'a> = Sender<'a, RemoteMutex, PowerStatus, STATUS_QUEUE_DEPTH>;

pub type StatusReceiver<'a> = Receiver<'a, RemoteMutex, PowerStatus, STATUS_QUEUE_DEPTH>;

/// Broker session state shared between the session task and the publisher.
pub struct SessionFlag(AtomicBool);

impl SessionFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn set(&self, up: bool) {
        self.0.store(up, Ordering::Release);
    }

    pub fn is_up(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for SessionFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// [`StatusPublisher`] backed by the outbound status queue.
///
/// A publish only counts as accepted once it is queued on a live session, so
/// the reconciler retries anything issued while the broker is away.
pub struct MqttPublisher<'a> {
    outbox: StatusSender<'a>,
    session: &'a SessionFlag,
}

impl<'a> MqttPublisher<'a> {
    pub fn new(outbox: StatusSender<'a>, session: &'a SessionFlag) -> Self {
        Self { outbox, session }
    }
}

impl StatusPublisher for MqttPublisher<'_> {
    fn publish(&mut self, status: PowerStatus) -> Result<(), PublishError> {
        if !self.session.is_up() {
            return Err(PublishError::NotConnected);
        }
        self.outbox
            .try_send(status)
            .map_err(|TrySendError::Full(_)| PublishError::QueueFull)
    }
}

/// Turns an inbound publish into an event, ignoring foreign topics.
pub fn decode_inbound(config: &DeploymentConfig, topic: &str, payload: &[u8]) -> Option<RemoteEvent> {
    config
        .is_command_topic(topic)
        .then(|| RemoteEvent::from_payload(payload))
}

#[cfg(test)]
mod tests {
    use remote_core::command::{CommandParseError, RemoteCommand};

    use super::*;

    fn config() -> DeploymentConfig {
        DeploymentConfig {
            topic: "esp32projector006",
            ..DeploymentConfig::from_env()
        }
    }

    #[test]
    fn publish_requires_a_live_session() {
        let queue = StatusQueue::new();
        let session = SessionFlag::new();
        let mut publisher = MqttPublisher::new(queue.sender(), &session);

        assert_eq!(
            publisher.publish(PowerStatus::Off),
            Err(PublishError::NotConnected)
        );

        session.set(true);
        publisher.publish(PowerStatus::Off).unwrap();
        assert_eq!(queue.try_receive(), Ok(PowerStatus::Off));
    }

    #[test]
    fn backed_up_outbox_fails_the_publish() {
        let queue = StatusQueue::new();
        let session = SessionFlag::new();
        session.set(true);
        let mut publisher = MqttPublisher::new(queue.sender(), &session);

        for _ in 0..STATUS_QUEUE_DEPTH {
            publisher.publish(PowerStatus::On).unwrap();
        }
        assert_eq!(
            publisher.publish(PowerStatus::On),
            Err(PublishError::QueueFull)
        );
    }

    #[test]
    fn inbound_payloads_on_the_command_topic_become_commands() {
        let config = config();

        assert_eq!(
            decode_inbound(&config, "esp32projector006", b"toggle"),
            Some(RemoteEvent::Command(Ok(RemoteCommand::Toggle)))
        );
        assert_eq!(
            decode_inbound(&config, "esp32projector006", b"standby"),
            Some(RemoteEvent::Command(Err(CommandParseError::Unrecognized)))
        );
        assert_eq!(decode_inbound(&config, "other/topic", b"ON"), None);
    }
}
