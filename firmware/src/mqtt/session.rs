//! Broker session task built on `rust-mqtt` over an embassy-net TCP socket.

use embassy_futures::select::{Either3, select3};
use embassy_net::Stack;
use embassy_net::tcp::TcpSocket;
use embassy_time::{Duration, Timer};
use remote_core::context::RemoteEvent;
use remote_core::reconciler::PowerStatus;
use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::{ClientConfig, MqttVersion};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::packet::v5::reason_codes::ReasonCode;
use rust_mqtt::utils::rng_generator::CountingRng;

use super::socket::{SharedSocket, SocketCell, wait_readable};
use super::{SessionFlag, StatusReceiver, decode_inbound};
use crate::config::DeploymentConfig;
use crate::events::{self, EventSender};

const SOCKET_BUFFER_LEN: usize = 1024;
const MQTT_BUFFER_LEN: usize = 512;
const MAX_PROPERTIES: usize = 5;
const KEEP_ALIVE_SECS: u16 = 60;
/// Half the keep-alive window.
const PING_PERIOD: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Why a session ended.
#[derive(Debug)]
enum SessionError {
    Config(crate::config::ConfigError),
    Connect(embassy_net::tcp::ConnectError),
    Broker(ReasonCode),
}

enum Activity {
    Inbound,
    Publish(PowerStatus),
    Ping,
}

/// Keeps a broker session alive forever, reconnecting after every failure.
pub async fn run(
    stack: Stack<'static>,
    config: &'static DeploymentConfig,
    outbox: StatusReceiver<'static>,
    events: EventSender<'static>,
    session: &'static SessionFlag,
) -> ! {
    loop {
        stack.wait_config_up().await;

        let result = serve(stack, config, &outbox, &events, session).await;

        session.set(false);
        if let Err(err) = result {
            defmt::warn!("mqtt: session ended ({})", defmt::Debug2Format(&err));
        }
        Timer::after(RETRY_DELAY).await;
    }
}

async fn serve(
    stack: Stack<'static>,
    config: &DeploymentConfig,
    outbox: &StatusReceiver<'static>,
    events: &EventSender<'static>,
    session: &SessionFlag,
) -> Result<(), SessionError> {
    let endpoint = config.broker_endpoint().map_err(SessionError::Config)?;

    let mut rx_buffer = [0; SOCKET_BUFFER_LEN];
    let mut tx_buffer = [0; SOCKET_BUFFER_LEN];
    let mut mqtt_rx = [0; MQTT_BUFFER_LEN];
    let mut mqtt_tx = [0; MQTT_BUFFER_LEN];

    let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
    socket.set_timeout(Some(Duration::from_secs(u64::from(KEEP_ALIVE_SECS) * 2)));
    defmt::info!("mqtt: connecting to {}:{}", defmt::Display2Format(&endpoint.0), endpoint.1);
    socket.connect(endpoint).await.map_err(SessionError::Connect)?;
    let socket = SocketCell::new(socket);

    let mut client_config = ClientConfig::new(MqttVersion::MQTTv5, CountingRng(20_000));
    client_config.add_client_id(config.client_id);
    client_config.add_max_subscribe_qos(QualityOfService::QoS0);
    client_config.max_packet_size = u32::try_from(MQTT_BUFFER_LEN).unwrap_or(u32::MAX);
    client_config.keep_alive = KEEP_ALIVE_SECS;

    let mut client = MqttClient::<_, MAX_PROPERTIES, _>::new(
        SharedSocket::new(&socket),
        &mut mqtt_tx,
        MQTT_BUFFER_LEN,
        &mut mqtt_rx,
        MQTT_BUFFER_LEN,
        client_config,
    );
    client.connect_to_broker().await.map_err(SessionError::Broker)?;
    client
        .subscribe_to_topic(config.topic)
        .await
        .map_err(SessionError::Broker)?;

    // Statuses queued for a previous session are stale; the reconciler
    // republishes once it hears the session is back.
    while outbox.try_receive().is_ok() {}
    session.set(true);
    events.send(RemoteEvent::BrokerSessionUp).await;
    defmt::info!("mqtt: subscribed to {}", config.topic);

    // Only the readiness wait is raced; client calls always run to completion.
    loop {
        let activity = match select3(
            wait_readable(&socket),
            outbox.receive(),
            Timer::after(PING_PERIOD),
        )
        .await
        {
            Either3::First(()) => Activity::Inbound,
            Either3::Second(status) => Activity::Publish(status),
            Either3::Third(()) => Activity::Ping,
        };

        match activity {
            Activity::Inbound => {
                let (topic, payload) =
                    client.receive_message().await.map_err(SessionError::Broker)?;
                if let Some(event) = decode_inbound(config, topic, payload) {
                    events::post(events, event);
                }
            }
            Activity::Publish(status) => {
                client
                    .send_message(
                        config.topic,
                        status.as_payload().as_bytes(),
                        QualityOfService::QoS0,
                        false,
                    )
                    .await
                    .map_err(SessionError::Broker)?;
                defmt::debug!("mqtt: published {}", status.as_payload());
            }
            Activity::Ping => client.send_ping().await.map_err(SessionError::Broker)?,
        }
    }
}
