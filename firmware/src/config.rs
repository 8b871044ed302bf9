#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Deployment settings baked in at compile time.
//!
//! Every value can be overridden through an environment variable of the same
//! name when the firmware is built, e.g. `REMOTE_WIFI_SSID=... cargo build`.

use core::fmt;
use core::net::Ipv4Addr;
use core::str::FromStr;

const DEFAULT_WIFI_SSID: &str = "homewifi";
const DEFAULT_WIFI_PASSWORD: &str = "";
const DEFAULT_BROKER_HOST: &str = "192.168.10.10";
const DEFAULT_BROKER_PORT: &str = "1883";
const DEFAULT_CLIENT_ID: &str = "esp32projector006";
const DEFAULT_TOPIC: &str = "esp32projector006";
const DEFAULT_DEVICE_NAME: &str = "ESP32-C3";

/// Random static address the receiver bonds with.
pub const DEVICE_ADDRESS: [u8; 6] = [0xc0, 0xde, 0x52, 0x00, 0x00, 0x03];

/// Settings that differ between installations.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DeploymentConfig {
    pub wifi_ssid: &'static str,
    pub wifi_password: &'static str,
    pub broker_host: &'static str,
    pub broker_port: &'static str,
    pub client_id: &'static str,
    /// Topic used both for inbound commands and outbound status.
    pub topic: &'static str,
    pub device_name: &'static str,
}

/// Rejected deployment value.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    BrokerHost,
    BrokerPort,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::BrokerHost => f.write_str("broker host is not an IPv4 address"),
            ConfigError::BrokerPort => f.write_str("broker port is not a number"),
        }
    }
}

impl DeploymentConfig {
    /// Reads the build environment, falling back to the defaults.
    pub const fn from_env() -> Self {
        Self {
            wifi_ssid: or_default(option_env!("REMOTE_WIFI_SSID"), DEFAULT_WIFI_SSID),
            wifi_password: or_default(option_env!("REMOTE_WIFI_PASSWORD"), DEFAULT_WIFI_PASSWORD),
            broker_host: or_default(option_env!("REMOTE_BROKER_HOST"), DEFAULT_BROKER_HOST),
            broker_port: or_default(option_env!("REMOTE_BROKER_PORT"), DEFAULT_BROKER_PORT),
            client_id: or_default(option_env!("REMOTE_CLIENT_ID"), DEFAULT_CLIENT_ID),
            topic: or_default(option_env!("REMOTE_TOPIC"), DEFAULT_TOPIC),
            device_name: or_default(option_env!("REMOTE_DEVICE_NAME"), DEFAULT_DEVICE_NAME),
        }
    }

    /// Broker address and port, validated.
    pub fn broker_endpoint(&self) -> Result<(Ipv4Addr, u16), ConfigError> {
        let address = Ipv4Addr::from_str(self.broker_host.trim()).map_err(|_| ConfigError::BrokerHost)?;
        let port = u16::from_str(self.broker_port.trim()).map_err(|_| ConfigError::BrokerPort)?;
        if port == 0 {
            return Err(ConfigError::BrokerPort);
        }
        Ok((address, port))
    }

    /// Returns `true` when `topic` is the one this installation listens on.
    pub fn is_command_topic(&self, topic: &str) -> bool {
        topic == self.topic
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

const fn or_default(value: Option<&'static str>, fallback: &'static str) -> &'static str {
    match value {
        Some(value) => value,
        None => fallback,
    }
}
