//! Validation and coercion of raw parameters into a [`DeviceConfig`].
//!
//! Checks run in a fixed order and the first failure is returned. Nothing here
//! touches the network or the filesystem; TLS paths are only checked for
//! presence.

use super::error::ParameterError;
use crate::config::{ParamValue, RawParams};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_QOS: u8 = 0;
pub const DEFAULT_KEEPALIVE: u16 = 60;
pub const DEFAULT_CLIENT_ID: &str = "meross-toggle";

const KNOWN_KEYS: &[&str] = &[
    "broker_ip",
    "port",
    "uuid",
    "enabled",
    "qos",
    "retain",
    "client_id",
    "keepalive",
    "username",
    "password",
    "ca_cert",
    "certfile",
    "keyfile",
    "protocol",
];

/// MQTT protocol tag accepted on input.
///
/// Both tags are served by the same 3.1.1 wire implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
    MqttV31,
    #[default]
    MqttV311,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::MqttV31 => "MQTTv31",
            Protocol::MqttV311 => "MQTTv311",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MQTTv31" => Ok(Protocol::MqttV31),
            "MQTTv311" => Ok(Protocol::MqttV311),
            _ => Err(ParameterError::invalid("protocol")),
        }
    }
}

/// Broker login, always complete.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Client certificate and its private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub certfile: PathBuf,
    pub keyfile: PathBuf,
}

/// TLS material. A client identity is only ever present together with a CA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub ca_cert: PathBuf,
    pub client: Option<ClientIdentity>,
}

/// Fully validated input for one toggle command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub broker_ip: String,
    pub port: u16,
    pub uuid: String,
    pub enabled: bool,
    pub qos: u8,
    pub retain: bool,
    pub client_id: String,
    pub keepalive: u16,
    pub credentials: Option<Credentials>,
    pub tls: Option<TlsMaterial>,
    pub protocol: Protocol,
}

impl DeviceConfig {
    pub fn from_params(params: &RawParams) -> Result<Self, ParameterError> {
        for key in params.keys().filter(|key| !KNOWN_KEYS.contains(key)) {
            warn!("Ignoring unknown parameter {}", key);
        }

        let broker_ip = require_text(params, "broker_ip")?;

        let port = match params.get("port") {
            Some(value) => coerce_int(value)
                .and_then(|port| u16::try_from(port).ok())
                .ok_or_else(|| ParameterError::invalid("port"))?,
            None => DEFAULT_PORT,
        };

        let uuid = require_text(params, "uuid")?;

        // An explicit false is a valid desired state; only absence is missing.
        let enabled = match params.get("enabled") {
            Some(value) => coerce_bool(value).ok_or_else(|| ParameterError::invalid("enabled"))?,
            None => return Err(ParameterError::missing("enabled")),
        };

        let qos = match params.get("qos") {
            Some(value) => coerce_int(value)
                .filter(|qos| (0..=2).contains(qos))
                .map(|qos| qos as u8)
                .ok_or_else(|| ParameterError::invalid("qos"))?,
            None => DEFAULT_QOS,
        };

        let keepalive = match params.get("keepalive") {
            Some(value) => coerce_int(value)
                .and_then(|secs| u16::try_from(secs).ok())
                .ok_or_else(|| ParameterError::invalid("keepalive"))?,
            None => DEFAULT_KEEPALIVE,
        };

        let retain = match params.get("retain") {
            Some(value) => coerce_bool(value).ok_or_else(|| ParameterError::invalid("retain"))?,
            None => false,
        };

        let credentials = match (
            optional_text(params, "username"),
            optional_text(params, "password"),
        ) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            (Some(_), None) => return Err(ParameterError::missing("password")),
            (None, Some(_)) => return Err(ParameterError::missing("username")),
            (None, None) => None,
        };

        let protocol = match params.get("protocol") {
            Some(value) => value.to_string().parse::<Protocol>()?,
            None => Protocol::default(),
        };

        let client = match (
            optional_text(params, "certfile"),
            optional_text(params, "keyfile"),
        ) {
            (Some(certfile), Some(keyfile)) => Some(ClientIdentity {
                certfile: PathBuf::from(certfile),
                keyfile: PathBuf::from(keyfile),
            }),
            (Some(_), None) => return Err(ParameterError::missing("keyfile")),
            (None, Some(_)) => return Err(ParameterError::missing("certfile")),
            (None, None) => None,
        };

        let tls = match (optional_text(params, "ca_cert"), client) {
            (Some(ca_cert), client) => Some(TlsMaterial {
                ca_cert: PathBuf::from(ca_cert),
                client,
            }),
            (None, Some(_)) => return Err(ParameterError::missing("ca_cert")),
            (None, None) => None,
        };

        let client_id =
            optional_text(params, "client_id").unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());

        Ok(DeviceConfig {
            broker_ip,
            port,
            uuid,
            enabled,
            qos,
            retain,
            client_id,
            keepalive,
            credentials,
            tls,
            protocol,
        })
    }
}

fn require_text(params: &RawParams, key: &str) -> Result<String, ParameterError> {
    optional_text(params, key).ok_or_else(|| ParameterError::missing(key))
}

fn optional_text(params: &RawParams, key: &str) -> Option<String> {
    params.get(key).map(ParamValue::to_string)
}

fn coerce_int(value: &ParamValue) -> Option<i64> {
    match value {
        ParamValue::Integer(i) => Some(*i),
        ParamValue::Text(s) => s.trim().parse().ok(),
        ParamValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
        ParamValue::Float(_) | ParamValue::Bool(_) => None,
    }
}

fn coerce_bool(value: &ParamValue) -> Option<bool> {
    match value {
        ParamValue::Bool(b) => Some(*b),
        ParamValue::Integer(i) => Some(*i != 0),
        ParamValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Some(true),
            "false" | "off" | "no" | "0" => Some(false),
            _ => None,
        },
        ParamValue::Float(_) => None,
    }
}
