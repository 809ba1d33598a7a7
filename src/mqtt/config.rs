use super::TransportError;
use crate::device::params::{Credentials, DeviceConfig, Protocol, TlsMaterial};
use rumqttc::{MqttOptions, QoS, Transport};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Everything needed to open one connection and publish one message.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub credentials: Option<Credentials>,
    pub tls: Option<TlsMaterial>,
    pub protocol: Protocol,
    pub qos: QoS,
    pub retain: bool,
}

impl BrokerSettings {
    pub fn from_device(config: &DeviceConfig) -> Self {
        BrokerSettings {
            host: config.broker_ip.clone(),
            port: config.port,
            client_id: config.client_id.clone(),
            keep_alive: Duration::from_secs(u64::from(config.keepalive)),
            credentials: config.credentials.clone(),
            tls: config.tls.clone(),
            protocol: config.protocol,
            qos: qos_level(config.qos),
            retain: config.retain,
        }
    }

    /// Reads the TLS files, if any, and picks the matching transport.
    pub async fn transport(&self) -> Result<Transport, TransportError> {
        let Some(tls) = &self.tls else {
            return Ok(Transport::tcp());
        };

        let ca = read_material(&tls.ca_cert).await?;
        let client_auth = match &tls.client {
            Some(identity) => {
                debug!("Active TLS with client certificate authentication");
                let cert = read_material(&identity.certfile).await?;
                let key = read_material(&identity.keyfile).await?;
                Some((cert, key))
            }
            None => {
                debug!("Active TLS with server CA certificate only");
                None
            }
        };

        Ok(Transport::tls(ca, client_auth, None))
    }

    pub async fn mqtt_options(&self) -> Result<MqttOptions, TransportError> {
        if self.protocol == Protocol::MqttV31 {
            debug!("{} requested, speaking MQTT 3.1.1", self.protocol);
        }

        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options
            .set_keep_alive(self.keep_alive)
            .set_clean_session(true)
            .set_transport(self.transport().await?);

        if let Some(credentials) = &self.credentials {
            options.set_credentials(credentials.username.clone(), credentials.password.clone());
        }

        Ok(options)
    }
}

/// Maps a validated QoS number onto the client's enum.
pub fn qos_level(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

async fn read_material(path: &Path) -> Result<Vec<u8>, TransportError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| TransportError::TlsMaterial {
            path: path.to_path_buf(),
            source,
        })
}
