//! Construction of the signed toggle envelope.
//!
//! Identifiers and the signature use MD5 hex digests because the appliances
//! expect exactly that. The shared secret is the device UUID, so the signature
//! proves freshness only; it offers no real authentication.

use super::params::DeviceConfig;
use md5::{Digest, Md5};
use rand::{rngs::OsRng, CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};

pub const TOGGLE_NAMESPACE: &str = "Appliance.Control.Toggle";
pub const PAYLOAD_VERSION: u8 = 1;
pub const TOGGLE_CHANNEL: u8 = 0;

const APP_ID_PREFIX: &str = "APP";
const NONCE_LEN: usize = 16;
const NONCE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Lowercase hex MD5 digest.
pub fn md5_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Md5::digest(data.as_ref()))
}

/// Stable application identifier for a device.
pub fn app_id(uuid: &str) -> String {
    md5_hex(format!("{}{}", APP_ID_PREFIX, uuid))
}

/// Request and response topics of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub request: String,
    pub response: String,
}

impl Topics {
    pub fn for_device(uuid: &str) -> Self {
        // the appliance is provisioned with user_id == uuid
        let user_id = uuid;
        Topics {
            request: format!("/appliance/{}/subscribe", uuid),
            response: format!("/app/{}-{}/subscribe", user_id, app_id(uuid)),
        }
    }
}

/// Per-invocation identity: one message id, one timestamp, one signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub app_id: String,
    pub message_id: String,
    pub timestamp: i64,
    pub signature: String,
}

impl DeviceIdentity {
    pub fn generate<R: RngCore + CryptoRng>(uuid: &str, rng: &mut R, timestamp: i64) -> Self {
        let nonce: String = (0..NONCE_LEN)
            .map(|_| NONCE_CHARSET[rng.gen_range(0..NONCE_CHARSET.len())] as char)
            .collect();
        let message_id = md5_hex(nonce);
        let signature = sign(&message_id, uuid, timestamp);

        DeviceIdentity {
            app_id: app_id(uuid),
            message_id,
            timestamp,
            signature,
        }
    }
}

/// Signature over message id, shared secret and timestamp.
pub fn sign(message_id: &str, key: &str, timestamp: i64) -> String {
    md5_hex(format!("{}{}{}", message_id, key, timestamp))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "SET")]
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub from: String,
    pub message_id: String,
    pub method: Method,
    pub namespace: String,
    pub payload_version: u8,
    pub sign: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toggle {
    pub onoff: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleBody {
    pub channel: u8,
    pub toggle: Toggle,
}

/// The document the appliance parses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEnvelope {
    pub header: Header,
    pub payload: ToggleBody,
}

/// A ready-to-publish toggle: destination topic plus envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleCommand {
    pub topics: Topics,
    pub identity: DeviceIdentity,
    pub envelope: ControlEnvelope,
}

impl ToggleCommand {
    /// Builds with OS entropy and the wall clock.
    pub fn build(config: &DeviceConfig) -> Self {
        Self::build_with(config, &mut OsRng, chrono::Utc::now().timestamp())
    }

    pub fn build_with<R: RngCore + CryptoRng>(
        config: &DeviceConfig,
        rng: &mut R,
        timestamp: i64,
    ) -> Self {
        let topics = Topics::for_device(&config.uuid);
        let identity = DeviceIdentity::generate(&config.uuid, rng, timestamp);

        let envelope = ControlEnvelope {
            header: Header {
                from: topics.response.clone(),
                message_id: identity.message_id.clone(),
                method: Method::Set,
                namespace: TOGGLE_NAMESPACE.to_string(),
                payload_version: PAYLOAD_VERSION,
                sign: identity.signature.clone(),
                timestamp: identity.timestamp,
            },
            payload: ToggleBody {
                channel: TOGGLE_CHANNEL,
                toggle: Toggle {
                    onoff: u8::from(config.enabled),
                },
            },
        };

        ToggleCommand {
            topics,
            identity,
            envelope,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topics.request
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.envelope)
    }
}
