//! # MQTT Transport Module
//!
//! One-shot publisher for toggle commands: connect, publish one message, wait
//! for the acknowledgement the QoS asks for, disconnect. No subscriptions, no
//! retries, no session state.
//!
//! ```text
//! mqtt/
//! ├── config.rs           - broker settings and TLS transport
//! ├── message_manager.rs  - outbound message representation
//! └── mqtt_handler.rs     - connection lifecycle for a single publish
//! ```
//!
//! Failures surface as [`TransportError`]. The command has already been built
//! by the time the transport runs, so callers log these instead of aborting.

pub mod config;
pub mod message_manager;
pub mod mqtt_handler;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub use config::BrokerSettings;
pub use message_manager::OutboundMessage;
pub use mqtt_handler::{ConnectionState, MqttHandler};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unable to read TLS material {path}: {source}")]
    TlsMaterial {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("client request failed: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("connection to broker failed: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("broker closed the connection before the publish completed")]
    ClosedByBroker,

    #[error("no acknowledgement from broker within {0:?}")]
    Timeout(Duration),
}
