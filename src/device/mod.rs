//! # Device Command Module
//!
//! Turns a raw parameter bundle into a signed toggle command for a Meross
//! smart plug on a local broker. Both steps are pure: no network, no disk.
//!
//! ```text
//! device/
//! ├── error.rs    - MissingParameter / InvalidParameter
//! ├── params.rs   - validation and coercion into DeviceConfig
//! └── message.rs  - identifiers, signature, envelope and topics
//! ```
//!
//! ## Authentication
//!
//! The appliance checks `sign = md5(messageId + key + timestamp)` where the key
//! is the UUID the device was provisioned with. Anyone who knows the UUID can
//! produce a valid signature. The scheme is kept bit-for-bit because the
//! hardware rejects anything else.

pub mod error;
pub mod message;
pub mod params;

pub use error::ParameterError;
pub use message::{ControlEnvelope, ToggleCommand, Topics};
pub use params::{DeviceConfig, Protocol};
