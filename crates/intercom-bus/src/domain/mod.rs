//! # Domain Layer - Intercom
//!
//! Pure types shared by the registry, the broker and the adapters.
//!
//! ## Components
//!
//! - `ids`: `PortId`, `ListenerId`, `RequestId`
//! - `message`: `Message` envelope and `MessageType` discriminant
//! - `errors`: `HandlerFailure`, `PortError`, `IntercomError`, `ClientError`
//! - `config`: `BrokerConfig` with validation
//! - `stats`: `BrokerStats` counters

pub mod config;
pub mod errors;
pub mod ids;
pub mod message;
pub mod stats;

pub use config::*;
pub use errors::*;
pub use ids::*;
pub use message::*;
pub use stats::*;
