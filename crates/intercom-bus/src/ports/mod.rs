//! Ports layer for the Intercom broker.
//!
//! Defines the hexagonal architecture port traits:
//! - Inbound (Driving) ports: API exposed to application code
//! - Outbound (Driven) ports: the transport the broker runs on

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
