//! # Intercom Bus - Port Broker Between Isolated Contexts
//!
//! Brokers messages between a privileged context and any number of remote
//! contexts connected through duplex ports.
//!
//! ## Messaging Patterns
//!
//! - **Request/response:** the remote side sends `INTERCOM_REQUEST` with a
//!   `reqId`; the installed handler answers with `INTERCOM_RESPONSE` or
//!   `INTERCOM_ERROR` carrying the same `reqId`, on the same port.
//! - **Broadcast:** the broker sends `INTERCOM_SUBSCRIPTION` to every port
//!   open at that moment.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   TransportEvent   ┌───────────────┐   dispatch   ┌───────────┐
//! │  Transport   │ ─────────────────► │ IntercomBroker│ ───────────► │ Registry  │
//! │ (adapters)   │                    │  serve loop   │              │ ports ×   │
//! │              │ ◄───── Port::send ─│               │ ◄─ listener ─│ listeners │
//! └──────────────┘                    └───────────────┘              └───────────┘
//!                                            ▲
//!                                            │ handle_request / broadcast
//!                                     application code
//! ```
//!
//! ## Guarantees
//!
//! - Every open port has exactly the registered listeners attached.
//! - A request answered by one handler gets exactly one reply on its origin
//!   port, unless that port closed first.
//! - Nothing is dispatched for a port after its disconnect is processed.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod broker;
pub mod domain;
pub mod ports;
pub mod registry;

pub use adapters::{ChannelPort, ChannelTransport, EndpointSender, IntercomClient, RemoteEndpoint};
pub use broker::{HandlerRegistration, IntercomBroker};
pub use domain::{
    BrokerConfig, BrokerStats, BrokerStatsSnapshot, ClientError, ConfigError, HandlerFailure,
    IntercomError, ListenerId, Message, MessageType, PortError, PortId, RequestId,
    DEFAULT_ERROR_MESSAGE,
};
pub use ports::{IntercomApi, Port, RequestHandler, TransportEvent};
pub use registry::{ConnectionRegistry, Listener};
