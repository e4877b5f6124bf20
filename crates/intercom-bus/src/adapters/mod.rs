//! Adapters layer: concrete transport and client implementations.
//!
//! - `channel`: in-memory transport over tokio channels
//! - `client`: request/subscribe API for the remote context

pub mod channel;
pub mod client;

pub use channel::{ChannelPort, ChannelTransport, EndpointSender, RemoteEndpoint};
pub use client::IntercomClient;
