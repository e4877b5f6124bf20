//! # Inbound Port - IntercomApi
//!
//! Primary driving port used by application code on the broker side.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | `install_handler` | Serve every inbound request with a handler |
//! | `broadcast` | Notify every open port |
//! | `port_count` | Number of ports currently open |

use crate::broker::HandlerRegistration;
use crate::domain::HandlerFailure;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Serves the `data` of inbound requests.
///
/// The handler sees the decoded `data` field only, never the envelope. Its
/// result becomes a Response reply, its failure an Error reply.
///
/// Implemented for async closures:
///
/// ```rust,ignore
/// broker.handle_request(|data: Value| async move {
///     let n = data.as_i64().ok_or("expected a number")?;
///     Ok::<_, HandlerFailure>(json!(n * 2))
/// });
/// ```
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Produce the reply payload for one request.
    async fn handle(&self, data: Value) -> Result<Value, HandlerFailure>;
}

#[async_trait]
impl<F, Fut> RequestHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerFailure>> + Send + 'static,
{
    async fn handle(&self, data: Value) -> Result<Value, HandlerFailure> {
        (self)(data).await
    }
}

/// Primary API of the broker.
pub trait IntercomApi: Send + Sync {
    /// Install a request handler on every current and future port.
    ///
    /// The returned registration removes the handler when unsubscribed.
    /// More than one handler may be installed; each one sees every request
    /// and replies to it, so callers normally install exactly one.
    fn install_handler(&self, handler: Arc<dyn RequestHandler>) -> HandlerRegistration;

    /// Send a Subscription message with `data` to every open port.
    ///
    /// Returns the number of ports the message was delivered to.
    fn broadcast(&self, data: Value) -> usize;

    /// Number of ports currently open.
    fn port_count(&self) -> usize;
}
