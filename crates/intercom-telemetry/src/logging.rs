//! Structured log helpers.
//!
//! Every intercom log line about a connection carries `port_id`, and every
//! line about a request also carries `req_id`, so one request can be followed
//! from arrival to reply.

/// Log a port lifecycle event with standard fields.
///
/// ```rust,ignore
/// log_port_event!(info, "wallet", "Port opened", port.id(), open_ports = 3);
/// ```
#[macro_export]
macro_rules! log_port_event {
    ($level:ident, $component:expr, $msg:expr, $port_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            port_id = %$port_id,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a request-related event with standard fields.
#[macro_export]
macro_rules! log_request_event {
    ($level:ident, $component:expr, $msg:expr, $port_id:expr, $req_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            port_id = %$port_id,
            req_id = %$req_id,
            $($($field)*,)?
            $msg
        )
    };
}
