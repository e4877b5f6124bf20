//! Cross-module flows over the in-memory channel transport.

pub mod wallet_flow;

#[cfg(test)]
use intercom_bus::{BrokerConfig, ChannelTransport, IntercomBroker};
#[cfg(test)]
use intercom_telemetry::{init_telemetry, TelemetryConfig};
#[cfg(test)]
use std::time::Duration;

/// A broker serving a fresh channel transport.
#[cfg(test)]
pub async fn start_broker(config: BrokerConfig) -> (IntercomBroker, ChannelTransport) {
    // Logs go to stdout only when RUST_LOG is set; later calls find the
    // subscriber already installed.
    let telemetry = TelemetryConfig {
        console_output: std::env::var("RUST_LOG").is_ok(),
        ..TelemetryConfig::for_component("tests")
    };
    let _ = init_telemetry(&telemetry);

    let broker = IntercomBroker::new(config.clone()).expect("broker config is valid");
    let (transport, events) = ChannelTransport::new(&config);
    broker.spawn(events);
    (broker, transport)
}

/// Wait until the broker has processed `n` open ports.
#[cfg(test)]
pub async fn wait_for_ports(broker: &IntercomBroker, n: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while broker.registry().port_count() != n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("ports did not reach expected count");
}
