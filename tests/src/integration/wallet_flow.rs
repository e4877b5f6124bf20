//! # Wallet Backend Flow
//!
//! A wallet backend served over intercom the way a browser extension uses
//! it: the popup asks for state and issues commands by request, and every
//! open view learns about state changes by broadcast.
//!
//! The broker never looks inside these payloads; they are plain JSON data
//! to it.

#[cfg(test)]
mod tests {
    use super::super::{start_broker, wait_for_ports};
    use intercom_bus::{BrokerConfig, ClientError, HandlerFailure, IntercomBroker, IntercomClient};
    use parking_lot::Mutex;
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    // =============================================================================
    // WALLET PAYLOADS
    // =============================================================================

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    struct WalletAccount {
        #[serde(rename = "privateKey")]
        private_key: String,
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    struct WalletState {
        unlocked: bool,
        account: Option<WalletAccount>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(tag = "type")]
    enum WalletRequest {
        #[serde(rename = "THANOS_WALLET_GET_STATE")]
        GetState,
        #[serde(rename = "THANOS_WALLET_UNLOCK")]
        Unlock { password: String },
        #[serde(rename = "THANOS_WALLET_IMPORT_ACCOUNT")]
        ImportAccount {
            #[serde(rename = "privateKey")]
            private_key: String,
        },
    }

    const STATE_UPDATED: &str = "THANOS_WALLET_STATE_UPDATED";
    const PASSWORD: &str = "correct horse";

    // =============================================================================
    // BACKEND
    // =============================================================================

    fn install_wallet(broker: &IntercomBroker) -> Arc<Mutex<WalletState>> {
        let state = Arc::new(Mutex::new(WalletState::default()));
        let notifier = broker.clone();
        let shared = Arc::clone(&state);

        let _reg = broker.handle_request(move |data: Value| {
            let state = Arc::clone(&shared);
            let notifier = notifier.clone();
            async move {
                let request: WalletRequest = serde_json::from_value(data)?;
                let snapshot = {
                    let mut state = state.lock();
                    match request {
                        WalletRequest::GetState => {}
                        WalletRequest::Unlock { password } => {
                            if password != PASSWORD {
                                return Err(HandlerFailure::new("Invalid password"));
                            }
                            state.unlocked = true;
                        }
                        WalletRequest::ImportAccount { private_key } => {
                            if !state.unlocked {
                                return Err(HandlerFailure::new("Wallet is locked"));
                            }
                            if private_key.is_empty() {
                                return Err(HandlerFailure::undescribed());
                            }
                            state.account = Some(WalletAccount { private_key });
                        }
                    }
                    state.clone()
                };

                let value = serde_json::to_value(&snapshot)?;
                notifier.broadcast(json!({"type": STATE_UPDATED, "state": value}));
                Ok::<_, HandlerFailure>(value)
            }
        });
        state
    }

    async fn next_update(updates: &mut tokio::sync::broadcast::Receiver<Value>) -> Value {
        timeout(Duration::from_secs(2), updates.recv())
            .await
            .expect("no state update within timeout")
            .expect("subscription closed")
    }

    // =============================================================================
    // FLOWS
    // =============================================================================

    #[tokio::test]
    async fn test_unlock_then_import_account() {
        let config = BrokerConfig::default();
        let (broker, transport) = start_broker(config.clone()).await;
        let state = install_wallet(&broker);

        let popup = IntercomClient::connect(&transport, &config).await.unwrap();
        let options = IntercomClient::connect(&transport, &config).await.unwrap();
        let mut options_updates = options.subscribe();
        wait_for_ports(&broker, 2).await;

        let initial = popup
            .request(json!({"type": "THANOS_WALLET_GET_STATE"}))
            .await
            .unwrap();
        assert_eq!(initial, json!({"unlocked": false, "account": null}));
        assert_eq!(
            next_update(&mut options_updates).await["state"],
            json!({"unlocked": false, "account": null})
        );

        let unlocked = popup
            .request(json!({"type": "THANOS_WALLET_UNLOCK", "password": PASSWORD}))
            .await
            .unwrap();
        assert_eq!(unlocked["unlocked"], json!(true));

        let update = next_update(&mut options_updates).await;
        assert_eq!(update["type"], json!(STATE_UPDATED));
        assert_eq!(update["state"]["unlocked"], json!(true));

        let imported = popup
            .request(json!({"type": "THANOS_WALLET_IMPORT_ACCOUNT", "privateKey": "edsk123"}))
            .await
            .unwrap();
        assert_eq!(imported["account"], json!({"privateKey": "edsk123"}));

        let update = next_update(&mut options_updates).await;
        let remote: WalletState = serde_json::from_value(update["state"].clone()).unwrap();
        assert_eq!(remote, *state.lock());
    }

    #[tokio::test]
    async fn test_wallet_errors_reach_caller() {
        let config = BrokerConfig::default();
        let (broker, transport) = start_broker(config.clone()).await;
        let _state = install_wallet(&broker);
        let popup = IntercomClient::connect(&transport, &config).await.unwrap();

        assert_eq!(
            popup
                .request(json!({"type": "THANOS_WALLET_IMPORT_ACCOUNT", "privateKey": "k"}))
                .await,
            Err(ClientError::Remote("Wallet is locked".into()))
        );
        assert_eq!(
            popup
                .request(json!({"type": "THANOS_WALLET_UNLOCK", "password": "guess"}))
                .await,
            Err(ClientError::Remote("Invalid password".into()))
        );

        popup
            .request(json!({"type": "THANOS_WALLET_UNLOCK", "password": PASSWORD}))
            .await
            .unwrap();
        assert_eq!(
            popup
                .request(json!({"type": "THANOS_WALLET_IMPORT_ACCOUNT", "privateKey": ""}))
                .await,
            Err(ClientError::Remote("Unexpected error occurred".into()))
        );

        // Unknown wallet commands fail in deserialization, not in the broker.
        let unknown = popup.request(json!({"type": "THANOS_WALLET_LOCK"})).await;
        assert!(matches!(unknown, Err(ClientError::Remote(msg)) if msg.contains("THANOS_WALLET_LOCK")));
    }

    #[tokio::test]
    async fn test_closed_view_does_not_block_updates() {
        let config = BrokerConfig::default();
        let (broker, transport) = start_broker(config.clone()).await;
        let _state = install_wallet(&broker);

        let popup = IntercomClient::connect(&transport, &config).await.unwrap();
        let closed_view = IntercomClient::connect(&transport, &config).await.unwrap();
        let mut popup_updates = popup.subscribe();
        wait_for_ports(&broker, 2).await;

        closed_view.disconnect().await;
        wait_for_ports(&broker, 1).await;

        popup
            .request(json!({"type": "THANOS_WALLET_UNLOCK", "password": PASSWORD}))
            .await
            .unwrap();
        assert_eq!(
            next_update(&mut popup_updates).await["state"]["unlocked"],
            json!(true)
        );
        assert_eq!(broker.stats().broadcast_deliveries, 1);
    }
}
