//! Registry wiring under arbitrary interleavings of port and listener
//! lifecycle operations.

#[cfg(test)]
mod tests {
    use super::super::RecordingPort;
    use intercom_bus::{ConnectionRegistry, Listener, ListenerId, Message, Port, PortId};
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    enum Op {
        OpenPort,
        ClosePort(usize),
        AddListener,
        RemoveListener(usize),
        ReAddListener(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => Just(Op::OpenPort),
            2 => any::<usize>().prop_map(Op::ClosePort),
            3 => Just(Op::AddListener),
            2 => any::<usize>().prop_map(Op::RemoveListener),
            1 => any::<usize>().prop_map(Op::ReAddListener),
        ]
    }

    fn noop() -> Listener {
        Arc::new(|_msg: &Message, _port: &Arc<dyn Port>| {})
    }

    fn pick<T: Copy>(items: &[T], index: usize) -> Option<T> {
        if items.is_empty() {
            None
        } else {
            Some(items[index % items.len()])
        }
    }

    proptest! {
        #[test]
        fn every_open_port_has_exactly_the_registered_listeners(
            ops in proptest::collection::vec(op(), 1..64)
        ) {
            let registry = ConnectionRegistry::new();
            let mut opened: Vec<PortId> = Vec::new();
            let mut added: Vec<ListenerId> = Vec::new();

            for op in ops {
                match op {
                    Op::OpenPort => {
                        let port = RecordingPort::new();
                        opened.push(port.id());
                        prop_assert!(registry.on_port_opened(port));
                    }
                    Op::ClosePort(i) => {
                        if let Some(id) = pick(&opened, i) {
                            // Closing twice must be harmless.
                            registry.on_port_closed(id);
                        }
                    }
                    Op::AddListener => {
                        let id = ListenerId::next();
                        added.push(id);
                        prop_assert!(registry.add_listener(id, noop()));
                    }
                    Op::RemoveListener(i) => {
                        if let Some(id) = pick(&added, i) {
                            registry.remove_listener(id);
                        }
                    }
                    Op::ReAddListener(i) => {
                        if let Some(id) = pick(&added, i) {
                            let was_registered = registry.registered_listeners().contains(&id);
                            prop_assert_eq!(registry.add_listener(id, noop()), !was_registered);
                        }
                    }
                }

                let registered: BTreeSet<ListenerId> =
                    registry.registered_listeners().into_iter().collect();
                prop_assert_eq!(registered.len(), registry.listener_count());
                for port in registry.open_ports() {
                    let attached: BTreeSet<ListenerId> = registry
                        .attached_listeners(port.id())
                        .unwrap_or_default()
                        .into_iter()
                        .collect();
                    prop_assert_eq!(&attached, &registered);
                }
            }
        }

        #[test]
        fn dispatch_reaches_each_registered_listener_once(
            listeners in 0usize..8,
            removed in proptest::collection::vec(any::<bool>(), 8)
        ) {
            let registry = ConnectionRegistry::new();
            let port = RecordingPort::new();
            registry.on_port_opened(port.clone());

            let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
            let mut ids = Vec::new();
            for _ in 0..listeners {
                let id = ListenerId::next();
                let hits = Arc::clone(&hits);
                let listener: Listener = Arc::new(move |_msg: &Message, _port: &Arc<dyn Port>| {
                    hits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                });
                registry.add_listener(id, listener);
                ids.push(id);
            }
            let mut remaining = listeners;
            for (id, remove) in ids.iter().zip(removed) {
                if remove {
                    registry.remove_listener(*id);
                    remaining -= 1;
                }
            }

            let invoked = registry.dispatch(port.id(), &Message::subscription(serde_json::json!(1)));
            prop_assert_eq!(invoked, remaining);
            prop_assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), remaining);
        }
    }
}
