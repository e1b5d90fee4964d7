//! Message relay: outbound sends and the inbound event sink.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    domain::{InboundEvent, NewMessage, Phone},
    network::{ClientRegistry, EventSink},
    scrape::{ProductSource, CATALOG_TRIGGER},
    store::Store,
    Result,
};

const UNKNOWN_USERNAME: &str = "unknown";

pub struct Relay {
    store: Store,
    registry: Arc<ClientRegistry>,
    products: Arc<dyn ProductSource>,
}

impl Relay {
    pub fn new(store: Store, registry: Arc<ClientRegistry>, products: Arc<dyn ProductSource>) -> Self {
        Self {
            store,
            registry,
            products,
        }
    }

    /// Send `text` to `counterpart` through the account's connection, then
    /// record it as a self-sent row.
    ///
    /// The network send is not undone when persistence fails afterwards;
    /// there is no compensating transaction.
    pub async fn send(&self, phone: &Phone, counterpart: &str, text: &str) -> Result<()> {
        let account = self.store.require_account(phone).await?;

        let handle = self.registry.get_or_open(phone).await?;
        handle.connect().await?;
        handle.send_text(counterpart, text).await?;

        self.store
            .append_message(&NewMessage {
                chat_id: None,
                sender_id: Some(account.id),
                sender_username: counterpart.to_string(),
                text: text.to_string(),
                is_self: true,
                account_id: account.id,
                counterpart: counterpart.to_string(),
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EventSink for Relay {
    /// Record one inbound event against the account owning the connection it
    /// arrived on. Events whose session token matches no account are dropped.
    async fn on_event(&self, event: InboundEvent) -> Result<()> {
        let Some(account) = self
            .store
            .find_by_session_token(&event.session_token)
            .await?
        else {
            tracing::debug!("inbound event for unknown session, dropping");
            return Ok(());
        };

        if event.text.contains(CATALOG_TRIGGER) {
            let products = self.products.top_products(10).await?;
            let handle = self.registry.get_or_open(&account.phone).await?;
            handle
                .send_text(&event.chat_id.to_string(), &products.join("\n"))
                .await?;
        }

        self.store
            .append_message(&NewMessage {
                chat_id: Some(event.chat_id),
                sender_id: event.sender_id,
                sender_username: event
                    .sender_username
                    .unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
                text: event.text,
                is_self: event.outgoing,
                account_id: account.id,
                counterpart: event
                    .counterpart_username
                    .unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::network::testutil::FakeConnector;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeProducts {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ProductSource for FakeProducts {
        async fn top_products(&self, _count: usize) -> Result<Vec<String>> {
            *self.calls.lock().unwrap() += 1;
            Ok(vec!["widget - 9.99 руб. - https://example".into()])
        }
    }

    struct Harness {
        relay: Relay,
        store: Store,
        connector: Arc<FakeConnector>,
        products: Arc<FakeProducts>,
    }

    async fn harness() -> Harness {
        let store = Store::connect_in_memory().await.unwrap();
        let connector = Arc::new(FakeConnector::default());
        let registry = Arc::new(ClientRegistry::new(connector.clone()));
        let products = Arc::new(FakeProducts::default());
        let relay = Relay::new(store.clone(), registry, products.clone());
        Harness {
            relay,
            store,
            connector,
            products,
        }
    }

    fn event(token: &str, text: &str) -> InboundEvent {
        InboundEvent {
            session_token: token.to_string(),
            chat_id: 77,
            sender_id: Some(5),
            sender_username: Some("bob".into()),
            counterpart_username: Some("bob".into()),
            text: text.to_string(),
            outgoing: false,
        }
    }

    #[tokio::test]
    async fn send_appends_exactly_one_self_row() {
        let h = harness().await;
        let phone = Phone::from("+1000");
        let acc = h.store.create_or_fetch(&phone).await.unwrap();

        h.relay.send(&phone, "bob", "hi").await.unwrap();

        assert_eq!(
            h.connector.handle("+1000").sent(),
            vec![("bob".to_string(), "hi".to_string())]
        );
        let rows = h.store.recent_messages(acc.id, "bob").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_self);
        assert_eq!(rows[0].message_text, "hi");
    }

    #[tokio::test]
    async fn send_for_unknown_phone_is_not_found_and_writes_nothing() {
        let h = harness().await;

        let err = h
            .relay
            .send(&Phone::from("+1000"), "bob", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(h.connector.handle("+1000").sent().is_empty());
        assert_eq!(h.store.count_messages().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_network_send_writes_nothing() {
        let h = harness().await;
        let phone = Phone::from("+1000");
        h.store.create_or_fetch(&phone).await.unwrap();
        h.connector.handle("+1000").fail_sends(true);

        let err = h.relay.send(&phone, "bob", "hi").await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        assert_eq!(h.store.count_messages().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn inbound_event_is_recorded_for_the_owning_account() {
        let h = harness().await;
        let phone = Phone::from("+1000");
        let acc = h.store.create_or_fetch(&phone).await.unwrap();
        h.store.set_authorized(&phone, "sess-1").await.unwrap();

        h.relay.on_event(event("sess-1", "hello there")).await.unwrap();

        let rows = h.store.recent_messages(acc.id, "bob").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].is_self);
        assert_eq!(rows[0].username, "bob");
        assert_eq!(rows[0].message_text, "hello there");
    }

    #[tokio::test]
    async fn inbound_event_for_unknown_session_is_dropped() {
        let h = harness().await;
        h.relay.on_event(event("nobody", "hi")).await.unwrap();
        assert_eq!(h.store.count_messages().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn catalog_trigger_forwards_scrape_results_into_the_chat() {
        let h = harness().await;
        let phone = Phone::from("+1000");
        h.store.create_or_fetch(&phone).await.unwrap();
        h.store.set_authorized(&phone, "sess-1").await.unwrap();

        h.relay
            .on_event(event("sess-1", CATALOG_TRIGGER))
            .await
            .unwrap();

        assert_eq!(*h.products.calls.lock().unwrap(), 1);
        let sent = h.connector.handle("+1000").sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "77");
        assert!(sent[0].1.contains("widget"));
        // The triggering message itself is still recorded.
        assert_eq!(h.store.count_messages().await.unwrap(), 1);
    }
}
