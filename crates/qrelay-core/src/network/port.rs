use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    domain::{AuthPoll, InboundEvent, QrChallenge},
    Result,
};

/// Receiver for inbound events on a subscribed connection.
///
/// The adapter invokes this with an immutable event record; the relay is the
/// production implementation.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn on_event(&self, event: InboundEvent) -> Result<()>;
}

/// One live connection to the messaging network, bound to one account.
///
/// Handles live for the process lifetime; there is no eviction, health check,
/// or reconnect policy beyond what the network layer itself provides.
#[async_trait]
pub trait NetworkHandle: Send + Sync {
    /// Establish the connection if it is not already up. Idempotent.
    async fn connect(&self) -> Result<()>;

    async fn is_authorized(&self) -> Result<bool>;

    /// Issue a fresh QR login challenge.
    async fn begin_qr(&self) -> Result<QrChallenge>;

    /// Wait up to `timeout` for the challenge to be scanned and accepted.
    async fn wait_authorized(&self, challenge: &QrChallenge, timeout: Duration)
        -> Result<AuthPoll>;

    /// The opaque serialized session for a connection that has authorized.
    async fn session_token(&self) -> Result<String>;

    async fn send_text(&self, to: &str, text: &str) -> Result<()>;

    /// Install the inbound event subscription for this connection. Called
    /// once, at authorization time.
    async fn subscribe(&self, sink: Arc<dyn EventSink>) -> Result<()>;
}

/// Factory opening handles with network credentials from configuration.
#[async_trait]
pub trait NetworkConnector: Send + Sync {
    async fn open(&self, phone: &str) -> Result<Arc<dyn NetworkHandle>>;
}
