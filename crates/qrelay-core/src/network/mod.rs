//! Messaging-network abstractions (gateway adapter lives in `qrelay-gateway`).

pub mod port;
pub mod registry;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use port::{EventSink, NetworkConnector, NetworkHandle};
pub use registry::ClientRegistry;
