use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    domain::Phone,
    network::port::{NetworkConnector, NetworkHandle},
    Result,
};

/// Registry of live connection handles, one per phone number.
///
/// Created once at process start and owned by the application state. Handle
/// creation happens under the map lock, so concurrent first requests for the
/// same phone resolve to a single handle. Entries are never evicted.
pub struct ClientRegistry {
    connector: Arc<dyn NetworkConnector>,
    handles: Mutex<HashMap<Phone, Arc<dyn NetworkHandle>>>,
}

impl ClientRegistry {
    pub fn new(connector: Arc<dyn NetworkConnector>) -> Self {
        Self {
            connector,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the handle for `phone`, opening one on first request.
    pub async fn get_or_open(&self, phone: &Phone) -> Result<Arc<dyn NetworkHandle>> {
        let mut map = self.handles.lock().await;
        if let Some(handle) = map.get(phone) {
            return Ok(handle.clone());
        }

        let handle = self.connector.open(phone.as_str()).await?;
        map.insert(phone.clone(), handle.clone());
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::testutil::FakeConnector;

    #[tokio::test]
    async fn reuses_handle_for_same_phone() {
        let connector = Arc::new(FakeConnector::default());
        let registry = ClientRegistry::new(connector.clone());

        let phone = Phone::from("+1000");
        let a = registry.get_or_open(&phone).await.unwrap();
        let b = registry.get_or_open(&phone).await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(connector.opened(), 1);
    }

    #[tokio::test]
    async fn opens_one_handle_per_phone() {
        let connector = Arc::new(FakeConnector::default());
        let registry = ClientRegistry::new(connector.clone());

        registry.get_or_open(&Phone::from("+1")).await.unwrap();
        registry.get_or_open(&Phone::from("+2")).await.unwrap();

        assert_eq!(connector.opened(), 2);
    }
}
