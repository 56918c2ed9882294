//! StoreClient - one handle over auth, orders and live feeds

use std::sync::Arc;

use crate::auth::VendorAuth;
use crate::orders::OrderClient;
use crate::realtime::{OrderSubscriptions, SocketChangeFeed};
use crate::service::{AuthService, ChangeFeed, DataService};
use crate::{ClientConfig, ClientResult, HttpService, MemoryService};

/// Cheap to clone; every clone shares the same backend and session
#[derive(Clone)]
pub struct StoreClient {
    auth: VendorAuth,
    orders: OrderClient,
    realtime: OrderSubscriptions,
}

impl StoreClient {
    pub fn new(
        auth: Arc<dyn AuthService>,
        data: Arc<dyn DataService>,
        feed: Arc<dyn ChangeFeed>,
    ) -> Self {
        let orders = OrderClient::new(data.clone());
        Self {
            auth: VendorAuth::new(auth, data),
            realtime: OrderSubscriptions::new(feed, orders.clone()),
            orders,
        }
    }

    /// Client for the hosted service described by `config`
    pub fn http(config: &ClientConfig) -> ClientResult<Self> {
        let service = Arc::new(HttpService::new(config)?);
        let feed = Arc::new(SocketChangeFeed::new(config, service.clone())?);
        tracing::debug!(service_url = %config.service_url, "Hosted store client created");
        Ok(Self::new(service.clone(), service, feed))
    }

    /// Client backed by an in-memory service
    pub fn memory(service: MemoryService) -> Self {
        let service = Arc::new(service);
        Self::new(service.clone(), service.clone(), service)
    }

    pub fn auth(&self) -> &VendorAuth {
        &self.auth
    }

    pub fn orders(&self) -> &OrderClient {
        &self.orders
    }

    pub fn realtime(&self) -> &OrderSubscriptions {
        &self.realtime
    }
}
