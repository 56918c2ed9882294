//! Live order feeds for one restaurant
//!
//! - [`OrderSubscriptions::subscribe_to_new_orders`]: inserted orders,
//!   re-fetched with their joins before the callback sees them
//! - [`OrderSubscriptions::subscribe_to_order_updates`]: raw changed fields
//!
//! Delivery is at least once. Callers dedupe by order id.

pub mod protocol;
mod socket;

pub use socket::{SocketChangeFeed, WsStream};

use std::sync::Arc;

use shared::{ChangeFilter, ChangeKind, Order, OrderPatch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ClientResult;
use crate::orders::OrderClient;
use crate::service::ChangeFeed;

/// Handle of a running subscription.
///
/// [`Subscription::unsubscribe`] returns once the callback task is gone;
/// dropping the handle cancels without waiting.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    fn new(topic: String, cancel: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self {
            topic,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub async fn unsubscribe(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        tracing::debug!(topic = %self.topic, "Unsubscribed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[derive(Clone)]
pub struct OrderSubscriptions {
    feed: Arc<dyn ChangeFeed>,
    orders: OrderClient,
}

impl OrderSubscriptions {
    pub fn new(feed: Arc<dyn ChangeFeed>, orders: OrderClient) -> Self {
        Self { feed, orders }
    }

    pub async fn subscribe_to_new_orders<F>(
        &self,
        restaurant_id: &str,
        callback: F,
    ) -> ClientResult<Subscription>
    where
        F: Fn(Order) + Send + Sync + 'static,
    {
        let filter = ChangeFilter::restaurant_orders(ChangeKind::Insert, restaurant_id);
        let topic = filter.topic();
        let mut stream = self.feed.listen(filter).await?;
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let orders = self.orders.clone();
        let task_topic = topic.clone();

        let handle = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = token.cancelled() => break,
                    event = stream.next() => event,
                };
                let Some(event) = event else {
                    tracing::warn!(topic = %task_topic, "Change feed closed");
                    break;
                };
                let Some(order_id) = event.record_id().map(str::to_string) else {
                    tracing::debug!(topic = %task_topic, "Insert event without id, skipped");
                    continue;
                };

                let fetched = tokio::select! {
                    _ = token.cancelled() => break,
                    fetched = orders.get_order(&order_id) => fetched,
                };
                match fetched {
                    Ok(order) => callback(order),
                    Err(e) => {
                        tracing::warn!(order_id = %order_id, "Failed to load new order: {e}");
                    }
                }
            }
        });

        tracing::info!(topic = %topic, "Subscribed to new orders");
        Ok(Subscription::new(topic, cancel, handle))
    }

    pub async fn subscribe_to_order_updates<F>(
        &self,
        restaurant_id: &str,
        callback: F,
    ) -> ClientResult<Subscription>
    where
        F: Fn(OrderPatch) + Send + Sync + 'static,
    {
        let filter = ChangeFilter::restaurant_orders(ChangeKind::Update, restaurant_id);
        let topic = filter.topic();
        let mut stream = self.feed.listen(filter).await?;
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task_topic = topic.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = stream.next() => match event {
                        Some(event) => callback(OrderPatch::from(event.record)),
                        None => {
                            tracing::warn!(topic = %task_topic, "Change feed closed");
                            break;
                        }
                    },
                }
            }
        });

        tracing::info!(topic = %topic, "Subscribed to order updates");
        Ok(Subscription::new(topic, cancel, handle))
    }
}
