//! Order queries and mutations
//!
//! Reads always return fully joined orders (customer, items with menu item,
//! variation and addons, rider). Writes are conditional on the stored
//! status, so a vendor acting on a stale view gets [`ClientError::StaleStatus`]
//! instead of overwriting a concurrent change.

use std::sync::Arc;

use serde_json::{Map, Value};
use shared::{NewNotification, Notification, Order, OrderStatus};

use crate::query::{Embed, Select, Update, decode_rows};
use crate::service::DataService;
use crate::{ClientError, ClientResult};

pub const ORDERS_TABLE: &str = "orders";
pub const NOTIFICATIONS_TABLE: &str = "notifications";

/// `orders` joined the way every list and detail view needs it
pub fn joined_orders() -> Select {
    Select::from(ORDERS_TABLE)
        .embed(Embed::one("user", "users", "user_id").columns(&["id", "name", "phone", "email"]))
        .embed(
            Embed::many("items", "order_items", "order_id")
                .embed(Embed::one("food", "foods", "food_id").columns(&["title", "image"]))
                .embed(Embed::one("variation", "variations", "variation_id").columns(&["title", "price"]))
                .embed(Embed::many("addons", "order_item_addons", "order_item_id")),
        )
        .embed(Embed::one("rider", "users", "rider_id").columns(&["id", "name", "phone"]))
}

/// Vendor action on one order
#[derive(Debug, Clone, PartialEq)]
pub enum OrderCommand {
    Accept { preparation_time: Option<u32> },
    Reject { reason: String },
    /// Ready for rider pickup
    MarkReady,
}

impl OrderCommand {
    pub fn target(&self) -> OrderStatus {
        match self {
            OrderCommand::Accept { .. } => OrderStatus::Accepted,
            OrderCommand::Reject { .. } => OrderStatus::Cancelled,
            OrderCommand::MarkReady => OrderStatus::Assigned,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OrderCommand::Accept { .. } => "accept",
            OrderCommand::Reject { .. } => "reject",
            OrderCommand::MarkReady => "ready",
        }
    }

    fn values(&self) -> Map<String, Value> {
        let mut values = Map::new();
        values.insert(
            "order_status".into(),
            Value::String(self.target().as_str().into()),
        );
        match self {
            OrderCommand::Accept {
                preparation_time: Some(minutes),
            } => {
                values.insert("preparation_time".into(), Value::from(*minutes));
            }
            OrderCommand::Reject { reason } => {
                values.insert("reason".into(), Value::String(reason.clone()));
            }
            _ => {}
        }
        values
    }

    fn notification(&self, order: &Order) -> Option<NewNotification> {
        match self {
            OrderCommand::Accept { .. } => Some(NewNotification::order_accepted(order)),
            OrderCommand::Reject { reason } => Some(NewNotification::order_cancelled(order, reason)),
            OrderCommand::MarkReady => None,
        }
    }
}

/// What happened to the customer notification of a mutation
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationOutcome {
    Sent(Notification),
    /// The status change stands; only the notification was lost
    Failed(String),
    NotRequired,
}

impl NotificationOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, NotificationOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    /// Row as written (no embeds)
    pub order: Order,
    pub notification: NotificationOutcome,
}

#[derive(Clone)]
pub struct OrderClient {
    data: Arc<dyn DataService>,
}

impl OrderClient {
    pub fn new(data: Arc<dyn DataService>) -> Self {
        Self { data }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Orders of a restaurant, newest first, optionally narrowed to one status
    pub async fn get_orders_for_restaurant(
        &self,
        restaurant_id: &str,
        status: Option<OrderStatus>,
    ) -> ClientResult<Vec<Order>> {
        let mut query = joined_orders()
            .eq("restaurant_id", restaurant_id)
            .order_by("created_at", false);
        if let Some(status) = status {
            query = query.eq("order_status", status.as_str());
        }
        decode_rows(self.data.select(&query).await?)
    }

    /// Orders still in progress, newest first
    pub async fn get_active_orders(&self, restaurant_id: &str) -> ClientResult<Vec<Order>> {
        let query = joined_orders()
            .eq("restaurant_id", restaurant_id)
            .is_in("order_status", OrderStatus::ACTIVE.iter().map(OrderStatus::as_str))
            .order_by("created_at", false);
        decode_rows(self.data.select(&query).await?)
    }

    pub async fn get_order(&self, order_id: &str) -> ClientResult<Order> {
        let query = joined_orders().eq("id", order_id).limit(1);
        decode_rows::<Order>(self.data.select(&query).await?)?
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::OrderNotFound(order_id.to_string()))
    }

    /// Order of `restaurant_id` by row id or display code
    pub async fn find_order(&self, restaurant_id: &str, reference: &str) -> ClientResult<Order> {
        for column in ["id", "order_id"] {
            let query = joined_orders()
                .eq("restaurant_id", restaurant_id)
                .eq(column, reference)
                .limit(1);
            if let Some(order) = decode_rows::<Order>(self.data.select(&query).await?)?
                .into_iter()
                .next()
            {
                return Ok(order);
            }
        }
        Err(ClientError::OrderNotFound(reference.to_string()))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub async fn accept_order(
        &self,
        order_id: &str,
        preparation_time: Option<u32>,
    ) -> ClientResult<MutationOutcome> {
        self.apply(order_id, OrderCommand::Accept { preparation_time }, None)
            .await
    }

    pub async fn reject_order(&self, order_id: &str, reason: &str) -> ClientResult<MutationOutcome> {
        self.apply(
            order_id,
            OrderCommand::Reject {
                reason: reason.trim().to_string(),
            },
            None,
        )
        .await
    }

    pub async fn mark_ready(&self, order_id: &str) -> ClientResult<MutationOutcome> {
        self.apply(order_id, OrderCommand::MarkReady, None).await
    }

    /// Run `command` as a single conditional update.
    ///
    /// With `expected`, the stored status must equal it; without, it must be
    /// one the command may move away from.
    pub async fn apply(
        &self,
        order_id: &str,
        command: OrderCommand,
        expected: Option<OrderStatus>,
    ) -> ClientResult<MutationOutcome> {
        if let OrderCommand::Reject { reason } = &command
            && reason.trim().is_empty()
        {
            return Err(ClientError::Validation("a rejection reason is required".into()));
        }
        let target = command.target();
        let allowed = match expected {
            Some(status) if !status.can_transition_to(target) => {
                return Err(ClientError::InvalidTransition {
                    from: status,
                    to: target,
                });
            }
            Some(status) => vec![status],
            None => OrderStatus::allowed_from(target),
        };

        let update = Update::table(ORDERS_TABLE)
            .values(command.values())
            .eq("id", order_id)
            .is_in("order_status", allowed.iter().map(OrderStatus::as_str));

        let Some(row) = self.data.update(&update).await?.into_iter().next() else {
            return Err(self.explain_miss(order_id, allowed).await);
        };
        let order: Order = serde_json::from_value(row)?;
        tracing::info!(
            order_id = %order.id,
            code = %order.order_id,
            action = command.name(),
            status = %order.order_status,
            "Order updated"
        );

        let notification = match command.notification(&order) {
            Some(notification) => self.notify(notification).await,
            None => NotificationOutcome::NotRequired,
        };
        Ok(MutationOutcome {
            order,
            notification,
        })
    }

    /// A conditional update matched nothing: tell a missing order from a
    /// moved-on one
    async fn explain_miss(&self, order_id: &str, expected: Vec<OrderStatus>) -> ClientError {
        let query = Select::from(ORDERS_TABLE)
            .columns(&["id", "order_status"])
            .eq("id", order_id)
            .limit(1);
        let rows = match self.data.select(&query).await {
            Ok(rows) => rows,
            Err(e) => return e,
        };
        let actual = rows
            .first()
            .and_then(|row| row.get("order_status"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<OrderStatus>().ok());

        match actual {
            Some(actual) => {
                tracing::warn!(order_id, actual = %actual, "Order status changed underneath");
                ClientError::StaleStatus {
                    order_id: order_id.to_string(),
                    expected,
                    actual,
                }
            }
            None => ClientError::OrderNotFound(order_id.to_string()),
        }
    }

    /// Best effort: a failed notification is logged and reported, never raised
    async fn notify(&self, notification: NewNotification) -> NotificationOutcome {
        let row = match serde_json::to_value(&notification) {
            Ok(row) => row,
            Err(e) => return NotificationOutcome::Failed(e.to_string()),
        };
        match self.data.insert(NOTIFICATIONS_TABLE, row).await {
            Ok(rows) => match rows.into_iter().next().map(serde_json::from_value::<Notification>) {
                Some(Ok(sent)) => NotificationOutcome::Sent(sent),
                Some(Err(e)) => {
                    tracing::warn!(user_id = %notification.user_id, "Notification stored but unreadable: {e}");
                    NotificationOutcome::Failed(e.to_string())
                }
                None => NotificationOutcome::Failed("no row returned".into()),
            },
            Err(e) => {
                tracing::warn!(
                    user_id = %notification.user_id,
                    code = %e.code(),
                    "Customer notification failed: {e}"
                );
                NotificationOutcome::Failed(e.to_string())
            }
        }
    }
}
