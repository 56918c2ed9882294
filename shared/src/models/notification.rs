//! Notification Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::Order;

/// `notifications.type` for order lifecycle messages
pub const NOTIFICATION_TYPE_ORDER: &str = "order";

/// Customer notification row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Row id of the order this notification refers to
    pub fn order_ref(&self) -> Option<&str> {
        self.metadata.get("order_id").and_then(Value::as_str)
    }
}

/// Insert payload for `notifications`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub metadata: Value,
}

impl NewNotification {
    fn for_order(order: &Order, title: &str, body: String) -> Self {
        Self {
            user_id: order.user_id.clone(),
            title: title.to_string(),
            body,
            kind: NOTIFICATION_TYPE_ORDER.to_string(),
            metadata: json!({ "order_id": order.id }),
        }
    }

    /// Tells the customer the order is being prepared
    pub fn order_accepted(order: &Order) -> Self {
        Self::for_order(
            order,
            "Order accepted",
            format!(
                "Your order {} has been accepted and is being prepared",
                order.order_id
            ),
        )
    }

    /// Tells the customer the order was cancelled and why
    pub fn order_cancelled(order: &Order, reason: &str) -> Self {
        Self::for_order(
            order,
            "Order cancelled",
            format!(
                "Your order {} has been cancelled. Reason: {}",
                order.order_id, reason
            ),
        )
    }
}
