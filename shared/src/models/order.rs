//! Order Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::UserSummary;

// ============================================================================
// Order Status
// ============================================================================

/// Order lifecycle status
///
/// ```text
/// PENDING ──▶ ACCEPTED ──▶ ASSIGNED ──▶ PICKED ──▶ DELIVERED
///    │           │            │           │
///    └───────────┴────────────┴───────────┴──▶ CANCELLED
/// ```
///
/// ASSIGNED is also reached by rider dispatch, PICKED and DELIVERED only by
/// the rider application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Accepted,
    Assigned,
    Picked,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Orders still in progress (not delivered, not cancelled)
    pub const ACTIVE: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::Assigned,
        OrderStatus::Picked,
    ];

    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::Assigned,
        OrderStatus::Picked,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Wire value stored in `orders.order_status`
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Assigned => "ASSIGNED",
            OrderStatus::Picked => "PICKED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Human-readable label for list badges
    pub const fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Accepted => "Accepted",
            OrderStatus::Assigned => "Assigned",
            OrderStatus::Picked => "Picked up",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether `next` may be written over `self`.
    ///
    /// Re-applying ACCEPTED or ASSIGNED is allowed so that repeated vendor
    /// actions stay idempotent on the status.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Delivered | Cancelled, _) => false,
            (_, Cancelled) => true,
            (Pending | Accepted, Accepted) => true,
            (Accepted | Assigned, Assigned) => true,
            (Assigned, Picked) => true,
            (Picked, Delivered) => true,
            _ => false,
        }
    }

    /// Every status from which `target` may be reached
    pub fn allowed_from(target: OrderStatus) -> Vec<OrderStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(target))
            .collect()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct UnknownOrderStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownOrderStatus(s.to_string()))
    }
}

// ============================================================================
// Order Items
// ============================================================================

/// Menu item reference embedded into an order item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodSummary {
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// Selected variation embedded into an order item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariationSummary {
    pub title: String,
    /// Price in currency unit
    pub price: f64,
}

/// Add-on chosen for an order item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItemAddon {
    pub id: String,
    #[serde(default)]
    pub order_item_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Price in currency unit
    #[serde(default)]
    pub price: Option<f64>,
}

/// Order line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub food_id: Option<String>,
    #[serde(default)]
    pub variation_id: Option<String>,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food: Option<FoodSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<VariationSummary>,
    #[serde(default)]
    pub addons: Vec<OrderItemAddon>,
}

impl OrderItem {
    /// Display title, falling back to the food id
    pub fn title(&self) -> &str {
        self.food
            .as_ref()
            .map(|f| f.title.as_str())
            .or(self.food_id.as_deref())
            .unwrap_or("Item")
    }
}

// ============================================================================
// Order
// ============================================================================

/// Order row, optionally joined with customer, items and rider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    /// Short display code shown to vendor and customer
    pub order_id: String,
    pub restaurant_id: String,
    pub user_id: String,
    #[serde(default)]
    pub rider_id: Option<String>,
    pub order_status: OrderStatus,
    /// Total in currency unit
    pub order_amount: f64,
    #[serde(default, rename = "delivery_address_text")]
    pub delivery_address: Option<String>,
    /// Minutes announced on accept
    #[serde(default)]
    pub preparation_time: Option<u32>,
    /// Cancellation reason
    #[serde(default)]
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rider: Option<RiderSummary>,
}

/// Rider fields embedded into an order
pub type RiderSummary = UserSummary;

impl Order {
    /// Customer name for list rows
    pub fn customer_name(&self) -> &str {
        self.user
            .as_ref()
            .and_then(|u| u.name.as_deref())
            .unwrap_or("Customer")
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Shallow-merge raw changed fields over this order.
    ///
    /// Keys present in `patch` replace the current values, everything else
    /// (including embedded relations) is kept. `self` is left untouched when
    /// the merged record does not form a valid order.
    pub fn apply_patch(&mut self, patch: &OrderPatch) -> Result<(), serde_json::Error> {
        let mut value = serde_json::to_value(&*self)?;
        if let Value::Object(map) = &mut value {
            for (key, field) in patch.fields() {
                map.insert(key.clone(), field.clone());
            }
        }
        *self = serde_json::from_value(value)?;
        Ok(())
    }
}

/// Raw changed columns of an `orders` row, as delivered by the update feed
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct OrderPatch(Map<String, Value>);

impl OrderPatch {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Row id of the changed order
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Display code, when the change carries it
    pub fn order_code(&self) -> Option<&str> {
        self.0.get("order_id").and_then(Value::as_str)
    }

    pub fn status(&self) -> Option<OrderStatus> {
        self.0
            .get("order_status")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for OrderPatch {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
