//! Live order dashboard
//!
//! [`DashboardState`] is plain data with the merge rules for feed events.
//! [`Dashboard`] drives it: loads the profile and orders, keeps both
//! subscriptions open, and runs vendor actions.
//!
//! ```text
//! LoadingProfile ──▶ NoRestaurant
//!       │
//!       ▼
//! LoadingOrders ──▶ Idle ⇄ Refreshing
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use shared::{ErrorCode, Order, OrderPatch, OrderStatus, Restaurant, VendorUser};
use store_client::{
    ClientError, MutationOutcome, OrderCommand, SessionStore, SessionStoreError, StoreClient,
    Subscription,
};
use thiserror::Error;

use crate::alerts::{Alert, AlertKind, AlertSender};
use crate::login::Route;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("An action for order {0} is already running")]
    ActionInFlight(String),

    #[error("No restaurants found for this vendor")]
    NoRestaurant,

    #[error("Restaurant {0} does not belong to this vendor")]
    UnknownRestaurant(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Session storage failed: {0}")]
    Storage(#[from] SessionStoreError),
}

impl DashboardError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DashboardError::ActionInFlight(_) => ErrorCode::OrderActionInFlight,
            DashboardError::NoRestaurant => ErrorCode::NoRestaurants,
            DashboardError::UnknownRestaurant(_) => ErrorCode::RestaurantNotFound,
            DashboardError::Client(e) => e.code(),
            DashboardError::Storage(_) => ErrorCode::StorageError,
        }
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    LoadingProfile,
    /// Terminal for this session
    NoRestaurant,
    LoadingOrders,
    Idle,
    Refreshing,
}

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub phase: Phase,
    pub vendor: Option<VendorUser>,
    pub restaurants: Vec<Restaurant>,
    pub restaurant: Option<Restaurant>,
    /// Newest first
    pub orders: Vec<Order>,
    /// Order whose detail view is open
    pub selected: Option<String>,
    in_flight: HashSet<String>,
}

impl DashboardState {
    pub fn find(&self, order_id: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == order_id)
    }

    /// Lookup by display code, case-insensitive
    pub fn find_by_code(&self, code: &str) -> Option<&Order> {
        self.orders
            .iter()
            .find(|o| o.order_id.eq_ignore_ascii_case(code))
    }

    /// Prepend unless an order with the same id is already listed.
    /// Returns whether the order was added.
    pub fn insert_new_order(&mut self, order: Order) -> bool {
        if self.find(&order.id).is_some() {
            tracing::debug!(order_id = %order.id, "Duplicate new-order event ignored");
            return false;
        }
        self.orders.insert(0, order);
        true
    }

    /// Shallow-merge changed fields into the listed order with the same id.
    /// Unknown ids are ignored.
    pub fn apply_update(&mut self, patch: &OrderPatch) -> bool {
        let Some(id) = patch.id() else {
            return false;
        };
        let Some(order) = self.orders.iter_mut().find(|o| o.id == id) else {
            return false;
        };
        match order.apply_patch(patch) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(order_id = %id, "Order update could not be merged: {e}");
                false
            }
        }
    }

    pub fn replace_orders(&mut self, orders: Vec<Order>) {
        self.orders = orders;
        let stale = match &self.selected {
            Some(selected) => self.find(selected).is_none(),
            None => false,
        };
        if stale {
            self.selected = None;
        }
    }

    pub fn open_detail(&mut self, order_id: &str) -> bool {
        if self.find(order_id).is_some() {
            self.selected = Some(order_id.to_string());
            true
        } else {
            false
        }
    }

    pub fn close_detail(&mut self) {
        self.selected = None;
    }

    pub fn selected_order(&self) -> Option<&Order> {
        self.selected.as_deref().and_then(|id| self.find(id))
    }

    pub fn active_count(&self) -> usize {
        self.orders
            .iter()
            .filter(|o| o.order_status.is_active())
            .count()
    }

    pub fn is_in_flight(&self, order_id: &str) -> bool {
        self.in_flight.contains(order_id)
    }

    fn begin_action(&mut self, order_id: &str) -> bool {
        self.in_flight.insert(order_id.to_string())
    }

    fn end_action(&mut self, order_id: &str) {
        self.in_flight.remove(order_id);
    }
}

/// Releases the per-order action slot however the action ends
struct ActionGuard {
    state: Arc<Mutex<DashboardState>>,
    order_id: String,
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        self.state.lock().end_action(&self.order_id);
    }
}

// ============================================================================
// Controller
// ============================================================================

pub struct Dashboard {
    client: StoreClient,
    session: Arc<Mutex<SessionStore>>,
    state: Arc<Mutex<DashboardState>>,
    alerts: AlertSender,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Dashboard {
    pub fn new(client: StoreClient, session: Arc<Mutex<SessionStore>>, alerts: AlertSender) -> Self {
        Self {
            client,
            session,
            state: Arc::new(Mutex::new(DashboardState::default())),
            alerts,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> DashboardState {
        self.state.lock().clone()
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub fn open_detail(&self, order_id: &str) -> bool {
        self.state.lock().open_detail(order_id)
    }

    pub fn close_detail(&self) {
        self.state.lock().close_detail();
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Load profile and orders, then open the live feeds
    pub async fn mount(&self) -> DashboardResult<()> {
        // A remount replaces the feeds of the previous one
        self.unmount().await;
        self.state.lock().phase = Phase::LoadingProfile;

        let profile = match self.client.auth().get_profile().await {
            Ok(profile) => profile,
            Err(e) => {
                self.alerts.send(Alert::error("Could not load profile", &e));
                return Err(e.into());
            }
        };

        let stored = self.session.lock().restaurant_id().map(str::to_string);
        let restaurant = stored
            .and_then(|id| profile.restaurants.iter().find(|r| r.id == id).cloned())
            .or_else(|| profile.primary_restaurant().cloned());

        let Some(restaurant) = restaurant else {
            {
                let mut state = self.state.lock();
                state.phase = Phase::NoRestaurant;
                state.vendor = Some(profile.user);
            }
            self.alerts.send(
                Alert::new(
                    AlertKind::Blocking,
                    "No restaurant",
                    "No restaurants found for this vendor",
                )
                .with_code(ErrorCode::NoRestaurants),
            );
            return Err(DashboardError::NoRestaurant);
        };

        {
            let mut state = self.state.lock();
            state.vendor = Some(profile.user);
            state.restaurants = profile.restaurants;
            state.restaurant = Some(restaurant.clone());
            state.phase = Phase::LoadingOrders;
        }
        tracing::info!(restaurant_id = %restaurant.id, "Dashboard mounted");

        let loaded = self.reload_orders(&restaurant.id).await;
        self.state.lock().phase = Phase::Idle;
        loaded?;

        self.subscribe(&restaurant.id).await
    }

    /// Pull-to-refresh: full reload of the active list
    pub async fn refresh(&self) -> DashboardResult<()> {
        let restaurant_id = {
            let mut state = self.state.lock();
            if state.phase != Phase::Idle {
                return Ok(());
            }
            let Some(restaurant) = &state.restaurant else {
                return Ok(());
            };
            let id = restaurant.id.clone();
            state.phase = Phase::Refreshing;
            id
        };

        let result = self.reload_orders(&restaurant_id).await;
        self.state.lock().phase = Phase::Idle;
        result
    }

    pub async fn accept(
        &self,
        order_id: &str,
        preparation_time: Option<u32>,
    ) -> DashboardResult<MutationOutcome> {
        self.run_action(order_id, OrderCommand::Accept { preparation_time })
            .await
    }

    pub async fn reject(&self, order_id: &str, reason: &str) -> DashboardResult<MutationOutcome> {
        self.run_action(
            order_id,
            OrderCommand::Reject {
                reason: reason.trim().to_string(),
            },
        )
        .await
    }

    pub async fn mark_ready(&self, order_id: &str) -> DashboardResult<MutationOutcome> {
        self.run_action(order_id, OrderCommand::MarkReady).await
    }

    /// Switch to another restaurant of this vendor
    pub async fn set_restaurant(&self, restaurant_id: &str) -> DashboardResult<()> {
        let restaurant = self
            .state
            .lock()
            .restaurants
            .iter()
            .find(|r| r.id == restaurant_id)
            .cloned()
            .ok_or_else(|| DashboardError::UnknownRestaurant(restaurant_id.to_string()))?;

        self.unmount().await;
        {
            let mut state = self.state.lock();
            state.restaurant = Some(restaurant.clone());
            state.orders.clear();
            state.selected = None;
            state.phase = Phase::LoadingOrders;
        }
        self.session
            .lock()
            .set(store_client::session::STORE_ID_KEY, &restaurant.id)?;

        let loaded = self.reload_orders(&restaurant.id).await;
        self.state.lock().phase = Phase::Idle;
        loaded?;
        self.subscribe(&restaurant.id).await
    }

    /// Close feeds, end the session and forget it locally
    pub async fn logout(&self) -> DashboardResult<Route> {
        self.unmount().await;
        if let Err(e) = self.client.auth().sign_out().await {
            tracing::warn!(code = %e.code(), "Sign-out failed, clearing local session anyway: {e}");
        }
        self.session.lock().clear()?;
        *self.state.lock() = DashboardState::default();
        Ok(Route::Login)
    }

    /// Close both feeds; no callback runs once this returns
    pub async fn unmount(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for subscription in subscriptions {
            subscription.unsubscribe().await;
        }
    }

    async fn reload_orders(&self, restaurant_id: &str) -> DashboardResult<()> {
        match self.client.orders().get_active_orders(restaurant_id).await {
            Ok(orders) => {
                tracing::debug!(restaurant_id, count = orders.len(), "Orders loaded");
                self.state.lock().replace_orders(orders);
                Ok(())
            }
            Err(e) => {
                self.alerts.send(Alert::error("Could not load orders", &e));
                Err(e.into())
            }
        }
    }

    async fn subscribe(&self, restaurant_id: &str) -> DashboardResult<()> {
        let state = self.state.clone();
        let alerts = self.alerts.clone();
        let new_orders = self
            .client
            .realtime()
            .subscribe_to_new_orders(restaurant_id, move |order| {
                let alert = Alert::new_order(&order.order_id, order.order_amount);
                if state.lock().insert_new_order(order) {
                    alerts.send(alert);
                }
            })
            .await;
        let new_orders = match new_orders {
            Ok(subscription) => subscription,
            Err(e) => {
                self.alerts.send(Alert::error("Live orders unavailable", &e));
                return Err(e.into());
            }
        };

        let state = self.state.clone();
        let updates = self
            .client
            .realtime()
            .subscribe_to_order_updates(restaurant_id, move |patch| {
                state.lock().apply_update(&patch);
            })
            .await;
        let updates = match updates {
            Ok(subscription) => subscription,
            Err(e) => {
                new_orders.unsubscribe().await;
                self.alerts.send(Alert::error("Live updates unavailable", &e));
                return Err(e.into());
            }
        };

        self.subscriptions.lock().extend([new_orders, updates]);
        Ok(())
    }

    async fn run_action(
        &self,
        order_id: &str,
        command: OrderCommand,
    ) -> DashboardResult<MutationOutcome> {
        let action = command.name();
        let (expected, restaurant_id) = {
            let mut state = self.state.lock();
            if !state.begin_action(order_id) {
                return Err(DashboardError::ActionInFlight(order_id.to_string()));
            }
            (
                state.find(order_id).map(|o| o.order_status),
                state.restaurant.as_ref().map(|r| r.id.clone()),
            )
        };
        let _guard = ActionGuard {
            state: self.state.clone(),
            order_id: order_id.to_string(),
        };

        let outcome = match self.client.orders().apply(order_id, command, expected).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(order_id, action, code = %e.code(), "Order action failed: {e}");
                self.alerts
                    .send(Alert::error(format!("Could not {action} order"), &e));
                return Err(e.into());
            }
        };

        tracing::info!(
            target: "audit",
            order_id,
            code = %outcome.order.order_id,
            action,
            status = %outcome.order.order_status,
            "Vendor order action"
        );
        if outcome.notification.is_failed() {
            self.alerts.send(
                Alert::new(
                    AlertKind::Warning,
                    "Customer not notified",
                    format!("Order {} was updated, but the customer notification failed", outcome.order.order_id),
                )
                .with_code(ErrorCode::NotificationFailed),
            );
        }

        self.state.lock().close_detail();
        if let Some(restaurant_id) = restaurant_id {
            // The action itself succeeded; a failed reload only raises an alert
            let _ = self.reload_orders(&restaurant_id).await;
        }
        Ok(outcome)
    }
}

/// Status the vendor can move an order to next, if any
pub fn next_action(status: OrderStatus) -> Option<&'static str> {
    match status {
        OrderStatus::Pending => Some("accept / reject"),
        OrderStatus::Accepted => Some("ready / reject"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order(id: &str, status: &str) -> Order {
        serde_json::from_value(json!({
            "id": id,
            "order_id": format!("C-{id}"),
            "restaurant_id": "R1",
            "user_id": "c1",
            "order_status": status,
            "order_amount": 10.0,
            "created_at": "2024-05-01T10:00:00Z",
            "user": { "id": "c1", "name": "Ana" }
        }))
        .unwrap()
    }

    fn patch(value: serde_json::Value) -> OrderPatch {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_insert_is_deduplicated_and_prepends() {
        let mut state = DashboardState::default();
        assert!(state.insert_new_order(order("o1", "PENDING")));
        assert!(state.insert_new_order(order("o2", "PENDING")));
        assert!(!state.insert_new_order(order("o1", "PENDING")));

        let ids: Vec<_> = state.orders.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["o2", "o1"]);
    }

    #[test]
    fn test_updates_merge_shallowly() {
        let mut state = DashboardState::default();
        state.insert_new_order(order("o1", "PENDING"));

        assert!(state.apply_update(&patch(json!({ "id": "o1", "order_status": "ACCEPTED", "preparation_time": 15 }))));
        assert!(state.apply_update(&patch(json!({ "id": "o1", "order_status": "ASSIGNED" }))));

        let merged = state.find("o1").unwrap();
        assert_eq!(merged.order_status, OrderStatus::Assigned);
        assert_eq!(merged.preparation_time, Some(15));
        assert_eq!(merged.customer_name(), "Ana");
    }

    #[test]
    fn test_unknown_or_invalid_updates_are_ignored() {
        let mut state = DashboardState::default();
        state.insert_new_order(order("o1", "PENDING"));

        assert!(!state.apply_update(&patch(json!({ "id": "zz", "order_status": "ACCEPTED" }))));
        assert!(!state.apply_update(&patch(json!({ "order_status": "ACCEPTED" }))));
        assert!(!state.apply_update(&patch(json!({ "id": "o1", "order_status": "LOST" }))));
        assert_eq!(state.find("o1").unwrap().order_status, OrderStatus::Pending);
        assert_eq!(state.orders.len(), 1);
    }

    #[test]
    fn test_detail_selection() {
        let mut state = DashboardState::default();
        state.insert_new_order(order("o1", "PENDING"));
        assert!(!state.open_detail("nope"));
        assert!(state.open_detail("o1"));
        assert_eq!(state.selected_order().map(|o| o.id.as_str()), Some("o1"));

        state.replace_orders(vec![order("o2", "ACCEPTED")]);
        assert!(state.selected.is_none());
    }

    #[test]
    fn test_action_slots() {
        let mut state = DashboardState::default();
        assert!(state.begin_action("o1"));
        assert!(!state.begin_action("o1"));
        assert!(state.is_in_flight("o1"));
        state.end_action("o1");
        assert!(state.begin_action("o1"));
    }

    #[test]
    fn test_find_by_code() {
        let mut state = DashboardState::default();
        state.insert_new_order(order("o1", "PENDING"));
        assert_eq!(state.find_by_code("c-o1").map(|o| o.id.as_str()), Some("o1"));
    }
}
