// store-app/tests/dashboard.rs
// Live dashboard against the in-memory backend

mod common;

use std::time::Duration;

use common::*;
use serde_json::json;
use shared::{ChangeEvent, ChangeKind, ErrorCode, OrderStatus};
use store_app::alerts::{self, AlertKind};
use store_app::{Dashboard, DashboardError, LoginFlow, Phase, Route};
use store_client::{ClientError, NotificationOutcome, StoreClient};
use tempfile::TempDir;

#[tokio::test]
async fn test_new_order_reaches_empty_dashboard() {
    let service = fixture();
    let dir = TempDir::new().unwrap();
    let (client, session) = logged_in(&service, &dir).await;
    let (tx, mut rx) = alerts::channel();
    let dashboard = Dashboard::new(client, session, tx);

    dashboard.mount().await.unwrap();
    let state = dashboard.snapshot();
    assert_eq!(state.phase, Phase::Idle);
    assert_eq!(state.restaurant.as_ref().map(|r| r.id.as_str()), Some("R1"));
    assert!(state.orders.is_empty());
    assert_eq!(dashboard.subscription_count(), 2);

    service
        .insert_external("orders", order_row("order-new", "A123", "PENDING", 15.5))
        .unwrap();

    let alert = next_alert(&mut rx).await;
    assert_eq!(alert.kind, AlertKind::NewOrder);
    assert_eq!(alert.title, "New order A123");
    assert_eq!(alert.message, "Total: 15.50");

    let state = dashboard.snapshot();
    assert_eq!(state.orders.len(), 1);
    assert_eq!(state.orders[0].order_amount, 15.5);
    assert_eq!(state.orders[0].customer_name(), "Ana");
    dashboard.unmount().await;
}

#[tokio::test]
async fn test_redelivered_insert_is_listed_once() {
    let service = fixture();
    let dir = TempDir::new().unwrap();
    let (client, session) = logged_in(&service, &dir).await;
    let (tx, mut rx) = alerts::channel();
    let dashboard = Dashboard::new(client, session, tx);
    dashboard.mount().await.unwrap();

    let row = service
        .insert_external("orders", order_row("order-new", "A123", "PENDING", 15.5))
        .unwrap();
    next_alert(&mut rx).await;

    service.publish(ChangeEvent {
        kind: ChangeKind::Insert,
        schema: "public".into(),
        table: "orders".into(),
        record: row.as_object().cloned().unwrap(),
        old_record: None,
        commit_timestamp: None,
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(dashboard.snapshot().orders.len(), 1);
    assert!(rx.try_recv().is_err());
    dashboard.unmount().await;
}

#[tokio::test]
async fn test_updates_merge_into_listed_orders() {
    let service = fixture();
    service.seed("orders", order_row("order-123", "A123", "ACCEPTED", 20.0));
    let dir = TempDir::new().unwrap();
    let (client, session) = logged_in(&service, &dir).await;
    let (tx, _rx) = alerts::channel();
    let dashboard = Dashboard::new(client, session, tx);
    dashboard.mount().await.unwrap();
    assert_eq!(dashboard.snapshot().orders.len(), 1);

    service
        .update_external("orders", "order-123", json!({ "order_status": "ASSIGNED", "rider_id": "r1" }))
        .unwrap();

    assert!(
        eventually(|| {
            dashboard
                .snapshot()
                .find("order-123")
                .is_some_and(|o| o.order_status == OrderStatus::Assigned)
        })
        .await
    );
    let order = dashboard.snapshot().find("order-123").cloned().unwrap();
    assert_eq!(order.rider_id.as_deref(), Some("r1"));
    // Embedded customer survives the shallow merge
    assert_eq!(order.customer_name(), "Ana");
    dashboard.unmount().await;
}

#[tokio::test]
async fn test_accept_notifies_and_reloads() {
    let service = fixture();
    service.seed("orders", order_row("order-123", "A123", "PENDING", 20.0));
    let dir = TempDir::new().unwrap();
    let (client, session) = logged_in(&service, &dir).await;
    let (tx, _rx) = alerts::channel();
    let dashboard = Dashboard::new(client, session, tx);
    dashboard.mount().await.unwrap();
    assert!(dashboard.open_detail("order-123"));

    let outcome = dashboard.accept("order-123", Some(20)).await.unwrap();
    assert_eq!(outcome.order.order_status, OrderStatus::Accepted);
    assert!(matches!(outcome.notification, NotificationOutcome::Sent(_)));

    let state = dashboard.snapshot();
    assert!(state.selected.is_none());
    assert!(!state.is_in_flight("order-123"));
    let listed = state.find("order-123").unwrap();
    assert_eq!(listed.order_status, OrderStatus::Accepted);
    assert_eq!(listed.preparation_time, Some(20));

    let notifications = service.rows("notifications");
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["user_id"], "c1");
    dashboard.unmount().await;
}

#[tokio::test]
async fn test_reject_drops_order_from_active_list() {
    let service = fixture();
    service.seed("orders", order_row("order-123", "A123", "PENDING", 20.0));
    let dir = TempDir::new().unwrap();
    let (client, session) = logged_in(&service, &dir).await;
    let (tx, _rx) = alerts::channel();
    let dashboard = Dashboard::new(client, session, tx);
    dashboard.mount().await.unwrap();

    let err = dashboard.reject("order-123", "   ").await.unwrap_err();
    assert!(matches!(err, DashboardError::Client(ClientError::Validation(_))));

    let outcome = dashboard.reject("order-123", "Out of rice").await.unwrap();
    assert_eq!(outcome.order.order_status, OrderStatus::Cancelled);
    assert_eq!(outcome.order.reason.as_deref(), Some("Out of rice"));
    assert!(dashboard.snapshot().find("order-123").is_none());
    dashboard.unmount().await;
}

#[tokio::test]
async fn test_stale_status_raises_error_alert() {
    let service = fixture();
    service.seed("orders", order_row("order-123", "A123", "PENDING", 20.0));
    let dir = TempDir::new().unwrap();
    let (client, session) = logged_in(&service, &dir).await;
    let (tx, mut rx) = alerts::channel();
    let dashboard = Dashboard::new(client, session, tx);
    dashboard.mount().await.unwrap();
    // Stop the feeds so the dashboard keeps showing PENDING
    dashboard.unmount().await;

    service
        .update_external("orders", "order-123", json!({ "order_status": "CANCELLED", "reason": "customer" }))
        .unwrap();

    let err = dashboard.accept("order-123", None).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::OrderStatusConflict);

    let alert = next_alert(&mut rx).await;
    assert_eq!(alert.kind, AlertKind::Error);
    assert_eq!(alert.code, Some(ErrorCode::OrderStatusConflict));

    let stored = service.find("orders", "order-123").unwrap();
    assert_eq!(stored["order_status"], "CANCELLED");
    assert!(service.rows("notifications").is_empty());
}

#[tokio::test]
async fn test_second_action_on_same_order_is_refused() {
    let service = fixture();
    service.seed("orders", order_row("order-123", "A123", "PENDING", 20.0));
    let dir = TempDir::new().unwrap();
    let (_, session) = logged_in(&service, &dir).await;
    let client = SlowService::client(&service, Duration::from_millis(100));
    let (tx, _rx) = alerts::channel();
    let dashboard = Dashboard::new(client, session, tx);
    dashboard.mount().await.unwrap();

    let (first, second) = tokio::join!(
        dashboard.accept("order-123", None),
        dashboard.reject("order-123", "Closed")
    );
    assert!(first.is_ok());
    let err = second.unwrap_err();
    assert!(matches!(err, DashboardError::ActionInFlight(_)));
    assert_eq!(err.code(), ErrorCode::OrderActionInFlight);

    assert!(!dashboard.snapshot().is_in_flight("order-123"));
    assert_eq!(service.rows("notifications").len(), 1);
    dashboard.unmount().await;
}

#[tokio::test]
async fn test_failed_notification_only_warns() {
    let service = fixture();
    service.seed("orders", order_row("order-123", "A123", "PENDING", 20.0));
    service.fail_writes_to("notifications");
    let dir = TempDir::new().unwrap();
    let (client, session) = logged_in(&service, &dir).await;
    let (tx, mut rx) = alerts::channel();
    let dashboard = Dashboard::new(client, session, tx);
    dashboard.mount().await.unwrap();

    let outcome = dashboard.accept("order-123", None).await.unwrap();
    assert!(outcome.notification.is_failed());
    assert_eq!(
        service.find("orders", "order-123").unwrap()["order_status"],
        "ACCEPTED"
    );

    let alert = next_alert(&mut rx).await;
    assert_eq!(alert.kind, AlertKind::Warning);
    assert_eq!(alert.code, Some(ErrorCode::NotificationFailed));
    dashboard.unmount().await;
}

#[tokio::test]
async fn test_vendor_without_restaurant_is_blocked() {
    let service = fixture();
    let dir = TempDir::new().unwrap();
    let client = StoreClient::memory(service.clone());
    client.auth().sign_in("empty@test.com", "Empty123!").await.unwrap();
    let (tx, mut rx) = alerts::channel();
    let dashboard = Dashboard::new(client, session_store(&dir), tx);

    let err = dashboard.mount().await.unwrap_err();
    assert!(matches!(err, DashboardError::NoRestaurant));
    assert_eq!(dashboard.phase(), Phase::NoRestaurant);
    assert_eq!(dashboard.subscription_count(), 0);

    let alert = next_alert(&mut rx).await;
    assert_eq!(alert.kind, AlertKind::Blocking);
    assert_eq!(alert.message, "No restaurants found for this vendor");
}

#[tokio::test]
async fn test_remount_keeps_one_set_of_feeds() {
    let service = fixture();
    let dir = TempDir::new().unwrap();
    let (client, session) = logged_in(&service, &dir).await;
    let (tx, _rx) = alerts::channel();
    let dashboard = Dashboard::new(client, session, tx);

    dashboard.mount().await.unwrap();
    dashboard.mount().await.unwrap();
    assert_eq!(dashboard.subscription_count(), 2);
    assert!(eventually(|| service.subscriber_count() == 2).await);

    // One insert, one entry
    service
        .insert_external("orders", order_row("order-new", "A777", "PENDING", 9.0))
        .unwrap();
    assert!(eventually(|| dashboard.snapshot().orders.iter().any(|o| o.id == "order-new")).await);
    let copies = dashboard.snapshot().orders.iter().filter(|o| o.id == "order-new").count();
    assert_eq!(copies, 1);
}

#[tokio::test]
async fn test_logout_closes_feeds_and_forgets_session() {
    let service = fixture();
    let dir = TempDir::new().unwrap();
    let (client, session) = logged_in(&service, &dir).await;
    let (tx, _rx) = alerts::channel();
    let dashboard = Dashboard::new(client.clone(), session.clone(), tx);
    dashboard.mount().await.unwrap();
    assert_eq!(service.subscriber_count(), 2);

    let route = dashboard.logout().await.unwrap();
    assert_eq!(route, Route::Login);
    assert_eq!(dashboard.subscription_count(), 0);
    assert!(client.auth().session().is_none());
    assert!(session.lock().token().is_none());
    assert!(!dir.path().join("session.json").exists());
    assert!(eventually(|| service.subscriber_count() == 0).await);

    // Nothing reaches the dashboard any more
    service
        .insert_external("orders", order_row("order-late", "A999", "PENDING", 5.0))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(dashboard.snapshot().orders.is_empty());
}

#[tokio::test]
async fn test_mount_prefers_stored_restaurant() {
    let service = fixture();
    service.seed("restaurants", json!({ "id": "R0", "name": "Annex", "vendor_id": "v1" }));
    service.seed("orders", order_row("order-123", "A123", "PENDING", 20.0));
    let dir = TempDir::new().unwrap();
    let client = StoreClient::memory(service.clone());
    let session = session_store(&dir);
    let route = LoginFlow::new(client.clone(), session.clone())
        .submit(EMAIL, PASSWORD)
        .await
        .unwrap();
    // Restaurants are listed by name, so login picked the annex
    assert_eq!(
        route,
        Route::Dashboard {
            restaurant_id: "R0".into()
        }
    );

    session
        .lock()
        .set(store_client::session::STORE_ID_KEY, "R1")
        .unwrap();
    let (tx, _rx) = alerts::channel();
    let dashboard = Dashboard::new(client, session.clone(), tx);
    dashboard.mount().await.unwrap();
    assert_eq!(
        dashboard.snapshot().restaurant.map(|r| r.id),
        Some("R1".to_string())
    );
    assert_eq!(dashboard.snapshot().orders.len(), 1);

    dashboard.set_restaurant("R0").await.unwrap();
    assert!(dashboard.snapshot().orders.is_empty());
    assert_eq!(session.lock().restaurant_id(), Some("R0"));
    assert!(matches!(
        dashboard.set_restaurant("R9").await,
        Err(DashboardError::UnknownRestaurant(_))
    ));
    dashboard.unmount().await;
}
