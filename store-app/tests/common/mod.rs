// Fixtures shared by the store-app integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use store_app::alerts::Alert;
use store_app::{LoginFlow, Route};
use store_client::query::{Select, Update};
use store_client::{
    AuthService, AuthSession, AuthUser, ClientResult, DataService, MemoryService, SessionStore,
    StoreClient,
};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

pub const EMAIL: &str = "vendor@test.com";
pub const PASSWORD: &str = "Vendor123!";

/// Vendor v1 owning R1 with no orders yet, plus a vendor without restaurants
pub fn fixture() -> MemoryService {
    let service = MemoryService::new();
    service.add_account(EMAIL, PASSWORD, "v1");
    service.add_account("empty@test.com", "Empty123!", "v2");
    service.add_account("rider@test.com", "Rider123!", "r1");

    service.seed("users", json!({ "id": "v1", "name": "Vera", "email": EMAIL, "user_type_id": "vendor" }));
    service.seed("users", json!({ "id": "v2", "name": "Eli", "email": "empty@test.com", "user_type_id": "vendor" }));
    service.seed("users", json!({ "id": "r1", "name": "Raul", "user_type_id": "rider" }));
    service.seed("users", json!({ "id": "c1", "name": "Ana", "phone": "611", "user_type_id": "customer" }));
    service.seed("restaurants", json!({ "id": "R1", "name": "Casa Vera", "vendor_id": "v1" }));
    service.seed("foods", json!({ "id": "f1", "title": "Paella", "image": null }));
    service
}

pub fn order_row(id: &str, code: &str, status: &str, amount: f64) -> Value {
    json!({
        "id": id,
        "order_id": code,
        "restaurant_id": "R1",
        "user_id": "c1",
        "rider_id": null,
        "order_status": status,
        "order_amount": amount,
        "delivery_address_text": "Calle Mayor 1",
        "created_at": "2024-05-01T10:00:00Z",
    })
}

pub fn session_store(dir: &TempDir) -> Arc<Mutex<SessionStore>> {
    Arc::new(Mutex::new(SessionStore::new(dir.path().join("session.json"))))
}

/// Signed-in client whose login was persisted in `dir`
pub async fn logged_in(
    service: &MemoryService,
    dir: &TempDir,
) -> (StoreClient, Arc<Mutex<SessionStore>>) {
    let client = StoreClient::memory(service.clone());
    let session = session_store(dir);
    let route = LoginFlow::new(client.clone(), session.clone())
        .submit(EMAIL, PASSWORD)
        .await
        .unwrap();
    assert_eq!(
        route,
        Route::Dashboard {
            restaurant_id: "R1".into()
        }
    );
    (client, session)
}

pub async fn next_alert(rx: &mut UnboundedReceiver<Alert>) -> Alert {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("alert within 2s")
        .expect("alert channel open")
}

/// Poll `condition` for up to one second
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Memory backend whose sign-in and updates take a while
#[derive(Clone)]
pub struct SlowService {
    pub inner: MemoryService,
    pub delay: Duration,
}

impl SlowService {
    pub fn client(service: &MemoryService, delay: Duration) -> StoreClient {
        let slow = Arc::new(SlowService {
            inner: service.clone(),
            delay,
        });
        StoreClient::new(slow.clone(), slow, Arc::new(service.clone()))
    }
}

#[async_trait]
impl AuthService for SlowService {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> ClientResult<AuthSession> {
        tokio::time::sleep(self.delay).await;
        self.inner.sign_in_with_password(email, password).await
    }

    async fn sign_out(&self) -> ClientResult<()> {
        self.inner.sign_out().await
    }

    async fn current_user(&self) -> ClientResult<Option<AuthUser>> {
        self.inner.current_user().await
    }

    async fn restore_session(&self, access_token: &str) -> ClientResult<Option<AuthUser>> {
        self.inner.restore_session(access_token).await
    }

    fn session(&self) -> Option<AuthSession> {
        AuthService::session(&self.inner)
    }
}

#[async_trait]
impl DataService for SlowService {
    async fn select(&self, query: &Select) -> ClientResult<Vec<Value>> {
        self.inner.select(query).await
    }

    async fn insert(&self, table: &str, row: Value) -> ClientResult<Vec<Value>> {
        self.inner.insert(table, row).await
    }

    async fn update(&self, update: &Update) -> ClientResult<Vec<Value>> {
        tokio::time::sleep(self.delay).await;
        self.inner.update(update).await
    }
}
