// store-app/tests/login.rs
// Login flow and startup routing

mod common;

use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use common::*;
use shared::ErrorCode;
use store_app::login::unix_now;
use store_app::{LoginError, LoginFlow, Route, startup_route};
use store_client::{ClientError, SessionStore, StoreClient};
use tempfile::TempDir;

fn jwt(exp: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"v1","exp":{exp}}}"#));
    format!("{header}.{payload}.sig")
}

#[tokio::test]
async fn test_login_persists_token_and_restaurant() {
    let service = fixture();
    let dir = TempDir::new().unwrap();
    let (client, _) = logged_in(&service, &dir).await;
    let token = client.auth().session().unwrap().access_token;

    let stored = SessionStore::load(dir.path().join("session.json")).unwrap();
    assert_eq!(stored.token(), Some(token.as_str()));
    assert_eq!(stored.restaurant_id(), Some("R1"));
}

#[tokio::test]
async fn test_empty_fields_never_reach_the_service() {
    let service = fixture();
    let dir = TempDir::new().unwrap();
    let flow = LoginFlow::new(StoreClient::memory(service.clone()), session_store(&dir));

    let err = flow.submit("", "").await.unwrap_err();
    assert!(matches!(err, LoginError::Validation(_)));
    assert_eq!(err.user_message(), "Please enter email and password");
    assert_eq!(err.code(), ErrorCode::RequiredField);
    assert!(!flow.is_in_progress());
}

#[tokio::test]
async fn test_rejected_logins_leave_nothing_behind() {
    let service = fixture();
    let dir = TempDir::new().unwrap();
    let client = StoreClient::memory(service.clone());
    let flow = LoginFlow::new(client.clone(), session_store(&dir));

    let err = flow.submit(EMAIL, "wrong").await.unwrap_err();
    assert!(matches!(err, LoginError::Client(ClientError::InvalidCredentials)));

    let err = flow.submit("rider@test.com", "Rider123!").await.unwrap_err();
    assert!(matches!(err, LoginError::Client(ClientError::NotVendor)));
    assert_eq!(err.user_message(), "This user is not a vendor");

    assert!(client.auth().session().is_none());
    assert!(!dir.path().join("session.json").exists());
    assert!(!flow.is_in_progress());
}

#[tokio::test]
async fn test_vendor_without_restaurants_is_signed_out() {
    let service = fixture();
    let dir = TempDir::new().unwrap();
    let client = StoreClient::memory(service.clone());
    let flow = LoginFlow::new(client.clone(), session_store(&dir));

    let err = flow.submit("empty@test.com", "Empty123!").await.unwrap_err();
    assert!(matches!(err, LoginError::NoRestaurants));
    assert_eq!(err.user_message(), "No restaurants found for this vendor");
    assert!(client.auth().session().is_none());
    assert!(!dir.path().join("session.json").exists());
}

#[tokio::test]
async fn test_concurrent_submit_is_refused() {
    let service = fixture();
    let dir = TempDir::new().unwrap();
    let client = SlowService::client(&service, Duration::from_millis(100));
    let flow = LoginFlow::new(client, session_store(&dir));

    let (first, second) = tokio::join!(flow.submit(EMAIL, PASSWORD), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(flow.is_in_progress());
        flow.submit(EMAIL, PASSWORD).await
    });
    assert!(matches!(first, Ok(Route::Dashboard { .. })));
    assert!(matches!(second, Err(LoginError::InProgress)));
    assert!(!flow.is_in_progress());
}

#[tokio::test]
async fn test_startup_restores_saved_session() {
    let service = fixture();
    let dir = TempDir::new().unwrap();
    logged_in(&service, &dir).await;

    // A fresh process: new client, session read back from disk
    let client = StoreClient::memory(service.clone());
    let session = parking_lot::Mutex::new(
        SessionStore::load(dir.path().join("session.json")).unwrap(),
    );
    let route = startup_route(&client, &session, unix_now()).await;
    assert_eq!(
        route,
        Route::Dashboard {
            restaurant_id: "R1".into()
        }
    );
    assert!(client.auth().session().is_some());
}

#[tokio::test]
async fn test_startup_without_session_goes_to_login() {
    let dir = TempDir::new().unwrap();
    let client = StoreClient::memory(fixture());
    let session = parking_lot::Mutex::new(SessionStore::new(dir.path().join("session.json")));
    assert_eq!(startup_route(&client, &session, unix_now()).await, Route::Login);
}

#[tokio::test]
async fn test_startup_with_expired_token_goes_to_login() {
    let dir = TempDir::new().unwrap();
    let client = StoreClient::memory(fixture());
    let mut store = SessionStore::new(dir.path().join("session.json"));
    store.store_login(&jwt(1_000), "R1").unwrap();
    let session = parking_lot::Mutex::new(store);

    assert_eq!(startup_route(&client, &session, 2_000).await, Route::Login);
}

#[tokio::test]
async fn test_startup_with_revoked_token_clears_store() {
    let dir = TempDir::new().unwrap();
    let client = StoreClient::memory(fixture());
    let mut store = SessionStore::new(dir.path().join("session.json"));
    store.store_login(&jwt(u64::MAX / 2), "R1").unwrap();
    let session = parking_lot::Mutex::new(store);

    assert_eq!(startup_route(&client, &session, unix_now()).await, Route::Login);
    assert!(session.lock().token().is_none());
    assert!(!dir.path().join("session.json").exists());
}
