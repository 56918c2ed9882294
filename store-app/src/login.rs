//! Login flow and startup routing

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use shared::ErrorCode;
use store_client::{ClientError, SessionStore, SessionStoreError, StoreClient};
use thiserror::Error;

/// Where the app goes next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard { restaurant_id: String },
}

#[derive(Debug, Error)]
pub enum LoginError {
    /// Rejected before any network call
    #[error("{0}")]
    Validation(String),

    #[error("A login is already in progress")]
    InProgress,

    #[error("No restaurants found for this vendor")]
    NoRestaurants,

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Could not save the session: {0}")]
    Storage(#[from] SessionStoreError),
}

impl LoginError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LoginError::Validation(_) => ErrorCode::RequiredField,
            LoginError::InProgress => ErrorCode::InvalidRequest,
            LoginError::NoRestaurants => ErrorCode::NoRestaurants,
            LoginError::Client(e) => e.code(),
            LoginError::Storage(_) => ErrorCode::StorageError,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            LoginError::Client(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Clears the in-progress flag however the attempt ends
struct InProgressGuard<'a>(&'a AtomicBool);

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct LoginFlow {
    client: StoreClient,
    session: Arc<Mutex<SessionStore>>,
    in_progress: AtomicBool,
}

impl LoginFlow {
    pub fn new(client: StoreClient, session: Arc<Mutex<SessionStore>>) -> Self {
        Self {
            client,
            session,
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub fn validate(email: &str, password: &str) -> Result<(), LoginError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(LoginError::Validation(
                "Please enter email and password".into(),
            ));
        }
        Ok(())
    }

    /// Sign in, require at least one restaurant, persist the session
    pub async fn submit(&self, email: &str, password: &str) -> Result<Route, LoginError> {
        Self::validate(email, password)?;
        if self.in_progress.swap(true, Ordering::AcqRel) {
            return Err(LoginError::InProgress);
        }
        let _guard = InProgressGuard(&self.in_progress);

        let auth = self.client.auth();
        let session = auth.sign_in(email.trim(), password).await?;
        let profile = match auth.get_profile().await {
            Ok(profile) => profile,
            Err(e) => {
                if let Err(sign_out) = auth.sign_out().await {
                    tracing::warn!("Sign-out after failed profile load: {sign_out}");
                }
                return Err(e.into());
            }
        };

        let Some(restaurant) = profile.primary_restaurant() else {
            tracing::warn!(user_id = %profile.user.id, "Vendor has no restaurants");
            if let Err(e) = auth.sign_out().await {
                tracing::warn!("Sign-out after empty profile failed: {e}");
            }
            return Err(LoginError::NoRestaurants);
        };

        self.session
            .lock()
            .store_login(&session.access_token, &restaurant.id)?;
        tracing::info!(user_id = %profile.user.id, restaurant_id = %restaurant.id, "Login complete");

        Ok(Route::Dashboard {
            restaurant_id: restaurant.id.clone(),
        })
    }
}

/// Route at app start.
///
/// A stored token that is unexpired at `now` (Unix seconds) and still
/// accepted by the service opens the dashboard; anything else goes to login.
pub async fn startup_route(
    client: &StoreClient,
    session: &Mutex<SessionStore>,
    now: u64,
) -> Route {
    let (token, restaurant_id) = {
        let store = session.lock();
        (
            store.valid_token(now).map(str::to_string),
            store.restaurant_id().map(str::to_string),
        )
    };
    let (Some(token), Some(restaurant_id)) = (token, restaurant_id) else {
        return Route::Login;
    };

    match client.auth().restore_session(&token).await {
        Ok(Some(_)) => Route::Dashboard { restaurant_id },
        Ok(None) => {
            if let Err(e) = session.lock().clear() {
                tracing::warn!("Failed to clear stale session: {e}");
            }
            Route::Login
        }
        Err(e) => {
            tracing::warn!(code = %e.code(), "Session restore failed: {e}");
            Route::Login
        }
    }
}

pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
