//! Vendor authentication
//!
//! Password sign-in against the auth service, followed by a lookup of the
//! `users` row: only accounts typed as vendor keep their session.

use std::sync::Arc;

use shared::{Restaurant, VendorProfile, VendorUser};

use crate::query::{Select, decode_rows};
use crate::service::{AuthService, AuthSession, AuthUser, DataService};
use crate::{ClientError, ClientResult};

#[derive(Clone)]
pub struct VendorAuth {
    auth: Arc<dyn AuthService>,
    data: Arc<dyn DataService>,
}

impl VendorAuth {
    pub fn new(auth: Arc<dyn AuthService>, data: Arc<dyn DataService>) -> Self {
        Self { auth, data }
    }

    /// Sign in and check the account is a vendor.
    ///
    /// Any failure after the password grant signs out again, so a rejected
    /// account never keeps a session.
    pub async fn sign_in(&self, email: &str, password: &str) -> ClientResult<AuthSession> {
        let session = self.auth.sign_in_with_password(email, password).await?;

        let checked = match self.fetch_user(&session.user.id).await {
            Ok(user) if user.is_vendor() => Ok(()),
            Ok(user) => {
                tracing::warn!(user_id = %user.id, user_type = ?user.user_type, "Sign-in refused: not a vendor");
                Err(ClientError::NotVendor)
            }
            Err(e) => Err(e),
        };
        if let Err(e) = checked {
            if let Err(sign_out) = self.auth.sign_out().await {
                tracing::warn!("Sign-out after refused sign-in failed: {sign_out}");
            }
            return Err(e);
        }

        tracing::info!(user_id = %session.user.id, "Vendor signed in");
        Ok(session)
    }

    /// Vendor row plus owned restaurants of the signed-in user
    pub async fn get_profile(&self) -> ClientResult<VendorProfile> {
        let user = self.current_user().await?;
        let vendor = self.fetch_user(&user.id).await?;
        let query = Select::from("restaurants")
            .eq("vendor_id", user.id.as_str())
            .order_by("name", true);
        let restaurants: Vec<Restaurant> = decode_rows(self.data.select(&query).await?)?;

        tracing::debug!(user_id = %user.id, restaurants = restaurants.len(), "Profile loaded");
        Ok(VendorProfile {
            user: vendor,
            restaurants,
        })
    }

    pub async fn sign_out(&self) -> ClientResult<()> {
        self.auth.sign_out().await?;
        tracing::info!("Vendor signed out");
        Ok(())
    }

    pub async fn current_user(&self) -> ClientResult<AuthUser> {
        self.auth
            .current_user()
            .await?
            .ok_or(ClientError::Unauthorized)
    }

    /// Re-attach a persisted token; `None` when the service no longer
    /// accepts it
    pub async fn restore_session(&self, access_token: &str) -> ClientResult<Option<AuthUser>> {
        let user = self.auth.restore_session(access_token).await?;
        match &user {
            Some(user) => tracing::info!(user_id = %user.id, "Session restored"),
            None => tracing::info!("Stored session no longer valid"),
        }
        Ok(user)
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.auth.session()
    }

    async fn fetch_user(&self, user_id: &str) -> ClientResult<VendorUser> {
        let query = Select::from("users")
            .columns(&["id", "name", "phone", "email", "user_type_id"])
            .eq("id", user_id)
            .limit(1);
        decode_rows::<VendorUser>(self.data.select(&query).await?)?
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::NotFound(format!("user {user_id}")))
    }
}
