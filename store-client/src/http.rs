// store-client/src/http.rs
// HTTP service for the hosted auth and data APIs

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::query::{Select, Update};
use crate::service::{AuthService, AuthSession, AuthUser, DataService};
use crate::{ClientConfig, ClientError, ClientResult};

/// Error body shapes used by the hosted service
#[derive(Deserialize, Default)]
struct ApiErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiErrorResponse {
    fn text(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
    }
}

/// Password-grant response
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

/// Network service speaking the hosted auth (`/auth/v1`) and data
/// (`/rest/v1`) APIs
#[derive(Debug)]
pub struct HttpService {
    client: Client,
    config: ClientConfig,
    session: RwLock<Option<AuthSession>>,
}

impl HttpService {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
            session: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn access_token(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.access_token.clone())
    }

    /// Every request carries the API key; the bearer is the user token when
    /// signed in and the API key otherwise.
    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .access_token()
            .unwrap_or_else(|| self.config.api_key.clone());
        req.header("apikey", &self.config.api_key)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", bearer))
    }

    async fn error_from(response: reqwest::Response) -> ClientError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorResponse>(&text)
            .ok()
            .and_then(ApiErrorResponse::text)
            .unwrap_or(text);

        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
            StatusCode::FORBIDDEN => ClientError::Forbidden(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::Validation(message)
            }
            _ => ClientError::Service {
                status: status.as_u16(),
                message,
            },
        }
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> ClientResult<T> {
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ClientError::InvalidResponse(format!("{e}: {text}")))
    }

    fn store_session(&self, token: TokenResponse) -> AuthSession {
        let expires_at = token.expires_at.or_else(|| {
            token
                .expires_in
                .map(|secs| chrono::Utc::now().timestamp() + secs)
        });
        let session = AuthSession {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user,
        };
        *self.session.write() = Some(session.clone());
        session
    }
}

#[async_trait]
impl AuthService for HttpService {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> ClientResult<AuthSession> {
        let url = self.config.auth_url("token?grant_type=password");
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                tracing::debug!(status = %response.status(), "Password grant rejected");
                Err(ClientError::InvalidCredentials)
            }
            _ => {
                let token: TokenResponse = self.handle_response(response).await?;
                Ok(self.store_session(token))
            }
        }
    }

    async fn sign_out(&self) -> ClientResult<()> {
        let Some(token) = self.session.write().take().map(|s| s.access_token) else {
            return Ok(());
        };
        let response = self
            .client
            .post(self.config.auth_url("logout"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(token)
            .send()
            .await?;

        // An already revoked token is as good as a successful logout
        if response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn current_user(&self) -> ClientResult<Option<AuthUser>> {
        if self.access_token().is_none() {
            return Ok(None);
        }
        let response = self
            .authorize(self.client.get(self.config.auth_url("user")))
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.session.write().take();
            return Ok(None);
        }
        let user: AuthUser = self.handle_response(response).await?;
        Ok(Some(user))
    }

    async fn restore_session(&self, access_token: &str) -> ClientResult<Option<AuthUser>> {
        *self.session.write() = Some(AuthSession {
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_at: None,
            user: AuthUser {
                id: String::new(),
                email: None,
            },
        });
        let user = self.current_user().await?;
        if let Some(user) = &user {
            if let Some(session) = self.session.write().as_mut() {
                session.user = user.clone();
            }
        }
        Ok(user)
    }

    fn session(&self) -> Option<AuthSession> {
        self.session.read().clone()
    }
}

#[async_trait]
impl DataService for HttpService {
    async fn select(&self, query: &Select) -> ClientResult<Vec<Value>> {
        let url = self.config.rest_url(&query.table);
        let response = self
            .authorize(self.client.get(&url).query(&query.to_query_pairs()))
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn insert(&self, table: &str, row: Value) -> ClientResult<Vec<Value>> {
        let url = self.config.rest_url(table);
        let response = self
            .authorize(self.client.post(&url).json(&row))
            .header("Prefer", "return=representation")
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn update(&self, update: &Update) -> ClientResult<Vec<Value>> {
        let url = self.config.rest_url(&update.table);
        let response = self
            .authorize(
                self.client
                    .patch(&url)
                    .query(&update.to_query_pairs())
                    .json(&update.values),
            )
            .header("Prefer", "return=representation")
            .send()
            .await?;
        self.handle_response(response).await
    }
}
