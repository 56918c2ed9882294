//! Client error types

use shared::{ErrorCode, OrderStatus};
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No session, or the session was rejected
    #[error("No user logged in")]
    Unauthorized,

    /// Email/password rejected by the auth service
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Authenticated account is not a vendor
    #[error("This user is not a vendor")]
    NotVendor,

    /// Permission denied
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// No order row with this id or display code
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transition rejected before reaching the service
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Conditional update matched no row because the stored status moved on
    #[error("Order {order_id} is {actual}, expected {}", join_statuses(.expected))]
    StaleStatus {
        order_id: String,
        expected: Vec<OrderStatus>,
        actual: OrderStatus,
    },

    /// Hosted service answered with an error body
    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// Change feed could not be opened or broke
    #[error("Realtime error: {0}")]
    Realtime(String),

    /// Local file error
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn join_statuses(statuses: &[OrderStatus]) -> String {
    statuses
        .iter()
        .map(OrderStatus::as_str)
        .collect::<Vec<_>>()
        .join("|")
}

impl ClientError {
    /// Stable code for logs and alerts
    pub fn code(&self) -> ErrorCode {
        match self {
            ClientError::Http(_) => ErrorCode::NetworkError,
            ClientError::InvalidResponse(_) => ErrorCode::ServiceError,
            ClientError::Unauthorized => ErrorCode::NotAuthenticated,
            ClientError::InvalidCredentials => ErrorCode::InvalidCredentials,
            ClientError::NotVendor => ErrorCode::NotVendor,
            ClientError::Forbidden(_) => ErrorCode::PermissionDenied,
            ClientError::NotFound(_) => ErrorCode::NotFound,
            ClientError::OrderNotFound(_) => ErrorCode::OrderNotFound,
            ClientError::Validation(_) => ErrorCode::ValidationFailed,
            ClientError::InvalidTransition { .. } => ErrorCode::InvalidStatusTransition,
            ClientError::StaleStatus { .. } => ErrorCode::OrderStatusConflict,
            ClientError::Service { .. } => ErrorCode::ServiceError,
            ClientError::Realtime(_) => ErrorCode::SubscriptionFailed,
            ClientError::Io(_) => ErrorCode::StorageError,
            ClientError::Config(_) => ErrorCode::ConfigError,
            ClientError::Internal(_) => ErrorCode::InternalError,
            ClientError::Serialization(_) => ErrorCode::InternalError,
        }
    }

    /// Message suitable for an alert.
    ///
    /// Service messages are passed through, anything without a message of
    /// its own falls back to a generic text.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Service { message, .. }
            | ClientError::Forbidden(message)
            | ClientError::Validation(message)
                if !message.trim().is_empty() =>
            {
                message.clone()
            }
            ClientError::Unauthorized
            | ClientError::InvalidCredentials
            | ClientError::NotVendor
            | ClientError::InvalidTransition { .. }
            | ClientError::StaleStatus { .. } => self.to_string(),
            ClientError::NotFound(_) => ErrorCode::NotFound.message().to_string(),
            ClientError::OrderNotFound(_) => ErrorCode::OrderNotFound.message().to_string(),
            _ => "Something went wrong".to_string(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Unauthorized | ClientError::InvalidCredentials)
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_status_message() {
        let err = ClientError::StaleStatus {
            order_id: "order-123".into(),
            expected: vec![OrderStatus::Pending, OrderStatus::Accepted],
            actual: OrderStatus::Cancelled,
        };
        assert_eq!(
            err.to_string(),
            "Order order-123 is CANCELLED, expected PENDING|ACCEPTED"
        );
        assert_eq!(err.code(), ErrorCode::OrderStatusConflict);
    }

    #[test]
    fn test_user_message_passes_service_text() {
        let err = ClientError::Service {
            status: 500,
            message: "database unavailable".into(),
        };
        assert_eq!(err.user_message(), "database unavailable");
    }

    #[test]
    fn test_user_message_fallback() {
        let err = ClientError::Service {
            status: 502,
            message: "  ".into(),
        };
        assert_eq!(err.user_message(), "Something went wrong");
        assert_eq!(
            ClientError::Internal("boom".into()).user_message(),
            "Something went wrong"
        );
    }

    #[test]
    fn test_missing_order() {
        let err = ClientError::OrderNotFound("D001".into());
        assert_eq!(err.code(), ErrorCode::OrderNotFound);
        assert_eq!(err.user_message(), "Order not found");
    }

    #[test]
    fn test_auth_messages() {
        assert_eq!(ClientError::Unauthorized.user_message(), "No user logged in");
        assert_eq!(ClientError::NotVendor.user_message(), "This user is not a vendor");
        assert!(ClientError::InvalidCredentials.is_auth());
    }
}
