//! User-facing alerts
//!
//! The dashboard and login flow never print; they push [`Alert`]s into a
//! channel and the front end decides how to show them.

use shared::ErrorCode;
use store_client::ClientError;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    NewOrder,
    Info,
    Warning,
    Error,
    /// Nothing else can be done in this session
    Blocking,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub code: Option<ErrorCode>,
}

impl Alert {
    pub fn new(kind: AlertKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            code: None,
        }
    }

    /// "New order A123" / "Total: 15.50"
    pub fn new_order(code: &str, amount: f64) -> Self {
        Self::new(
            AlertKind::NewOrder,
            format!("New order {code}"),
            format!("Total: {amount:.2}"),
        )
    }

    pub fn error(title: impl Into<String>, err: &ClientError) -> Self {
        Self {
            code: Some(err.code()),
            ..Self::new(AlertKind::Error, title, err.user_message())
        }
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{}: {} [{}]", self.title, self.message, code),
            None => write!(f, "{}: {}", self.title, self.message),
        }
    }
}

/// Cloneable sending side; sending never blocks and never fails the caller
#[derive(Debug, Clone)]
pub struct AlertSender {
    tx: mpsc::UnboundedSender<Alert>,
}

impl AlertSender {
    pub fn send(&self, alert: Alert) {
        tracing::debug!(kind = ?alert.kind, title = %alert.title, "Alert raised");
        if self.tx.send(alert).is_err() {
            tracing::debug!("Alert dropped, no receiver");
        }
    }
}

pub fn channel() -> (AlertSender, mpsc::UnboundedReceiver<Alert>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (AlertSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_order_alert() {
        let alert = Alert::new_order("A123", 15.5);
        assert_eq!(alert.title, "New order A123");
        assert_eq!(alert.message, "Total: 15.50");
        assert_eq!(alert.kind, AlertKind::NewOrder);
    }

    #[test]
    fn test_error_alert_uses_fallback() {
        let alert = Alert::error("Accept failed", &ClientError::Internal("boom".into()));
        assert_eq!(alert.message, "Something went wrong");
        assert_eq!(alert.code, Some(ErrorCode::InternalError));
        assert_eq!(alert.to_string(), "Accept failed: Something went wrong [9001]");
    }

    #[tokio::test]
    async fn test_send_without_receiver_is_silent() {
        let (tx, rx) = channel();
        drop(rx);
        tx.send(Alert::new(AlertKind::Info, "t", "m"));
    }
}
