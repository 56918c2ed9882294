//! Change-feed types
//!
//! A change feed pushes row insertions and updates of one table, narrowed by
//! an equality filter on one column (`restaurant_id=eq.<id>`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Row change kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Insert,
    Update,
}

impl ChangeKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope of one change-feed subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFilter {
    pub schema: String,
    pub table: String,
    pub kind: ChangeKind,
    /// Column compared for equality
    pub column: String,
    pub value: String,
}

impl ChangeFilter {
    /// `orders` changes of one restaurant
    pub fn restaurant_orders(kind: ChangeKind, restaurant_id: &str) -> Self {
        Self {
            schema: "public".to_string(),
            table: "orders".to_string(),
            kind,
            column: "restaurant_id".to_string(),
            value: restaurant_id.to_string(),
        }
    }

    /// Filter expression in the hosted service syntax
    pub fn expression(&self) -> String {
        format!("{}=eq.{}", self.column, self.value)
    }

    /// Channel topic name, unique per kind and scope
    pub fn topic(&self) -> String {
        match self.kind {
            ChangeKind::Insert => format!("{}-{}-{}", self.table, self.column, self.value),
            ChangeKind::Update => format!("{}-updates-{}-{}", self.table, self.column, self.value),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.kind != self.kind || event.table != self.table || event.schema != self.schema {
            return false;
        }
        match event.record.get(&self.column) {
            Some(Value::String(s)) => s == &self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// One pushed row change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub schema: String,
    pub table: String,
    /// Row after the change
    pub record: Map<String, Value>,
    #[serde(default)]
    pub old_record: Option<Map<String, Value>>,
    #[serde(default)]
    pub commit_timestamp: Option<DateTime<Utc>>,
}

impl ChangeEvent {
    pub fn record_id(&self) -> Option<&str> {
        self.record.get("id").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(kind: ChangeKind, restaurant: Value) -> ChangeEvent {
        let record = json!({ "id": "o-1", "restaurant_id": restaurant });
        ChangeEvent {
            kind,
            schema: "public".into(),
            table: "orders".into(),
            record: record.as_object().cloned().unwrap(),
            old_record: None,
            commit_timestamp: None,
        }
    }

    #[test]
    fn test_filter_expression() {
        let filter = ChangeFilter::restaurant_orders(ChangeKind::Insert, "R1");
        assert_eq!(filter.expression(), "restaurant_id=eq.R1");
        assert_ne!(
            filter.topic(),
            ChangeFilter::restaurant_orders(ChangeKind::Update, "R1").topic()
        );
    }

    #[test]
    fn test_filter_matches_kind_and_scope() {
        let filter = ChangeFilter::restaurant_orders(ChangeKind::Insert, "R1");
        assert!(filter.matches(&event(ChangeKind::Insert, json!("R1"))));
        assert!(!filter.matches(&event(ChangeKind::Update, json!("R1"))));
        assert!(!filter.matches(&event(ChangeKind::Insert, json!("R2"))));
        assert!(!filter.matches(&event(ChangeKind::Insert, Value::Null)));
    }

    #[test]
    fn test_numeric_scope() {
        let filter = ChangeFilter::restaurant_orders(ChangeKind::Update, "7");
        assert!(filter.matches(&event(ChangeKind::Update, json!(7))));
    }
}
