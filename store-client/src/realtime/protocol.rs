//! Realtime channel frames
//!
//! Every frame is a JSON object `{topic, event, payload, ref}`. A channel is
//! joined with `phx_join`, kept alive with `heartbeat` on the `phoenix`
//! topic, and receives row changes as `postgres_changes`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use shared::{ChangeEvent, ChangeFilter, ChangeKind};

pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_LEAVE: &str = "phx_leave";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_ERROR: &str = "phx_error";
pub const EVENT_CLOSE: &str = "phx_close";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_CHANGES: &str = "postgres_changes";

const PHOENIX_TOPIC: &str = "phoenix";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

/// Channel topic as the server expects it
pub fn channel_topic(filter: &ChangeFilter) -> String {
    format!("realtime:{}", filter.topic())
}

impl Frame {
    pub fn join(filter: &ChangeFilter, access_token: Option<&str>, reference: u64) -> Self {
        let mut payload = json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": filter.kind.as_str(),
                    "schema": filter.schema,
                    "table": filter.table,
                    "filter": filter.expression(),
                }],
            }
        });
        if let (Some(token), Value::Object(map)) = (access_token, &mut payload) {
            map.insert("access_token".into(), Value::String(token.to_string()));
        }
        Self {
            topic: channel_topic(filter),
            event: EVENT_JOIN.into(),
            payload,
            reference: Some(reference.to_string()),
        }
    }

    pub fn leave(topic: &str, reference: u64) -> Self {
        Self {
            topic: topic.to_string(),
            event: EVENT_LEAVE.into(),
            payload: json!({}),
            reference: Some(reference.to_string()),
        }
    }

    pub fn heartbeat(reference: u64) -> Self {
        Self {
            topic: PHOENIX_TOPIC.into(),
            event: EVENT_HEARTBEAT.into(),
            payload: json!({}),
            reference: Some(reference.to_string()),
        }
    }

    pub fn is_reply_to(&self, reference: u64) -> bool {
        self.event == EVENT_REPLY && self.reference.as_deref() == Some(reference.to_string().as_str())
    }

    /// Outcome of a `phx_reply`: `Ok` for status "ok", else the server reason
    pub fn reply_status(&self) -> Result<(), String> {
        match self.payload.get("status").and_then(Value::as_str) {
            Some("ok") => Ok(()),
            _ => Err(self
                .payload
                .get("response")
                .map(|r| {
                    r.get("reason")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| r.to_string())
                })
                .unwrap_or_else(|| "join rejected".to_string())),
        }
    }

    /// Row change carried by a `postgres_changes` frame
    pub fn change_event(&self) -> Option<ChangeEvent> {
        if self.event != EVENT_CHANGES {
            return None;
        }
        let data = self.payload.get("data")?;
        let kind = match data.get("type").and_then(Value::as_str)? {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            _ => return None,
        };
        let record = data.get("record").and_then(Value::as_object).cloned()?;
        let old_record = data
            .get("old_record")
            .and_then(Value::as_object)
            .cloned()
            .filter(|old: &Map<String, Value>| !old.is_empty());
        let commit_timestamp = data
            .get("commit_timestamp")
            .and_then(Value::as_str)
            .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&chrono::Utc));

        Some(ChangeEvent {
            kind,
            schema: data.get("schema").and_then(Value::as_str).unwrap_or("public").to_string(),
            table: data.get("table").and_then(Value::as_str)?.to_string(),
            record,
            old_record,
            commit_timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_frame() {
        let filter = ChangeFilter::restaurant_orders(ChangeKind::Insert, "R1");
        let frame = Frame::join(&filter, Some("jwt"), 1);
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["topic"], "realtime:orders-restaurant_id-R1");
        assert_eq!(value["event"], "phx_join");
        assert_eq!(value["ref"], "1");
        let change = &value["payload"]["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "INSERT");
        assert_eq!(change["filter"], "restaurant_id=eq.R1");
        assert_eq!(value["payload"]["access_token"], "jwt");
    }

    #[test]
    fn test_parse_change() {
        let frame: Frame = serde_json::from_value(json!({
            "topic": "realtime:orders-updates-restaurant_id-R1",
            "event": "postgres_changes",
            "ref": null,
            "payload": {
                "ids": [1],
                "data": {
                    "schema": "public",
                    "table": "orders",
                    "type": "UPDATE",
                    "commit_timestamp": "2024-05-01T12:00:00Z",
                    "record": { "id": "o1", "order_status": "ASSIGNED", "restaurant_id": "R1" },
                    "old_record": { "id": "o1" }
                }
            }
        }))
        .unwrap();

        let event = frame.change_event().unwrap();
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.record_id(), Some("o1"));
        assert!(event.commit_timestamp.is_some());
        assert!(ChangeFilter::restaurant_orders(ChangeKind::Update, "R1").matches(&event));
    }

    #[test]
    fn test_reply_status() {
        let ok: Frame = serde_json::from_value(json!({
            "topic": "t", "event": "phx_reply", "ref": "1",
            "payload": { "status": "ok", "response": {} }
        }))
        .unwrap();
        assert!(ok.is_reply_to(1));
        assert!(ok.reply_status().is_ok());

        let err: Frame = serde_json::from_value(json!({
            "topic": "t", "event": "phx_reply", "ref": "1",
            "payload": { "status": "error", "response": { "reason": "unauthorized" } }
        }))
        .unwrap();
        assert_eq!(err.reply_status(), Err("unauthorized".to_string()));
    }

    #[test]
    fn test_other_events_are_not_changes() {
        assert!(Frame::heartbeat(3).change_event().is_none());
    }
}
