//! Phoenix channel frames spoken by the hosted realtime service.
//!
//! Every frame is a JSON object `{topic, event, payload, ref}`. Change events
//! arrive as `postgres_changes` with the row change under `payload.data`;
//! older servers send the change type as the event name instead.

use super::message::ChangeType;
use super::TableTopic;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const PHOENIX_TOPIC: &str = "phoenix";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl Frame {
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// What a received frame means to the feed.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    /// A row on the channel's table changed.
    Change { channel: String, change: ChangeType },
    JoinReply { channel: String, ok: bool },
    /// The server closed or errored the channel; it has to be joined again.
    ChannelLost { channel: String },
    HeartbeatReply,
    Other,
}

pub fn join_frame(topic: &TableTopic, schema: &str, access_token: &str, reference: u64) -> Frame {
    let mut change = json!({
        "event": "*",
        "schema": schema,
        "table": topic.table,
    });
    if let Some(filter) = &topic.filter {
        change["filter"] = Value::String(filter.clone());
    }

    Frame {
        topic: topic.channel_name(),
        event: "phx_join".to_string(),
        payload: json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [change],
            },
            "access_token": access_token,
        }),
        reference: Some(reference.to_string()),
    }
}

pub fn leave_frame(topic: &TableTopic, reference: u64) -> Frame {
    Frame {
        topic: topic.channel_name(),
        event: "phx_leave".to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

pub fn heartbeat_frame(reference: u64) -> Frame {
    Frame {
        topic: PHOENIX_TOPIC.to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

pub fn parse(text: &str) -> Result<Inbound, serde_json::Error> {
    let frame: Frame = serde_json::from_str(text)?;
    Ok(classify(frame))
}

fn classify(frame: Frame) -> Inbound {
    match frame.event.as_str() {
        "postgres_changes" => {
            let kind = frame
                .payload
                .pointer("/data/type")
                .and_then(Value::as_str)
                .and_then(ChangeType::parse);
            match kind {
                Some(change) => Inbound::Change {
                    channel: frame.topic,
                    change,
                },
                None => Inbound::Other,
            }
        }
        "INSERT" | "UPDATE" | "DELETE" => match ChangeType::parse(&frame.event) {
            Some(change) => Inbound::Change {
                channel: frame.topic,
                change,
            },
            None => Inbound::Other,
        },
        "phx_reply" => {
            let ok = frame.payload.get("status").and_then(Value::as_str) == Some("ok");
            if frame.topic == PHOENIX_TOPIC {
                Inbound::HeartbeatReply
            } else {
                Inbound::JoinReply {
                    channel: frame.topic,
                    ok,
                }
            }
        }
        "phx_close" | "phx_error" => Inbound::ChannelLost {
            channel: frame.topic,
        },
        _ => Inbound::Other,
    }
}
