//! Live views over WebSocket
//!
//! ## Protocol
//!
//! 1. Client connects to `/admin/live.ws`
//! 2. Client sends `{"watch": "<view>", ...filters}`; the server subscribes
//!    the connection to the view's tables and pushes a full snapshot
//! 3. Every change on one of those tables pushes a fresh snapshot. The
//!    dashboard instead pushes only the badges the change touched, marked
//!    `"partial": true`; the client merges them by badge
//! 4. `{"unwatch": "<view>"}` or closing the socket releases the subscriptions
//!
//! Snapshots are sent as `{"view": "<view>", "data": ...}`, failures as
//! `{"view": "<view>", "error": "..."}`. Changes that arrive while a view is
//! loading are batched into one more load after it.

pub mod connection;

use crate::middleware::AdminCtx;
use crate::realtime::ChangeHub;
use crate::views::{ViewContext, ViewRequest};
use actix::Addr;
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use std::time::Duration;

pub use connection::LiveConnection;

/// Heartbeat interval - send ping every 5 seconds
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Client timeout - disconnect if no response for 30 seconds
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

pub fn configure(conf: &mut web::ServiceConfig) {
    conf.service(live_ws);
}

/// Commands a live client can send.
#[derive(Debug)]
pub enum ClientMessage {
    Watch(ViewRequest),
    Unwatch(String),
    Ping,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let text = text.trim();
        if text == "ping" {
            return Ok(ClientMessage::Ping);
        }

        let value: serde_json::Value = serde_json::from_str(text)?;
        if let Some(name) = value.get("unwatch").and_then(|v| v.as_str()) {
            return Ok(ClientMessage::Unwatch(name.to_string()));
        }
        serde_json::from_value(value).map(ClientMessage::Watch)
    }
}

#[get("/admin/live.ws")]
pub async fn live_ws(
    req: HttpRequest,
    stream: web::Payload,
    admin: AdminCtx,
    hub: web::Data<Addr<ChangeHub>>,
    views: web::Data<ViewContext>,
) -> Result<HttpResponse, Error> {
    let admin = admin.require_admin()?;
    log::debug!("Admin {} connecting to live views", admin.username);

    let connection = LiveConnection::new(hub.get_ref().clone(), views.get_ref().clone());
    ws::start(connection, &req, stream)
}
