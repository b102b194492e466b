//! RealtimeFeed actor: the WebSocket client to the hosted realtime service.
//!
//! Joins one channel per topic the hub asks for, keeps the socket alive with
//! heartbeats and forwards change events to the hub. When the socket drops it
//! reconnects after `reconnect_seconds` and joins every active topic again.

use super::hub::ChangeHub;
use super::message::{AttachFeed, FeedCommand, TableChanged};
use super::protocol::{self, Frame, Inbound};
use super::TableTopic;
use crate::app_config::RealtimeConfig;
use actix::io::{SinkWrite, WriteHandler};
use actix::prelude::*;
use awc::error::WsProtocolError;
use awc::ws;
use futures::{Sink, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

type WsSink = Pin<Box<dyn Sink<ws::Message, Error = WsProtocolError>>>;

#[derive(Clone, Debug)]
pub struct FeedSettings {
    pub url: String,
    pub api_key: String,
    pub schema: String,
    pub heartbeat: Duration,
    pub reconnect: Duration,
}

impl From<&RealtimeConfig> for FeedSettings {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            schema: config.schema.clone(),
            heartbeat: Duration::from_secs(config.heartbeat_seconds.max(1)),
            reconnect: Duration::from_secs(config.reconnect_seconds.max(1)),
        }
    }
}

pub struct RealtimeFeed {
    settings: FeedSettings,
    hub: Addr<ChangeHub>,
    /// Channel name -> topic, for every topic that should be joined.
    channels: HashMap<String, TableTopic>,
    writer: Option<SinkWrite<ws::Message, WsSink>>,
    heartbeat: Option<SpawnHandle>,
    next_ref: u64,
}

impl RealtimeFeed {
    pub fn new(settings: FeedSettings, hub: Addr<ChangeHub>) -> Self {
        Self {
            settings,
            hub,
            channels: HashMap::new(),
            writer: None,
            heartbeat: None,
            next_ref: 0,
        }
    }

    fn socket_url(&self) -> Result<url::Url, url::ParseError> {
        url::Url::parse_with_params(
            &self.settings.url,
            &[("apikey", self.settings.api_key.as_str()), ("vsn", "1.0.0")],
        )
    }

    fn next_ref(&mut self) -> u64 {
        self.next_ref += 1;
        self.next_ref
    }

    fn connect(&mut self, ctx: &mut Context<Self>) {
        let url = match self.socket_url() {
            Ok(url) => url,
            Err(e) => {
                log::error!("Invalid realtime URL {:?}: {}", self.settings.url, e);
                return;
            }
        };

        log::info!("Connecting to realtime service at {}", self.settings.url);

        let fut = async move { awc::Client::new().ws(url.as_str()).connect().await }
            .into_actor(self)
            .map(|res, act, ctx| match res {
                Ok((_response, framed)) => {
                    let (sink, stream) = framed.split();
                    let sink: WsSink = Box::pin(sink);
                    ctx.add_stream(stream);
                    act.writer = Some(SinkWrite::new(sink, ctx));
                    act.start_heartbeat(ctx);
                    act.join_all();
                    log::info!("Realtime connected; {} channels joined", act.channels.len());
                }
                Err(e) => {
                    log::warn!("Realtime connection failed: {}", e);
                    act.schedule_reconnect(ctx);
                }
            });
        ctx.spawn(fut);
    }

    fn schedule_reconnect(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.heartbeat.take() {
            ctx.cancel_future(handle);
        }
        self.writer = None;

        ctx.run_later(self.settings.reconnect, |act, ctx| act.connect(ctx));
    }

    fn start_heartbeat(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.heartbeat.take() {
            ctx.cancel_future(handle);
        }

        self.heartbeat = Some(ctx.run_interval(self.settings.heartbeat, |act, _| {
            let reference = act.next_ref();
            act.send(protocol::heartbeat_frame(reference));
        }));
    }

    /// Writes a frame if connected. Frames sent while disconnected are
    /// dropped; joins are replayed on reconnect.
    fn send(&mut self, frame: Frame) -> bool {
        match self.writer.as_mut() {
            Some(writer) => writer.write(ws::Message::Text(frame.to_text().into())).is_ok(),
            None => false,
        }
    }

    fn join(&mut self, topic: &TableTopic) {
        let reference = self.next_ref();
        let frame = protocol::join_frame(
            topic,
            &self.settings.schema,
            &self.settings.api_key,
            reference,
        );
        if self.send(frame) {
            log::debug!("Joining realtime channel for {}", topic);
        }
    }

    fn join_all(&mut self) {
        let topics: Vec<TableTopic> = self.channels.values().cloned().collect();
        for topic in &topics {
            self.join(topic);
        }
    }

    fn handle_text(&mut self, text: &str, ctx: &mut Context<Self>) {
        let inbound = match protocol::parse(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                log::warn!("Unreadable realtime frame: {}", e);
                return;
            }
        };

        match inbound {
            Inbound::Change { channel, change } => match self.channels.get(&channel) {
                Some(topic) => self.hub.do_send(TableChanged {
                    topic: topic.clone(),
                    change,
                }),
                None => log::debug!("Change on unknown channel {}", channel),
            },
            Inbound::JoinReply { channel, ok } => {
                if !ok {
                    log::error!("Realtime service refused channel {}", channel);
                }
            }
            Inbound::ChannelLost { channel } => {
                if let Some(topic) = self.channels.get(&channel).cloned() {
                    log::warn!("Realtime channel {} lost; rejoining", channel);
                    ctx.run_later(self.settings.reconnect, move |act, _| {
                        if act.channels.contains_key(&topic.channel_name()) {
                            act.join(&topic);
                        }
                    });
                }
            }
            Inbound::HeartbeatReply | Inbound::Other => {}
        }
    }
}

impl Actor for RealtimeFeed {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hub.do_send(AttachFeed(ctx.address().recipient()));
        self.connect(ctx);
    }
}

impl Handler<FeedCommand> for RealtimeFeed {
    type Result = ();

    fn handle(&mut self, msg: FeedCommand, _: &mut Context<Self>) {
        match msg {
            FeedCommand::Join(topic) => {
                let name = topic.channel_name();
                if !self.channels.contains_key(&name) {
                    self.join(&topic);
                    self.channels.insert(name, topic);
                }
            }
            FeedCommand::Leave(topic) => {
                if self.channels.remove(&topic.channel_name()).is_some() {
                    let reference = self.next_ref();
                    self.send(protocol::leave_frame(&topic, reference));
                }
            }
        }
    }
}

impl StreamHandler<Result<ws::Frame, WsProtocolError>> for RealtimeFeed {
    fn handle(&mut self, msg: Result<ws::Frame, WsProtocolError>, ctx: &mut Context<Self>) {
        match msg {
            Ok(ws::Frame::Text(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => self.handle_text(text, ctx),
                Err(_) => log::warn!("Realtime frame is not UTF-8"),
            },
            Ok(ws::Frame::Ping(data)) => {
                if let Some(writer) = self.writer.as_mut() {
                    let _ = writer.write(ws::Message::Pong(data));
                }
            }
            Ok(ws::Frame::Close(reason)) => {
                log::warn!("Realtime service closed the socket: {:?}", reason);
            }
            Ok(_) => {}
            Err(e) => log::warn!("Realtime socket error: {}", e),
        }
    }

    fn finished(&mut self, ctx: &mut Context<Self>) {
        log::warn!(
            "Realtime socket ended; reconnecting in {}s",
            self.settings.reconnect.as_secs()
        );
        self.schedule_reconnect(ctx);
    }
}

impl WriteHandler<WsProtocolError> for RealtimeFeed {
    fn error(&mut self, err: WsProtocolError, _: &mut Context<Self>) -> Running {
        log::warn!("Realtime write failed: {}", err);
        Running::Continue
    }
}
