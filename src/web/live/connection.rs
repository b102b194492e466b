//! WebSocket connection actor for live view clients

use super::{ClientMessage, CLIENT_TIMEOUT, HEARTBEAT_INTERVAL};
use crate::realtime::{ChangeHub, Refresh, Subscribe, Unsubscribe, ViewScope};
use crate::views::{Reload, ViewContext, ViewRequest};
use actix::*;
use actix_web_actors::ws;
use std::collections::HashMap;
use std::time::Instant;

struct Watch {
    request: ViewRequest,
    /// Distinguishes this watch from an earlier one of the same view.
    generation: u64,
    subscriptions: Vec<usize>,
    /// A fetch is in flight. At most one runs per watch, so pushes reach the
    /// client in the order the fetches started.
    loading: bool,
    /// Changes seen while loading, fetched once the running load lands.
    queued: Option<Reload>,
}

/// One admin UI tab. Owns the subscriptions and in-flight fetches of the
/// views it watches; all of them end with the socket.
pub struct LiveConnection {
    hb: Instant,
    hub: Addr<ChangeHub>,
    views: ViewContext,
    scope: ViewScope,
    watches: HashMap<&'static str, Watch>,
    /// Subscription id to view name.
    routes: HashMap<usize, &'static str>,
    next_generation: u64,
}

impl LiveConnection {
    pub fn new(hub: Addr<ChangeHub>, views: ViewContext) -> Self {
        Self {
            hb: Instant::now(),
            hub,
            views,
            scope: ViewScope::new(),
            watches: HashMap::new(),
            routes: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Start heartbeat process
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                log::debug!("Live connection timed out");
                ctx.stop();
                return;
            }

            ctx.ping(b"");
        });
    }

    fn watch(&mut self, request: ViewRequest, ctx: &mut ws::WebsocketContext<Self>) {
        let name = request.name();
        self.unwatch(name);

        self.next_generation += 1;
        let generation = self.next_generation;
        let topics = request.topics();
        self.watches.insert(
            name,
            Watch {
                request,
                generation,
                subscriptions: Vec::new(),
                loading: false,
                queued: None,
            },
        );

        for topic in topics {
            self.hub
                .send(Subscribe {
                    topic,
                    subscriber: ctx.address().recipient(),
                })
                .into_actor(self)
                .then(move |res, act, _| {
                    match res {
                        Ok(id) => match act.watches.get_mut(name) {
                            Some(watch) if watch.generation == generation => {
                                watch.subscriptions.push(id);
                                act.routes.insert(id, name);
                            }
                            // Unwatched or replaced while subscribing.
                            _ => act.hub.do_send(Unsubscribe { id }),
                        },
                        Err(err) => {
                            log::warn!("Failed to subscribe live view {}: {:?}", name, err);
                        }
                    }
                    fut::ready(())
                })
                .spawn(ctx);
        }

        self.push(name, Reload::Full, ctx);
    }

    fn unwatch(&mut self, name: &str) {
        if let Some(watch) = self.watches.remove(name) {
            for id in watch.subscriptions {
                self.routes.remove(&id);
                self.hub.do_send(Unsubscribe { id });
            }
        }
    }

    /// Loads what `reload` names and sends it, unless the view was unwatched
    /// or the connection closed in the meantime. While a load runs, further
    /// reloads are merged and fetched after it, so a slow early fetch can
    /// never overwrite a later one.
    fn push(&mut self, name: &'static str, reload: Reload, ctx: &mut ws::WebsocketContext<Self>) {
        let watch = match self.watches.get_mut(name) {
            Some(watch) => watch,
            None => return,
        };
        if watch.loading {
            watch.queued = Some(match watch.queued.take() {
                Some(queued) => queued.merge(reload),
                None => reload,
            });
            return;
        }
        watch.loading = true;

        let request = watch.request.clone();
        let generation = watch.generation;
        let views = self.views.clone();
        let scope = self.scope.clone();
        let partial = reload != Reload::Full;

        async move { scope.run(request.load(&views, &reload)).await }
            .into_actor(self)
            .map(move |res, act, ctx| {
                let watch = match act.watches.get_mut(name) {
                    Some(watch) if watch.generation == generation => watch,
                    _ => return,
                };
                watch.loading = false;
                let next = watch.queued.take();

                match res {
                    Some(Ok(data)) => {
                        let mut frame = serde_json::json!({ "view": name, "data": data });
                        if partial {
                            frame["partial"] = serde_json::Value::Bool(true);
                        }
                        ctx.text(frame.to_string());
                    }
                    Some(Err(e)) => {
                        log::error!("Live view {} failed to load: {}", name, e);
                        ctx.text(
                            serde_json::json!({ "view": name, "error": e.user_message() })
                                .to_string(),
                        )
                    }
                    None => return,
                }

                if let Some(next) = next {
                    act.push(name, next, ctx);
                }
            })
            .spawn(ctx);
    }
}

impl Actor for LiveConnection {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.scope.dispose();
        let names: Vec<&'static str> = self.watches.keys().copied().collect();
        for name in names {
            self.unwatch(name);
        }
        Running::Stop
    }
}

/// A watched table changed: reload the view that owns the subscription.
impl Handler<Refresh> for LiveConnection {
    type Result = ();

    fn handle(&mut self, msg: Refresh, ctx: &mut Self::Context) {
        if let Some(name) = self.routes.get(&msg.subscription).copied() {
            log::debug!("{:?} on {} refreshes live view {}", msg.change, msg.topic, name);
            let reload = match self.watches.get(name) {
                Some(watch) => watch.request.reload_for(&msg.topic),
                None => return,
            };
            self.push(name, reload, ctx);
        }
    }
}

/// Handle incoming WebSocket messages
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for LiveConnection {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match msg {
            Err(_) => {
                ctx.stop();
                return;
            }
            Ok(msg) => msg,
        };

        match msg {
            ws::Message::Ping(data) => {
                self.hb = Instant::now();
                ctx.pong(&data);
            }
            ws::Message::Pong(_) => {
                self.hb = Instant::now();
            }
            ws::Message::Text(text) => match ClientMessage::parse(&text) {
                Ok(ClientMessage::Watch(request)) => self.watch(request, ctx),
                Ok(ClientMessage::Unwatch(name)) => self.unwatch(&name),
                Ok(ClientMessage::Ping) => ctx.text(r#"{"type":"pong"}"#),
                Err(e) => {
                    log::debug!("Ignoring malformed live message: {}", e);
                    ctx.text(
                        serde_json::json!({ "error": "Unrecognized message." }).to_string(),
                    );
                }
            },
            ws::Message::Binary(_) => {}
            ws::Message::Close(reason) => {
                log::debug!("Live client disconnecting: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            _ => {}
        }
    }
}
