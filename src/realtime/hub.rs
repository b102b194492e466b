//! ChangeHub actor: subscription registry and fan-out.

use super::message::{
    AttachFeed, FeedCommand, Refresh, Subscribe, SubscriberCount, TableChanged, Unsubscribe,
};
use super::TableTopic;
use actix::prelude::*;
use std::collections::{HashMap, HashSet};

struct Subscription {
    topic: TableTopic,
    recipient: Recipient<Refresh>,
}

pub struct ChangeHub {
    next_id: usize,
    /// Subscription id -> subscription
    subscriptions: HashMap<usize, Subscription>,
    /// Topic -> subscription ids
    topics: HashMap<TableTopic, HashSet<usize>>,
    feed: Option<Recipient<FeedCommand>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        log::info!("ChangeHub starting up.");
        Self {
            next_id: 0,
            subscriptions: HashMap::new(),
            topics: HashMap::new(),
            feed: None,
        }
    }

    fn tell_feed(&self, command: FeedCommand) {
        if let Some(feed) = &self.feed {
            feed.do_send(command);
        }
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Actor for ChangeHub {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        ctx.set_mailbox_capacity(256);
    }
}

impl Handler<Subscribe> for ChangeHub {
    type Result = usize;

    fn handle(&mut self, msg: Subscribe, _: &mut Context<Self>) -> Self::Result {
        let id = self.next_id;
        self.next_id += 1;

        let ids = self.topics.entry(msg.topic.clone()).or_default();
        let first = ids.is_empty();
        ids.insert(id);

        if first {
            self.tell_feed(FeedCommand::Join(msg.topic.clone()));
        }

        log::debug!("Subscription {} on {}", id, msg.topic);
        self.subscriptions.insert(
            id,
            Subscription {
                topic: msg.topic,
                recipient: msg.subscriber,
            },
        );

        id
    }
}

impl Handler<Unsubscribe> for ChangeHub {
    type Result = ();

    fn handle(&mut self, msg: Unsubscribe, _: &mut Context<Self>) {
        let sub = match self.subscriptions.remove(&msg.id) {
            Some(sub) => sub,
            None => return,
        };

        let now_empty = match self.topics.get_mut(&sub.topic) {
            Some(ids) => {
                ids.remove(&msg.id);
                ids.is_empty()
            }
            None => false,
        };

        if now_empty {
            self.topics.remove(&sub.topic);
            self.tell_feed(FeedCommand::Leave(sub.topic.clone()));
        }

        log::debug!("Subscription {} on {} released", msg.id, sub.topic);
    }
}

impl Handler<TableChanged> for ChangeHub {
    type Result = usize;

    fn handle(&mut self, msg: TableChanged, _: &mut Context<Self>) -> Self::Result {
        let ids = match self.topics.get(&msg.topic) {
            Some(ids) => ids,
            None => return 0,
        };

        let mut sent = 0;
        for id in ids {
            if let Some(sub) = self.subscriptions.get(id) {
                sub.recipient.do_send(Refresh {
                    subscription: *id,
                    topic: msg.topic.clone(),
                    change: msg.change,
                });
                sent += 1;
            }
        }

        log::debug!("{:?} on {} -> {} refreshes", msg.change, msg.topic, sent);
        sent
    }
}

impl Handler<AttachFeed> for ChangeHub {
    type Result = ();

    fn handle(&mut self, msg: AttachFeed, _: &mut Context<Self>) {
        // A feed attached late still has to serve topics subscribed before it.
        for topic in self.topics.keys() {
            msg.0.do_send(FeedCommand::Join(topic.clone()));
        }
        self.feed = Some(msg.0);
    }
}

impl Handler<SubscriberCount> for ChangeHub {
    type Result = usize;

    fn handle(&mut self, msg: SubscriberCount, _: &mut Context<Self>) -> Self::Result {
        self.topics.get(&msg.0).map(HashSet::len).unwrap_or(0)
    }
}

impl Supervised for ChangeHub {
    fn restarting(&mut self, _: &mut Context<ChangeHub>) {
        log::warn!("Restarting the ChangeHub.");
    }
}
