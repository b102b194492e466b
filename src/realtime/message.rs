//! Messages exchanged between the realtime actors and their subscribers.

use super::TableTopic;
use actix::prelude::*;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

impl ChangeType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "INSERT" => Some(ChangeType::Insert),
            "UPDATE" => Some(ChangeType::Update),
            "DELETE" => Some(ChangeType::Delete),
            _ => None,
        }
    }
}

/// Sent to a subscriber when its topic changed. The subscriber re-fetches.
#[derive(Clone, Debug)]
pub struct Refresh {
    pub subscription: usize,
    pub topic: TableTopic,
    pub change: ChangeType,
}

impl Message for Refresh {
    type Result = ();
}

/// Register interest in a topic.
pub struct Subscribe {
    pub topic: TableTopic,
    pub subscriber: Recipient<Refresh>,
}

impl Message for Subscribe {
    /// Returns the subscription id
    type Result = usize;
}

pub struct Unsubscribe {
    pub id: usize,
}

impl Message for Unsubscribe {
    type Result = ();
}

/// A change reported by the realtime service.
#[derive(Clone, Debug)]
pub struct TableChanged {
    pub topic: TableTopic,
    pub change: ChangeType,
}

impl Message for TableChanged {
    /// Returns how many subscribers were told to refresh
    type Result = usize;
}

/// Channel membership requests from the hub to the feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedCommand {
    Join(TableTopic),
    Leave(TableTopic),
}

impl Message for FeedCommand {
    type Result = ();
}

/// Connects the hub to the feed that serves its topics.
pub struct AttachFeed(pub Recipient<FeedCommand>);

impl Message for AttachFeed {
    type Result = ();
}

/// Number of live subscriptions on a topic.
pub struct SubscriberCount(pub TableTopic);

impl Message for SubscriberCount {
    type Result = usize;
}
