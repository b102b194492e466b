//! Realtime change subscriptions.
//!
//! ## Architecture
//!
//! - `RealtimeFeed` actor holds one WebSocket to the hosted realtime service and
//!   joins a channel per watched table.
//! - `ChangeHub` actor keeps the subscriptions of this server. Every change on a
//!   table sends one `Refresh` to each subscriber of that table.
//! - Subscribers react to `Refresh` by re-fetching what the change made
//!   stale: a whole list, or the touched dashboard badges.
//!
//! There is no shared cache: two subscribers on the same table both re-fetch.

pub mod feed;
pub mod hub;
pub mod message;
pub mod protocol;
pub mod scope;

pub use feed::RealtimeFeed;
pub use hub::ChangeHub;
pub use message::{ChangeType, Refresh, Subscribe, TableChanged, Unsubscribe};
pub use scope::ViewScope;

use serde::{Deserialize, Serialize};

/// A table, optionally narrowed by a column predicate such as
/// `is_blocked=eq.true`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableTopic {
    pub table: String,
    pub filter: Option<String>,
}

impl TableTopic {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            filter: None,
        }
    }

    pub fn filtered(table: &str, filter: &str) -> Self {
        Self {
            table: table.to_string(),
            filter: Some(filter.to_string()),
        }
    }

    /// Channel name used when joining this topic on the realtime socket.
    pub fn channel_name(&self) -> String {
        match &self.filter {
            Some(filter) => format!("realtime:{}:{}", self.table, filter),
            None => format!("realtime:{}", self.table),
        }
    }
}

impl std::fmt::Display for TableTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.filter {
            Some(filter) => write!(f, "{}[{}]", self.table, filter),
            None => f.write_str(&self.table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filtered_topics_get_their_own_channel() {
        let all = TableTopic::table("users");
        let blocked = TableTopic::filtered("users", "is_blocked=eq.true");
        assert_eq!(all.channel_name(), "realtime:users");
        assert_eq!(blocked.channel_name(), "realtime:users:is_blocked=eq.true");
        assert_ne!(all, blocked);
    }
}
