//! Chat message monitor.

use super::{any_contains, load_people, needle, person, person_matches, ViewListing};
use crate::error::ActionError;
use crate::moderation::report::Person;
use crate::orm::messages;
use crate::realtime::TableTopic;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChatFilter {
    pub search: String,
    /// Only messages sent or received by this user.
    pub participant: Option<Uuid>,
    pub listing_id: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRow {
    pub id: Uuid,
    pub sender: Person,
    pub receiver: Person,
    pub listing_id: Option<Uuid>,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatRow {
    pub fn matches(&self, search: &str) -> bool {
        match needle(search) {
            Some(n) => {
                any_contains(&n, [Some(self.content.as_str())])
                    || person_matches(&self.sender, &n)
                    || person_matches(&self.receiver, &n)
            }
            None => true,
        }
    }
}

pub fn topics() -> Vec<TableTopic> {
    vec![TableTopic::table("messages")]
}

pub async fn load(
    db: &DatabaseConnection,
    filter: &ChatFilter,
    limit: u64,
) -> Result<ViewListing<ChatRow>, ActionError> {
    let mut query = messages::Entity::find();
    if let Some(user_id) = filter.participant {
        query = query.filter(
            Condition::any()
                .add(messages::Column::SenderId.eq(user_id))
                .add(messages::Column::ReceiverId.eq(user_id)),
        );
    }
    if let Some(listing_id) = filter.listing_id {
        query = query.filter(messages::Column::ListingId.eq(listing_id));
    }

    let found = query
        .order_by_desc(messages::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?;
    let people = load_people(db, found.iter().flat_map(|m| [m.sender_id, m.receiver_id])).await?;

    let rows = found
        .into_iter()
        .map(|m| ChatRow {
            id: m.id,
            sender: person(&people, m.sender_id),
            receiver: person(&people, m.receiver_id),
            listing_id: m.listing_id,
            content: m.content,
            is_read: m.is_read,
            created_at: m.created_at.with_timezone(&Utc),
        })
        .collect();

    Ok(ViewListing::filtered(rows, |r| r.matches(&filter.search)))
}
