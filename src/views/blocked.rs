//! Blocked users.

use super::{any_contains, needle, ViewListing};
use crate::error::ActionError;
use crate::orm::users;
use crate::realtime::TableTopic;
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BlockedFilter {
    pub search: String,
    /// Only blocks without an end date.
    pub permanent_only: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlockedRow {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub block_reason: Option<String>,
    pub blocked_until: Option<DateTime<Utc>>,
    /// The block has an end date and it has passed.
    pub lapsed: bool,
}

impl BlockedRow {
    pub fn from_user(user: users::Model, now: DateTime<Utc>) -> Self {
        let blocked_until = user.blocked_until.map(|t| t.with_timezone(&Utc));
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            block_reason: user.block_reason,
            lapsed: blocked_until.map(|t| t <= now).unwrap_or(false),
            blocked_until,
        }
    }

    pub fn matches(&self, filter: &BlockedFilter) -> bool {
        if filter.permanent_only && self.blocked_until.is_some() {
            return false;
        }
        match needle(&filter.search) {
            Some(n) => any_contains(
                &n,
                [
                    Some(self.email.as_str()),
                    self.full_name.as_deref(),
                    self.block_reason.as_deref(),
                ],
            ),
            None => true,
        }
    }
}

pub fn topics() -> Vec<TableTopic> {
    vec![TableTopic::filtered("users", "is_blocked=eq.true")]
}

pub async fn load(
    db: &DatabaseConnection,
    filter: &BlockedFilter,
    limit: u64,
) -> Result<ViewListing<BlockedRow>, ActionError> {
    let now = Utc::now();
    let rows = users::Entity::find()
        .filter(users::Column::IsBlocked.eq(true))
        .order_by_desc(users::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?
        .into_iter()
        .map(|u| BlockedRow::from_user(u, now))
        .collect();

    Ok(ViewListing::filtered(rows, |r| r.matches(filter)))
}
