//! Review moderation queue.

use super::{any_contains, load_people, needle, person, person_matches, status_filter, ViewListing};
use crate::error::ActionError;
use crate::moderation::report::Person;
use crate::orm::reviews;
use crate::realtime::TableTopic;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReviewFilter {
    pub search: String,
    pub status: Option<String>,
}

impl Default for ReviewFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: Some("pending".to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReviewRow {
    #[serde(flatten)]
    pub review: reviews::Model,
    pub reviewer: Person,
    pub reviewed_user: Person,
}

impl ReviewRow {
    pub fn matches(&self, search: &str) -> bool {
        match needle(search) {
            Some(n) => {
                any_contains(&n, [self.review.comment.as_deref()])
                    || person_matches(&self.reviewer, &n)
                    || person_matches(&self.reviewed_user, &n)
            }
            None => true,
        }
    }
}

pub fn topics() -> Vec<TableTopic> {
    vec![TableTopic::table("reviews")]
}

pub async fn load(
    db: &DatabaseConnection,
    filter: &ReviewFilter,
    limit: u64,
) -> Result<ViewListing<ReviewRow>, ActionError> {
    let mut query = reviews::Entity::find();
    if let Some(status) = status_filter(&filter.status) {
        query = query.filter(reviews::Column::Status.eq(status));
    }

    let found = query
        .order_by_desc(reviews::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?;

    let people = load_people(
        db,
        found
            .iter()
            .flat_map(|r| [r.reviewer_id, r.reviewed_user_id]),
    )
    .await?;

    let rows = found
        .into_iter()
        .map(|review| ReviewRow {
            reviewer: person(&people, review.reviewer_id),
            reviewed_user: person(&people, review.reviewed_user_id),
            review,
        })
        .collect();

    Ok(ViewListing::filtered(rows, |r| r.matches(&filter.search)))
}
