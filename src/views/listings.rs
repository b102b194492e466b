//! Car listings with their owners.

use super::{any_contains, needle, status_filter, ViewListing};
use crate::error::ActionError;
use crate::orm::{car_listings, users};
use crate::realtime::TableTopic;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListingFilter {
    pub search: String,
    /// `pending`, `approved`, `rejected`, `sold` or `all`
    pub status: Option<String>,
    pub owner_id: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListingRow {
    #[serde(flatten)]
    pub listing: car_listings::Model,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
}

impl ListingRow {
    pub fn matches(&self, search: &str) -> bool {
        match needle(search) {
            Some(n) => any_contains(
                &n,
                [
                    Some(self.listing.brand.as_str()),
                    Some(self.listing.model.as_str()),
                    self.listing.city.as_deref(),
                    self.owner_name.as_deref(),
                    self.owner_email.as_deref(),
                ],
            ),
            None => true,
        }
    }
}

pub fn topics() -> Vec<TableTopic> {
    vec![TableTopic::table("car_listings")]
}

pub async fn load(
    db: &DatabaseConnection,
    filter: &ListingFilter,
    limit: u64,
) -> Result<ViewListing<ListingRow>, ActionError> {
    let mut query = car_listings::Entity::find();
    if let Some(status) = status_filter(&filter.status) {
        query = query.filter(car_listings::Column::Status.eq(status));
    }
    if let Some(owner_id) = filter.owner_id {
        query = query.filter(car_listings::Column::UserId.eq(owner_id));
    }

    let rows = query
        .find_also_related(users::Entity)
        .order_by_desc(car_listings::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?
        .into_iter()
        .map(|(listing, owner)| ListingRow {
            listing,
            owner_name: owner.as_ref().and_then(|o| o.full_name.clone()),
            owner_email: owner.map(|o| o.email),
        })
        .collect();

    Ok(ViewListing::filtered(rows, |r| r.matches(&filter.search)))
}

/// Listing owner, for notifying them about a decision.
pub async fn owner_of(db: &DatabaseConnection, listing_id: Uuid) -> Result<Uuid, ActionError> {
    car_listings::Entity::find_by_id(listing_id)
        .one(db)
        .await?
        .map(|l| l.user_id)
        .ok_or(ActionError::NotFound("Listing"))
}
