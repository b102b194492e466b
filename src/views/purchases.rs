//! Listing slot purchase requests.

use super::{any_contains, load_people, needle, person, person_matches, status_filter, ViewListing};
use crate::error::ActionError;
use crate::moderation::report::Person;
use crate::orm::listing_purchase_requests;
use crate::realtime::TableTopic;
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PurchaseFilter {
    pub search: String,
    pub status: Option<String>,
}

impl Default for PurchaseFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: Some("pending".to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PurchaseRow {
    pub id: Uuid,
    pub user: Person,
    pub slots: i32,
    pub amount: f64,
    pub status: String,
    pub payment_reference: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PurchaseRow {
    pub fn matches(&self, search: &str) -> bool {
        match needle(search) {
            Some(n) => {
                any_contains(&n, [self.payment_reference.as_deref()])
                    || person_matches(&self.user, &n)
            }
            None => true,
        }
    }
}

pub fn topics() -> Vec<TableTopic> {
    vec![TableTopic::table("listing_purchase_requests")]
}

pub async fn load(
    db: &DatabaseConnection,
    filter: &PurchaseFilter,
    limit: u64,
) -> Result<ViewListing<PurchaseRow>, ActionError> {
    let mut query = listing_purchase_requests::Entity::find();
    if let Some(status) = status_filter(&filter.status) {
        query = query.filter(listing_purchase_requests::Column::Status.eq(status));
    }

    let found = query
        .order_by_desc(listing_purchase_requests::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?;
    let people = load_people(db, found.iter().map(|r| r.user_id)).await?;

    let rows = found
        .into_iter()
        .map(|r| PurchaseRow {
            id: r.id,
            user: person(&people, r.user_id),
            slots: r.slots,
            amount: r.amount,
            status: r.status,
            payment_reference: r.payment_reference,
            processed_at: r.processed_at.map(|t| t.with_timezone(&Utc)),
            created_at: r.created_at.with_timezone(&Utc),
        })
        .collect();

    Ok(ViewListing::filtered(rows, |r| r.matches(&filter.search)))
}
