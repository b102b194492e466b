//! Social media share requests.

use super::{
    any_contains, decided, load_people, needle, person, person_matches, status_filter, Decision,
    ViewListing,
};
use crate::error::ActionError;
use crate::moderation::report::Person;
use crate::notice::Notice;
use crate::orm::{car_listings, social_share_requests};
use crate::processing::ProcessingMarker;
use crate::realtime::TableTopic;
use crate::session::AdminContext;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShareRequestFilter {
    pub search: String,
    pub status: Option<String>,
    pub platform: Option<String>,
}

impl Default for ShareRequestFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: Some("pending".to_string()),
            platform: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShareRequestRow {
    pub id: Uuid,
    pub user: Person,
    pub listing_id: Uuid,
    /// "Brand Model (Year)", when the listing still exists.
    pub listing_title: Option<String>,
    pub platform: String,
    pub status: String,
    pub admin_notes: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ShareRequestRow {
    pub fn is_pending(&self) -> bool {
        self.status == "pending"
    }

    pub fn matches(&self, search: &str) -> bool {
        match needle(search) {
            Some(n) => {
                any_contains(
                    &n,
                    [Some(self.platform.as_str()), self.listing_title.as_deref()],
                ) || person_matches(&self.user, &n)
            }
            None => true,
        }
    }
}

pub fn listing_title(listing: &car_listings::Model) -> String {
    format!("{} {} ({})", listing.brand, listing.model, listing.year)
}

pub fn topics() -> Vec<TableTopic> {
    vec![TableTopic::table("social_share_requests")]
}

pub async fn load(
    db: &DatabaseConnection,
    filter: &ShareRequestFilter,
    limit: u64,
) -> Result<ViewListing<ShareRequestRow>, ActionError> {
    let mut query = social_share_requests::Entity::find();
    if let Some(status) = status_filter(&filter.status) {
        query = query.filter(social_share_requests::Column::Status.eq(status));
    }
    if let Some(platform) = filter.platform.as_deref().filter(|p| !p.is_empty()) {
        query = query.filter(social_share_requests::Column::Platform.eq(platform));
    }

    let found = query
        .order_by_desc(social_share_requests::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?;

    let people = load_people(db, found.iter().map(|r| r.user_id)).await?;
    let listing_ids: Vec<Uuid> = found.iter().map(|r| r.listing_id).collect();
    let listings: HashMap<Uuid, car_listings::Model> = if listing_ids.is_empty() {
        HashMap::new()
    } else {
        car_listings::Entity::find()
            .filter(car_listings::Column::Id.is_in(listing_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|l| (l.id, l))
            .collect()
    };

    let rows = found
        .into_iter()
        .map(|r| ShareRequestRow {
            id: r.id,
            user: person(&people, r.user_id),
            listing_id: r.listing_id,
            listing_title: listings.get(&r.listing_id).map(listing_title),
            platform: r.platform,
            status: r.status,
            admin_notes: r.admin_notes,
            processed_at: r.processed_at.map(|t| t.with_timezone(&Utc)),
            created_at: r.created_at.with_timezone(&Utc),
        })
        .collect();

    Ok(ViewListing::filtered(rows, |r| r.matches(&filter.search)))
}

/// Approves or rejects a pending share request.
pub async fn decide(
    db: &DatabaseConnection,
    processing: &ProcessingMarker,
    admin: &AdminContext,
    request_id: Uuid,
    decision: Decision,
    notes: Option<String>,
) -> Result<Notice, ActionError> {
    let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    if decision == Decision::Reject && notes.is_none() {
        return Err(ActionError::validation("Please give a reason for the rejection."));
    }

    let _guard = processing
        .try_begin(ProcessingMarker::key("share", request_id))
        .ok_or(ActionError::InProgress)?;

    let now = Utc::now();
    let result = social_share_requests::Entity::update_many()
        .col_expr(social_share_requests::Column::Status, Expr::value(decision.status()))
        .col_expr(social_share_requests::Column::AdminNotes, Expr::value(notes))
        .col_expr(social_share_requests::Column::ProcessedBy, Expr::value(admin.admin_id))
        .col_expr(
            social_share_requests::Column::ProcessedAt,
            Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(now)),
        )
        .filter(social_share_requests::Column::Id.eq(request_id))
        .filter(social_share_requests::Column::Status.eq("pending"))
        .exec(db)
        .await?;

    let exists = result.rows_affected > 0
        || social_share_requests::Entity::find_by_id(request_id)
            .one(db)
            .await?
            .is_some();
    decided(result.rows_affected, exists, "Share request")?;

    log::info!(
        "Admin {} set share request {} to {}",
        admin.admin_id,
        request_id,
        decision.status()
    );
    Ok(Notice::success(match decision {
        Decision::Approve => "Share request approved.",
        Decision::Reject => "Share request rejected.",
    }))
}
