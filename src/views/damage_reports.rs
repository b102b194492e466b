//! Damage reports filed against listings, with their photos.

use super::{
    any_contains, decided, load_people, needle, person, person_matches, status_filter, Decision,
    ViewListing,
};
use crate::error::ActionError;
use crate::moderation::report::Person;
use crate::notice::Notice;
use crate::orm::damage_reports;
use crate::processing::ProcessingMarker;
use crate::realtime::TableTopic;
use crate::session::AdminContext;
use crate::storage::StorageBackend;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DamageReportFilter {
    pub search: String,
    pub status: Option<String>,
    pub listing_id: Option<Uuid>,
}

impl Default for DamageReportFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: Some("pending".to_string()),
            listing_id: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DamageReportRow {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub reporter: Person,
    pub description: String,
    pub image_urls: Vec<String>,
    pub status: String,
    pub admin_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DamageReportRow {
    pub fn matches(&self, search: &str) -> bool {
        match needle(search) {
            Some(n) => {
                any_contains(
                    &n,
                    [Some(self.description.as_str()), self.admin_notes.as_deref()],
                ) || person_matches(&self.reporter, &n)
            }
            None => true,
        }
    }
}

/// Stored image paths. Anything that is not a string array yields nothing.
pub fn image_paths(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn topics() -> Vec<TableTopic> {
    vec![TableTopic::table("damage_reports")]
}

pub async fn load(
    db: &DatabaseConnection,
    storage: &dyn StorageBackend,
    filter: &DamageReportFilter,
    limit: u64,
) -> Result<ViewListing<DamageReportRow>, ActionError> {
    let mut query = damage_reports::Entity::find();
    if let Some(status) = status_filter(&filter.status) {
        query = query.filter(damage_reports::Column::Status.eq(status));
    }
    if let Some(listing_id) = filter.listing_id {
        query = query.filter(damage_reports::Column::ListingId.eq(listing_id));
    }

    let found = query
        .order_by_desc(damage_reports::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?;
    let people = load_people(db, found.iter().map(|r| r.user_id)).await?;

    let rows = found
        .into_iter()
        .map(|r| DamageReportRow {
            id: r.id,
            listing_id: r.listing_id,
            reporter: person(&people, r.user_id),
            description: r.description,
            image_urls: image_paths(&r.image_paths)
                .iter()
                .map(|p| storage.public_url(p))
                .collect(),
            status: r.status,
            admin_notes: r.admin_notes,
            reviewed_at: r.reviewed_at.map(|t| t.with_timezone(&Utc)),
            created_at: r.created_at.with_timezone(&Utc),
        })
        .collect();

    Ok(ViewListing::filtered(rows, |r| r.matches(&filter.search)))
}

/// Approves or rejects a pending damage report, recording admin notes.
pub async fn decide(
    db: &DatabaseConnection,
    processing: &ProcessingMarker,
    admin: &AdminContext,
    report_id: Uuid,
    decision: Decision,
    notes: Option<String>,
) -> Result<Notice, ActionError> {
    let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    if decision == Decision::Reject && notes.is_none() {
        return Err(ActionError::validation("Please add a note explaining the rejection."));
    }

    let _guard = processing
        .try_begin(ProcessingMarker::key("damage", report_id))
        .ok_or(ActionError::InProgress)?;

    let now = Utc::now();
    let result = damage_reports::Entity::update_many()
        .col_expr(damage_reports::Column::Status, Expr::value(decision.status()))
        .col_expr(damage_reports::Column::AdminNotes, Expr::value(notes))
        .col_expr(damage_reports::Column::ReviewedBy, Expr::value(admin.admin_id))
        .col_expr(
            damage_reports::Column::ReviewedAt,
            Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(now)),
        )
        .filter(damage_reports::Column::Id.eq(report_id))
        .filter(damage_reports::Column::Status.eq("pending"))
        .exec(db)
        .await?;

    let exists = result.rows_affected > 0
        || damage_reports::Entity::find_by_id(report_id)
            .one(db)
            .await?
            .is_some();
    decided(result.rows_affected, exists, "Damage report")?;

    log::info!(
        "Admin {} set damage report {} to {}",
        admin.admin_id,
        report_id,
        decision.status()
    );
    Ok(Notice::success(match decision {
        Decision::Approve => "Damage report approved.",
        Decision::Reject => "Damage report rejected.",
    }))
}
