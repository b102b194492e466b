//! Report list and filter.

use super::report::{
    ListingSummary, MessageSummary, Person, ReportKind, ReportRow, ReportStatus, ReportTarget,
    Resolution,
};
use crate::error::ActionError;
use crate::orm::{
    admin_credentials, admin_reports, car_listings, listing_reports, message_reports, messages,
    users,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindFilter {
    #[default]
    All,
    Listing,
    Message,
}

impl KindFilter {
    /// Report tables read for this filter. Admin reports target listings.
    pub fn kinds(&self) -> &'static [ReportKind] {
        match self {
            KindFilter::All => &[ReportKind::Listing, ReportKind::Message, ReportKind::Admin],
            KindFilter::Listing => &[ReportKind::Listing, ReportKind::Admin],
            KindFilter::Message => &[ReportKind::Message],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    Pending,
    Approved,
    Rejected,
    All,
}

impl StatusFilter {
    pub fn status(&self) -> Option<ReportStatus> {
        match self {
            StatusFilter::Pending => Some(ReportStatus::Pending),
            StatusFilter::Approved => Some(ReportStatus::Approved),
            StatusFilter::Rejected => Some(ReportStatus::Rejected),
            StatusFilter::All => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    #[serde(default)]
    pub kind: KindFilter,
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default)]
    pub search: String,
}

/// Why a listing came back empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyState {
    /// Nothing exists for the selected kind and status.
    NoData,
    /// Rows exist but none match the search text.
    NoMatch,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReportListing {
    pub rows: Vec<ReportRow>,
    /// Rows fetched before the search filter was applied.
    pub fetched: usize,
    pub empty: Option<EmptyState>,
}

impl ReportListing {
    pub fn find(&self, id: Uuid) -> Option<&ReportRow> {
        self.rows.iter().find(|r| r.id == id)
    }
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Reports of one kind, newest first, at most `limit`.
    async fn fetch(
        &self,
        kind: ReportKind,
        status: Option<ReportStatus>,
        limit: u64,
    ) -> Result<Vec<ReportRow>, ActionError>;

    async fn find(&self, kind: ReportKind, id: Uuid) -> Result<Option<ReportRow>, ActionError>;

    /// Files a pending admin report against a listing.
    async fn create_admin_report(
        &self,
        admin_id: Uuid,
        listing_id: Uuid,
        reason: &str,
        details: Option<&str>,
    ) -> Result<Uuid, ActionError>;
}

/// Fetches every selected kind, merges newest first and applies the search.
/// Any fetch failure fails the whole listing.
pub async fn load_reports(
    store: &dyn ReportStore,
    filter: &ReportFilter,
    limit: u64,
) -> Result<ReportListing, ActionError> {
    let status = filter.status.status();
    let batches = try_join_all(
        filter
            .kind
            .kinds()
            .iter()
            .map(|kind| store.fetch(*kind, status, limit)),
    )
    .await?;

    let mut rows: Vec<ReportRow> = batches.into_iter().flatten().collect();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    rows.truncate(limit as usize);

    let fetched = rows.len();
    rows.retain(|r| r.matches(&filter.search));

    let empty = if fetched == 0 {
        Some(EmptyState::NoData)
    } else if rows.is_empty() {
        Some(EmptyState::NoMatch)
    } else {
        None
    };

    Ok(ReportListing {
        rows,
        fetched,
        empty,
    })
}

/// Report fields shared by the three report tables.
struct RawReport {
    id: Uuid,
    kind: ReportKind,
    reporter_id: Uuid,
    target_id: Uuid,
    reason: String,
    details: Option<String>,
    status: String,
    resolution_notes: Option<String>,
    resolved_by: Option<Uuid>,
    resolved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<listing_reports::Model> for RawReport {
    fn from(m: listing_reports::Model) -> Self {
        RawReport {
            id: m.id,
            kind: ReportKind::Listing,
            reporter_id: m.reporter_id,
            target_id: m.listing_id,
            reason: m.reason,
            details: m.details,
            status: m.status,
            resolution_notes: m.resolution_notes,
            resolved_by: m.resolved_by,
            resolved_at: m.resolved_at.map(|t| t.with_timezone(&Utc)),
            created_at: m.created_at.with_timezone(&Utc),
        }
    }
}

impl From<message_reports::Model> for RawReport {
    fn from(m: message_reports::Model) -> Self {
        RawReport {
            id: m.id,
            kind: ReportKind::Message,
            reporter_id: m.reporter_id,
            target_id: m.message_id,
            reason: m.reason,
            details: m.details,
            status: m.status,
            resolution_notes: m.resolution_notes,
            resolved_by: m.resolved_by,
            resolved_at: m.resolved_at.map(|t| t.with_timezone(&Utc)),
            created_at: m.created_at.with_timezone(&Utc),
        }
    }
}

impl From<admin_reports::Model> for RawReport {
    fn from(m: admin_reports::Model) -> Self {
        RawReport {
            id: m.id,
            kind: ReportKind::Admin,
            reporter_id: m.admin_id,
            target_id: m.listing_id,
            reason: m.reason,
            details: m.details,
            status: m.status,
            resolution_notes: m.resolution_notes,
            resolved_by: m.resolved_by,
            resolved_at: m.resolved_at.map(|t| t.with_timezone(&Utc)),
            created_at: m.created_at.with_timezone(&Utc),
        }
    }
}

/// sea-orm backed report store.
#[derive(Clone)]
pub struct DbReportStore {
    db: DatabaseConnection,
}

impl DbReportStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn fetch_raw(
        &self,
        kind: ReportKind,
        status: Option<ReportStatus>,
        id: Option<Uuid>,
        limit: u64,
    ) -> Result<Vec<RawReport>, ActionError> {
        let db = &self.db;
        let status = status.map(|s| s.as_str());

        let raw = match kind {
            ReportKind::Listing => {
                let mut q = listing_reports::Entity::find();
                if let Some(status) = status {
                    q = q.filter(listing_reports::Column::Status.eq(status));
                }
                if let Some(id) = id {
                    q = q.filter(listing_reports::Column::Id.eq(id));
                }
                q.order_by_desc(listing_reports::Column::CreatedAt)
                    .limit(limit)
                    .all(db)
                    .await?
                    .into_iter()
                    .map(RawReport::from)
                    .collect()
            }
            ReportKind::Message => {
                let mut q = message_reports::Entity::find();
                if let Some(status) = status {
                    q = q.filter(message_reports::Column::Status.eq(status));
                }
                if let Some(id) = id {
                    q = q.filter(message_reports::Column::Id.eq(id));
                }
                q.order_by_desc(message_reports::Column::CreatedAt)
                    .limit(limit)
                    .all(db)
                    .await?
                    .into_iter()
                    .map(RawReport::from)
                    .collect()
            }
            ReportKind::Admin => {
                let mut q = admin_reports::Entity::find();
                if let Some(status) = status {
                    q = q.filter(admin_reports::Column::Status.eq(status));
                }
                if let Some(id) = id {
                    q = q.filter(admin_reports::Column::Id.eq(id));
                }
                q.order_by_desc(admin_reports::Column::CreatedAt)
                    .limit(limit)
                    .all(db)
                    .await?
                    .into_iter()
                    .map(RawReport::from)
                    .collect()
            }
        };

        Ok(raw)
    }

    /// Joins reporters and targets in batches, one query per table.
    async fn enrich(&self, raw: Vec<RawReport>) -> Result<Vec<ReportRow>, ActionError> {
        let db = &self.db;

        let listing_ids: Vec<Uuid> = raw
            .iter()
            .filter(|r| r.kind.targets_listing())
            .map(|r| r.target_id)
            .collect();
        let message_ids: Vec<Uuid> = raw
            .iter()
            .filter(|r| r.kind == ReportKind::Message)
            .map(|r| r.target_id)
            .collect();
        let admin_ids: Vec<Uuid> = raw
            .iter()
            .filter(|r| r.kind == ReportKind::Admin)
            .map(|r| r.reporter_id)
            .collect();

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

        let msgs: HashMap<Uuid, messages::Model> = if message_ids.is_empty() {
            HashMap::new()
        } else {
            messages::Entity::find()
                .filter(messages::Column::Id.is_in(message_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|m| (m.id, m))
                .collect()
        };

        let admins: HashMap<Uuid, String> = if admin_ids.is_empty() {
            HashMap::new()
        } else {
            admin_credentials::Entity::find()
                .filter(admin_credentials::Column::Id.is_in(admin_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|a| (a.id, a.username))
                .collect()
        };

        let mut user_ids: Vec<Uuid> = raw
            .iter()
            .filter(|r| r.kind != ReportKind::Admin)
            .map(|r| r.reporter_id)
            .collect();
        user_ids.extend(msgs.values().flat_map(|m| [m.sender_id, m.receiver_id]));
        user_ids.sort();
        user_ids.dedup();

        let people: HashMap<Uuid, users::Model> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            users::Entity::find()
                .filter(users::Column::Id.is_in(user_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|u| (u.id, u))
                .collect()
        };

        let person = |id: Uuid| -> Person {
            match people.get(&id) {
                Some(u) => Person {
                    id,
                    name: u.full_name.clone(),
                    email: Some(u.email.clone()),
                },
                None => Person {
                    id,
                    name: None,
                    email: None,
                },
            }
        };

        let mut rows = Vec::with_capacity(raw.len());
        for r in raw {
            let status = match ReportStatus::parse(&r.status) {
                Some(status) => status,
                None => {
                    log::warn!(
                        "Skipping {} row {} with unknown status {:?}",
                        r.kind.table(),
                        r.id,
                        r.status
                    );
                    continue;
                }
            };

            let reporter = match r.kind {
                ReportKind::Admin => Some(Person {
                    id: r.reporter_id,
                    name: admins.get(&r.reporter_id).cloned(),
                    email: None,
                }),
                _ => Some(person(r.reporter_id)),
            };

            let target = if r.kind.targets_listing() {
                match listings.get(&r.target_id) {
                    Some(l) => ReportTarget::Listing(ListingSummary {
                        id: l.id,
                        owner_id: l.user_id,
                        brand: l.brand.clone(),
                        model: l.model.clone(),
                        year: l.year,
                        status: l.status.clone(),
                    }),
                    None => ReportTarget::Missing { id: r.target_id },
                }
            } else {
                match msgs.get(&r.target_id) {
                    Some(m) => ReportTarget::Message(MessageSummary {
                        id: m.id,
                        sender: person(m.sender_id),
                        receiver: person(m.receiver_id),
                        content: m.content.clone(),
                    }),
                    None => ReportTarget::Missing { id: r.target_id },
                }
            };

            rows.push(ReportRow {
                id: r.id,
                kind: r.kind,
                reporter,
                reason: r.reason,
                details: r.details,
                status,
                resolution: Resolution::from_parts(r.resolved_by, r.resolved_at, r.resolution_notes),
                target,
                created_at: r.created_at,
            });
        }

        Ok(rows)
    }
}

#[async_trait]
impl ReportStore for DbReportStore {
    async fn fetch(
        &self,
        kind: ReportKind,
        status: Option<ReportStatus>,
        limit: u64,
    ) -> Result<Vec<ReportRow>, ActionError> {
        let raw = self.fetch_raw(kind, status, None, limit).await?;
        self.enrich(raw).await
    }

    async fn find(&self, kind: ReportKind, id: Uuid) -> Result<Option<ReportRow>, ActionError> {
        let raw = self.fetch_raw(kind, None, Some(id), 1).await?;
        Ok(self.enrich(raw).await?.into_iter().next())
    }

    async fn create_admin_report(
        &self,
        admin_id: Uuid,
        listing_id: Uuid,
        reason: &str,
        details: Option<&str>,
    ) -> Result<Uuid, ActionError> {
        let id = Uuid::new_v4();
        let report = admin_reports::ActiveModel {
            id: Set(id),
            listing_id: Set(listing_id),
            admin_id: Set(admin_id),
            reason: Set(reason.to_string()),
            details: Set(details.map(str::to_string)),
            status: Set(ReportStatus::Pending.as_str().to_string()),
            resolution_notes: Set(None),
            resolved_by: Set(None),
            resolved_at: Set(None),
            created_at: Set(Utc::now().into()),
        };

        admin_reports::Entity::insert(report).exec(&self.db).await?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_reports_listed_with_listings() {
        assert!(KindFilter::All.kinds().contains(&ReportKind::Admin));
        assert!(KindFilter::Listing.kinds().contains(&ReportKind::Admin));
        assert!(!KindFilter::Message.kinds().contains(&ReportKind::Admin));
    }

    #[test]
    fn test_filter_defaults_to_pending_everything() {
        let filter: ReportFilter = serde_json::from_str("{}").unwrap();
        assert_eq!(filter.kind, KindFilter::All);
        assert_eq!(filter.status, StatusFilter::Pending);
        assert!(filter.search.is_empty());
        assert_eq!(StatusFilter::All.status(), None);
    }
}
