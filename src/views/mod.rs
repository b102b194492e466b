//! List-and-filter views.
//!
//! Every view fetches a bounded collection, filters it here by status and
//! free text, and names the tables whose changes make it stale. A list view is
//! always reloaded in full. The dashboard only recounts the badges a change
//! touches.

pub mod admins;
pub mod blocked;
pub mod chat;
pub mod corporate;
pub mod damage_reports;
pub mod listings;
pub mod purchases;
pub mod reviews;
pub mod share_requests;
pub mod users;
pub mod verifications;

use crate::dashboard;
use crate::error::ActionError;
use crate::moderation::{EmptyState, ReportDesk, ReportFilter};
use crate::moderation::report::Person;
use crate::orm::users as user_rows;
use crate::realtime::TableTopic;
use crate::storage::StorageBackend;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Rows of a view after filtering.
#[derive(Clone, Debug, Serialize)]
pub struct ViewListing<T> {
    pub rows: Vec<T>,
    /// Rows fetched before the text filter ran.
    pub fetched: usize,
    pub empty: Option<EmptyState>,
}

impl<T> ViewListing<T> {
    /// Applies `keep` and records why the result is empty, if it is.
    pub fn filtered(mut rows: Vec<T>, keep: impl Fn(&T) -> bool) -> Self {
        let fetched = rows.len();
        rows.retain(|r| keep(r));
        let empty = if fetched == 0 {
            Some(EmptyState::NoData)
        } else if rows.is_empty() {
            Some(EmptyState::NoMatch)
        } else {
            None
        };
        Self {
            rows,
            fetched,
            empty,
        }
    }
}

/// Lowercased, trimmed search text. None when blank.
pub fn needle(search: &str) -> Option<String> {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        None
    } else {
        Some(needle)
    }
}

/// Case-insensitive containment over any of `fields`.
pub fn any_contains<'a>(needle: &str, fields: impl IntoIterator<Item = Option<&'a str>>) -> bool {
    fields
        .into_iter()
        .flatten()
        .any(|f| f.to_lowercase().contains(needle))
}

/// Status filter value; `all` or blank means no filtering.
pub fn status_filter(status: &Option<String>) -> Option<&str> {
    status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "all")
}

/// Batch-loads users by id for display joins.
pub async fn load_people(
    db: &DatabaseConnection,
    ids: impl IntoIterator<Item = Uuid>,
) -> Result<HashMap<Uuid, user_rows::Model>, ActionError> {
    let mut ids: Vec<Uuid> = ids.into_iter().collect();
    ids.sort();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    Ok(user_rows::Entity::find()
        .filter(user_rows::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect())
}

pub fn person(people: &HashMap<Uuid, user_rows::Model>, id: Uuid) -> Person {
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
}

pub fn person_matches(p: &Person, needle: &str) -> bool {
    any_contains(needle, [p.name.as_deref(), p.email.as_deref()])
}

/// Outcome chosen for a pending queue item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    /// Status the item moves to.
    pub fn status(&self) -> &'static str {
        match self {
            Decision::Approve => "approved",
            Decision::Reject => "rejected",
        }
    }
}

/// Maps the affected row count of a `status = 'pending'` guarded update.
/// Zero rows means the item is gone or was already decided.
pub fn decided(rows_affected: u64, still_exists: bool, what: &'static str) -> Result<(), ActionError> {
    match (rows_affected, still_exists) {
        (0, false) => Err(ActionError::NotFound(what)),
        (0, true) => Err(ActionError::NotPending),
        _ => Ok(()),
    }
}

/// What a view needs to load itself.
#[derive(Clone)]
pub struct ViewContext {
    pub db: DatabaseConnection,
    pub reports: ReportDesk,
    pub storage: Arc<dyn StorageBackend>,
    pub max_rows: u64,
    pub signed_url_ttl: Duration,
}

/// What a change makes stale in a watched view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reload {
    Full,
    /// Dashboard badges to recount.
    Badges(Vec<dashboard::Badge>),
}

impl Reload {
    /// Folds a reload that arrived while this one was waiting.
    pub fn merge(self, other: Reload) -> Reload {
        match (self, other) {
            (Reload::Badges(mut badges), Reload::Badges(more)) => {
                for badge in more {
                    if !badges.contains(&badge) {
                        badges.push(badge);
                    }
                }
                Reload::Badges(badges)
            }
            _ => Reload::Full,
        }
    }
}

/// A view and its filters, as requested by a live client:
/// `{"watch": "users", "search": "ali"}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "watch", rename_all = "snake_case")]
pub enum ViewRequest {
    Reports(ReportFilter),
    Users(users::UserFilter),
    Listings(listings::ListingFilter),
    Reviews(reviews::ReviewFilter),
    Verifications(verifications::VerificationFilter),
    Chat(chat::ChatFilter),
    ShareRequests(share_requests::ShareRequestFilter),
    DamageReports(damage_reports::DamageReportFilter),
    BlockedUsers(blocked::BlockedFilter),
    CorporateApproval(corporate::CorporateFilter),
    PurchaseRequests(purchases::PurchaseFilter),
    Admins(admins::AdminFilter),
    Dashboard,
}

impl ViewRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ViewRequest::Reports(_) => "reports",
            ViewRequest::Users(_) => "users",
            ViewRequest::Listings(_) => "listings",
            ViewRequest::Reviews(_) => "reviews",
            ViewRequest::Verifications(_) => "verifications",
            ViewRequest::Chat(_) => "chat",
            ViewRequest::ShareRequests(_) => "share_requests",
            ViewRequest::DamageReports(_) => "damage_reports",
            ViewRequest::BlockedUsers(_) => "blocked_users",
            ViewRequest::CorporateApproval(_) => "corporate_approval",
            ViewRequest::PurchaseRequests(_) => "purchase_requests",
            ViewRequest::Admins(_) => "admins",
            ViewRequest::Dashboard => "dashboard",
        }
    }

    /// Tables whose changes make this view stale.
    pub fn topics(&self) -> Vec<TableTopic> {
        match self {
            ViewRequest::Reports(_) => vec![
                TableTopic::table("listing_reports"),
                TableTopic::table("message_reports"),
                TableTopic::table("admin_reports"),
            ],
            ViewRequest::Users(_) => users::topics(),
            ViewRequest::Listings(_) => listings::topics(),
            ViewRequest::Reviews(_) => reviews::topics(),
            ViewRequest::Verifications(_) => verifications::topics(),
            ViewRequest::Chat(_) => chat::topics(),
            ViewRequest::ShareRequests(_) => share_requests::topics(),
            ViewRequest::DamageReports(_) => damage_reports::topics(),
            ViewRequest::BlockedUsers(_) => blocked::topics(),
            ViewRequest::CorporateApproval(_) => corporate::topics(),
            ViewRequest::PurchaseRequests(_) => purchases::topics(),
            ViewRequest::Admins(_) => admins::topics(),
            ViewRequest::Dashboard => dashboard::topics(),
        }
    }

    /// What a change on `topic` makes stale.
    pub fn reload_for(&self, topic: &TableTopic) -> Reload {
        match self {
            ViewRequest::Dashboard => Reload::Badges(dashboard::Badge::affected_by(topic)),
            _ => Reload::Full,
        }
    }

    /// Loads what `reload` names: the whole view, or only some badges.
    pub async fn load(
        &self,
        ctx: &ViewContext,
        reload: &Reload,
    ) -> Result<serde_json::Value, ActionError> {
        match (self, reload) {
            (ViewRequest::Dashboard, Reload::Badges(badges)) => {
                serde_json::to_value(dashboard::count_badges(&ctx.db, badges).await)
                    .map_err(|e| ActionError::Remote(format!("Failed to encode view: {}", e)))
            }
            _ => self.snapshot(ctx).await,
        }
    }

    /// Loads the view in full.
    pub async fn snapshot(&self, ctx: &ViewContext) -> Result<serde_json::Value, ActionError> {
        let db = &ctx.db;
        let limit = ctx.max_rows;

        let value = match self {
            ViewRequest::Reports(f) => serde_json::to_value(ctx.reports.list(f).await?),
            ViewRequest::Users(f) => serde_json::to_value(users::load(db, f, limit).await?),
            ViewRequest::Listings(f) => serde_json::to_value(listings::load(db, f, limit).await?),
            ViewRequest::Reviews(f) => serde_json::to_value(reviews::load(db, f, limit).await?),
            ViewRequest::Verifications(f) => {
                serde_json::to_value(verifications::load(db, f, limit).await?)
            }
            ViewRequest::Chat(f) => serde_json::to_value(chat::load(db, f, limit).await?),
            ViewRequest::ShareRequests(f) => {
                serde_json::to_value(share_requests::load(db, f, limit).await?)
            }
            ViewRequest::DamageReports(f) => serde_json::to_value(
                damage_reports::load(db, ctx.storage.as_ref(), f, limit).await?,
            ),
            ViewRequest::BlockedUsers(f) => serde_json::to_value(blocked::load(db, f, limit).await?),
            ViewRequest::CorporateApproval(f) => serde_json::to_value(
                corporate::load(db, ctx.storage.as_ref(), ctx.signed_url_ttl, f, limit).await?,
            ),
            ViewRequest::PurchaseRequests(f) => {
                serde_json::to_value(purchases::load(db, f, limit).await?)
            }
            ViewRequest::Admins(f) => serde_json::to_value(admins::load(db, f, limit).await?),
            ViewRequest::Dashboard => serde_json::to_value(dashboard::counts(db).await),
        };

        value.map_err(|e| ActionError::Remote(format!("Failed to encode view: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filtered_distinguishes_empty_states() {
        let none: ViewListing<u32> = ViewListing::filtered(vec![], |_| true);
        assert_eq!(none.empty, Some(EmptyState::NoData));

        let no_match = ViewListing::filtered(vec![1, 2, 3], |n| *n > 5);
        assert_eq!(no_match.empty, Some(EmptyState::NoMatch));
        assert_eq!(no_match.fetched, 3);

        let some = ViewListing::filtered(vec![1, 2, 3], |n| *n > 1);
        assert_eq!(some.rows, vec![2, 3]);
        assert_eq!(some.empty, None);
    }

    #[test]
    fn test_watch_messages_parse_with_defaults() {
        let req: ViewRequest = serde_json::from_str(r#"{"watch":"blocked_users"}"#).unwrap();
        assert_eq!(req.name(), "blocked_users");
        assert_eq!(
            req.topics(),
            vec![TableTopic::filtered("users", "is_blocked=eq.true")]
        );

        let req: ViewRequest =
            serde_json::from_str(r#"{"watch":"reports","kind":"message","status":"all"}"#)
                .unwrap();
        match req {
            ViewRequest::Reports(f) => {
                assert_eq!(f.kind, crate::moderation::KindFilter::Message);
                assert_eq!(f.status, crate::moderation::StatusFilter::All);
            }
            other => panic!("unexpected {:?}", other),
        }

        let req: ViewRequest = serde_json::from_str(r#"{"watch":"dashboard"}"#).unwrap();
        assert!(!req.topics().is_empty());
    }

    #[test]
    fn test_dashboard_recounts_only_touched_badges() {
        let dashboard = ViewRequest::Dashboard;
        let users = dashboard.topics();
        let users: Vec<_> = users.iter().filter(|t| t.table == "users").collect();
        assert_eq!(users, vec![&TableTopic::table("users")]);

        assert_eq!(
            dashboard.reload_for(&TableTopic::table("users")),
            Reload::Badges(vec![
                dashboard::Badge::PendingCorporate,
                dashboard::Badge::BlockedUsers
            ])
        );

        let listings = ViewRequest::Listings(Default::default());
        assert_eq!(
            listings.reload_for(&TableTopic::table("car_listings")),
            Reload::Full
        );
    }

    #[test]
    fn test_reloads_merge() {
        use crate::dashboard::Badge::*;

        let merged = Reload::Badges(vec![PendingReviews, BlockedUsers])
            .merge(Reload::Badges(vec![BlockedUsers, PendingListings]));
        assert_eq!(
            merged,
            Reload::Badges(vec![PendingReviews, BlockedUsers, PendingListings])
        );
        assert_eq!(
            Reload::Badges(vec![PendingReviews]).merge(Reload::Full),
            Reload::Full
        );
        assert_eq!(
            Reload::Full.merge(Reload::Badges(vec![PendingReviews])),
            Reload::Full
        );
    }

    #[test]
    fn test_decided_distinguishes_missing_from_resolved() {
        assert!(decided(1, true, "Item").is_ok());
        assert!(matches!(decided(0, false, "Item"), Err(ActionError::NotFound("Item"))));
        assert!(matches!(decided(0, true, "Item"), Err(ActionError::NotPending)));
    }

    #[test]
    fn test_status_filter_all_means_none() {
        assert_eq!(status_filter(&None), None);
        assert_eq!(status_filter(&Some("all".to_string())), None);
        assert_eq!(status_filter(&Some(" ".to_string())), None);
        assert_eq!(status_filter(&Some("pending".to_string())), Some("pending"));
    }
}
