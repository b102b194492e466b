//! Sidebar badges: one pending-work count per section.
//!
//! Each badge is counted by its own query and refreshed by its own topics, so
//! one failing count never hides the others.

use crate::orm::{
    admin_reports, car_listings, damage_reports, listing_purchase_requests, listing_reports,
    message_reports, reviews, social_share_requests, users,
};
use crate::realtime::TableTopic;
use futures::future::join_all;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    PendingListings,
    PendingReports,
    PendingReviews,
    PendingCorporate,
    PendingDamageReports,
    PendingShareRequests,
    PendingPurchases,
    BlockedUsers,
}

impl Badge {
    pub const ALL: [Badge; 8] = [
        Badge::PendingListings,
        Badge::PendingReports,
        Badge::PendingReviews,
        Badge::PendingCorporate,
        Badge::PendingDamageReports,
        Badge::PendingShareRequests,
        Badge::PendingPurchases,
        Badge::BlockedUsers,
    ];

    pub fn topics(&self) -> Vec<TableTopic> {
        match self {
            Badge::PendingListings => vec![TableTopic::table("car_listings")],
            Badge::PendingReports => vec![
                TableTopic::table("listing_reports"),
                TableTopic::table("message_reports"),
                TableTopic::table("admin_reports"),
            ],
            Badge::PendingReviews => vec![TableTopic::table("reviews")],
            Badge::PendingCorporate => vec![TableTopic::table("users")],
            Badge::PendingDamageReports => vec![TableTopic::table("damage_reports")],
            Badge::PendingShareRequests => vec![TableTopic::table("social_share_requests")],
            Badge::PendingPurchases => vec![TableTopic::table("listing_purchase_requests")],
            Badge::BlockedUsers => vec![TableTopic::filtered("users", "is_blocked=eq.true")],
        }
    }

    /// Badges that a change on `topic` makes stale.
    pub fn affected_by(topic: &TableTopic) -> Vec<Badge> {
        Badge::ALL
            .iter()
            .copied()
            .filter(|b| b.topics().iter().any(|t| t.table == topic.table))
            .collect()
    }

    pub async fn count(&self, db: &DatabaseConnection) -> Result<u64, DbErr> {
        match self {
            Badge::PendingListings => {
                car_listings::Entity::find()
                    .filter(car_listings::Column::Status.eq("pending"))
                    .count(db)
                    .await
            }
            Badge::PendingReports => {
                let listing = listing_reports::Entity::find()
                    .filter(listing_reports::Column::Status.eq("pending"))
                    .count(db)
                    .await?;
                let message = message_reports::Entity::find()
                    .filter(message_reports::Column::Status.eq("pending"))
                    .count(db)
                    .await?;
                let admin = admin_reports::Entity::find()
                    .filter(admin_reports::Column::Status.eq("pending"))
                    .count(db)
                    .await?;
                Ok(listing + message + admin)
            }
            Badge::PendingReviews => {
                reviews::Entity::find()
                    .filter(reviews::Column::Status.eq("pending"))
                    .count(db)
                    .await
            }
            Badge::PendingCorporate => {
                users::Entity::find()
                    .filter(users::Column::UserType.eq("corporate"))
                    .filter(users::Column::CorporateStatus.eq("pending"))
                    .count(db)
                    .await
            }
            Badge::PendingDamageReports => {
                damage_reports::Entity::find()
                    .filter(damage_reports::Column::Status.eq("pending"))
                    .count(db)
                    .await
            }
            Badge::PendingShareRequests => {
                social_share_requests::Entity::find()
                    .filter(social_share_requests::Column::Status.eq("pending"))
                    .count(db)
                    .await
            }
            Badge::PendingPurchases => {
                listing_purchase_requests::Entity::find()
                    .filter(listing_purchase_requests::Column::Status.eq("pending"))
                    .count(db)
                    .await
            }
            Badge::BlockedUsers => {
                users::Entity::find()
                    .filter(users::Column::IsBlocked.eq(true))
                    .count(db)
                    .await
            }
        }
    }
}

/// One unfiltered topic per backing table. A change under any filter of a
/// table also arrives on its unfiltered topic, so every row change refreshes
/// the dashboard once.
pub fn topics() -> Vec<TableTopic> {
    let mut topics: Vec<TableTopic> = Vec::new();
    for topic in Badge::ALL.iter().flat_map(|b| b.topics()) {
        if !topics.iter().any(|t| t.table == topic.table) {
            topics.push(TableTopic::table(&topic.table));
        }
    }
    topics
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BadgeCount {
    pub badge: Badge,
    /// None when the count could not be loaded.
    pub count: Option<u64>,
}

/// Counts the given badges concurrently.
pub async fn count_badges(db: &DatabaseConnection, badges: &[Badge]) -> Vec<BadgeCount> {
    join_all(badges.iter().map(|badge| async move {
        let count = match badge.count(db).await {
            Ok(n) => Some(n),
            Err(e) => {
                log::error!("Failed to count {:?}: {}", badge, e);
                None
            }
        };
        BadgeCount {
            badge: *badge,
            count,
        }
    }))
    .await
}

pub async fn counts(db: &DatabaseConnection) -> Vec<BadgeCount> {
    count_badges(db, &Badge::ALL).await
}
