//! Admin accounts. Password hashes and TOTP secrets never leave this module.

use super::{any_contains, needle, ViewListing};
use crate::error::ActionError;
use crate::orm::admin_credentials;
use crate::realtime::TableTopic;
use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AdminFilter {
    pub search: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AdminRow {
    pub id: Uuid,
    pub username: String,
    pub has_2fa: bool,
    pub created_at: DateTime<Utc>,
}

impl From<admin_credentials::Model> for AdminRow {
    fn from(m: admin_credentials::Model) -> Self {
        Self {
            id: m.id,
            username: m.username,
            has_2fa: m.totp_secret.map(|s| !s.is_empty()).unwrap_or(false),
            created_at: m.created_at.with_timezone(&Utc),
        }
    }
}

pub fn topics() -> Vec<TableTopic> {
    vec![TableTopic::table("admin_credentials")]
}

pub async fn load(
    db: &DatabaseConnection,
    filter: &AdminFilter,
    limit: u64,
) -> Result<ViewListing<AdminRow>, ActionError> {
    let rows = admin_credentials::Entity::find()
        .order_by_asc(admin_credentials::Column::Username)
        .limit(limit)
        .all(db)
        .await?
        .into_iter()
        .map(AdminRow::from)
        .collect();

    let needle = needle(&filter.search);
    Ok(ViewListing::filtered(rows, |r: &AdminRow| match &needle {
        Some(n) => any_contains(n, [Some(r.username.as_str())]),
        None => true,
    }))
}
