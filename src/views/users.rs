//! User directory.

use super::{any_contains, needle, ViewListing};
use crate::error::ActionError;
use crate::orm::users;
use crate::realtime::TableTopic;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    EmailVerified,
    PhoneVerified,
    FullyVerified,
    Unverified,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UserFilter {
    pub search: String,
    /// `individual` or `corporate`
    pub user_type: Option<String>,
    pub blocked: Option<bool>,
    pub verification: Option<VerificationState>,
}

impl UserFilter {
    pub fn matches(&self, user: &users::Model) -> bool {
        if let Some(state) = self.verification {
            let ok = match state {
                VerificationState::EmailVerified => user.email_verified,
                VerificationState::PhoneVerified => user.phone_verified,
                VerificationState::FullyVerified => user.email_verified && user.phone_verified,
                VerificationState::Unverified => !user.email_verified && !user.phone_verified,
            };
            if !ok {
                return false;
            }
        }

        match needle(&self.search) {
            Some(n) => any_contains(
                &n,
                [
                    Some(user.email.as_str()),
                    user.full_name.as_deref(),
                    user.phone.as_deref(),
                    user.company_name.as_deref(),
                ],
            ),
            None => true,
        }
    }
}

pub fn topics() -> Vec<TableTopic> {
    vec![TableTopic::table("users")]
}

pub async fn load(
    db: &DatabaseConnection,
    filter: &UserFilter,
    limit: u64,
) -> Result<ViewListing<users::Model>, ActionError> {
    let mut query = users::Entity::find();
    if let Some(user_type) = filter.user_type.as_deref().filter(|t| !t.is_empty()) {
        query = query.filter(users::Column::UserType.eq(user_type));
    }
    if let Some(blocked) = filter.blocked {
        query = query.filter(users::Column::IsBlocked.eq(blocked));
    }

    let rows = query
        .order_by_desc(users::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?;

    Ok(ViewListing::filtered(rows, |u| filter.matches(u)))
}
