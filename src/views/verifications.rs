//! Outstanding verification codes, and resending them.

use super::{any_contains, load_people, needle, person, person_matches, ViewListing};
use crate::error::ActionError;
use crate::moderation::report::Person;
use crate::notice::Notice;
use crate::orm::{users, verification_codes};
use crate::processing::ProcessingMarker;
use crate::realtime::TableTopic;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifetime of a freshly issued code.
pub const CODE_TTL_MINUTES: i64 = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Phone,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Phone => "phone",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VerificationFilter {
    pub search: String,
    pub channel: Option<Channel>,
    /// Include used codes.
    pub include_used: bool,
}

/// A code as shown to admins. The code itself is never sent to the UI.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VerificationRow {
    pub id: Uuid,
    pub user: Person,
    pub channel: String,
    pub target: String,
    pub used: bool,
    pub expired: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl VerificationRow {
    fn new(code: verification_codes::Model, user: Person, now: DateTime<Utc>) -> Self {
        let expires_at = code.expires_at.with_timezone(&Utc);
        Self {
            id: code.id,
            user,
            channel: code.channel,
            target: code.target,
            used: code.used,
            expired: expires_at <= now,
            expires_at,
            created_at: code.created_at.with_timezone(&Utc),
        }
    }

    pub fn matches(&self, search: &str) -> bool {
        match needle(search) {
            Some(n) => any_contains(&n, [Some(self.target.as_str())]) || person_matches(&self.user, &n),
            None => true,
        }
    }
}

pub fn topics() -> Vec<TableTopic> {
    vec![TableTopic::table("verification_codes")]
}

pub async fn load(
    db: &DatabaseConnection,
    filter: &VerificationFilter,
    limit: u64,
) -> Result<ViewListing<VerificationRow>, ActionError> {
    let mut query = verification_codes::Entity::find();
    if let Some(channel) = filter.channel {
        query = query.filter(verification_codes::Column::Channel.eq(channel.as_str()));
    }
    if !filter.include_used {
        query = query.filter(verification_codes::Column::Used.eq(false));
    }

    let found = query
        .order_by_desc(verification_codes::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?;
    let people = load_people(db, found.iter().map(|c| c.user_id)).await?;

    let now = Utc::now();
    let rows = found
        .into_iter()
        .map(|c| {
            let user = person(&people, c.user_id);
            VerificationRow::new(c, user, now)
        })
        .collect();

    Ok(ViewListing::filtered(rows, |r| r.matches(&filter.search)))
}

/// Six random digits.
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

/// Issues a new code for `user_id` and mails it, invalidating older ones.
pub async fn resend(
    db: &DatabaseConnection,
    processing: &ProcessingMarker,
    user_id: Uuid,
    channel: Channel,
) -> Result<Notice, ActionError> {
    if channel == Channel::Phone {
        return Err(ActionError::validation(
            "Phone codes can only be resent by the user from the app.",
        ));
    }

    let _guard = processing
        .try_begin(ProcessingMarker::key("verification", user_id))
        .ok_or(ActionError::InProgress)?;

    let user = users::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(ActionError::NotFound("User"))?;
    if user.email_verified {
        return Err(ActionError::validation("This email address is already verified."));
    }

    verification_codes::Entity::update_many()
        .col_expr(verification_codes::Column::Used, Expr::value(true))
        .filter(verification_codes::Column::UserId.eq(user_id))
        .filter(verification_codes::Column::Channel.eq(channel.as_str()))
        .filter(verification_codes::Column::Used.eq(false))
        .exec(db)
        .await?;

    let now = Utc::now();
    let code = generate_code();
    verification_codes::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        channel: Set(channel.as_str().to_string()),
        target: Set(user.email.clone()),
        code: Set(code.clone()),
        used: Set(false),
        expires_at: Set((now + Duration::minutes(CODE_TTL_MINUTES)).into()),
        created_at: Set(now.into()),
    }
    .insert(db)
    .await?;

    let message = format!(
        "Your verification code is {}. It expires in {} minutes.",
        code, CODE_TTL_MINUTES
    );
    crate::email::templates::send_user_notification(
        &user.email,
        &user.display_name(),
        "Your verification code",
        &message,
    )
    .await
    .map_err(|e| ActionError::Remote(e.to_string()))?;

    log::info!("Resent {} verification code to user {}", channel.as_str(), user_id);
    Ok(Notice::success("Verification code resent."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbBackend, MockDatabase};

    fn row(expires_in: i64) -> VerificationRow {
        let now = Utc::now();
        let code = verification_codes::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            channel: "email".to_string(),
            target: "zeynep@example.com".to_string(),
            code: "123456".to_string(),
            used: false,
            expires_at: (now + Duration::minutes(expires_in)).into(),
            created_at: now.into(),
        };
        let user = Person {
            id: code.user_id,
            name: Some("Zeynep".to_string()),
            email: Some(code.target.clone()),
        };
        VerificationRow::new(code, user, now)
    }

    #[test]
    fn test_expired_flag() {
        assert!(!row(10).expired);
        assert!(row(-1).expired);
    }

    #[test]
    fn test_code_is_not_serialized() {
        let json = serde_json::to_string(&row(10)).unwrap();
        assert!(!json.contains("123456"));
        assert!(json.contains("zeynep@example.com"));
    }

    #[test]
    fn test_generated_code_shape() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[actix_rt::test]
    async fn test_phone_resend_is_refused_before_any_query() {
        let db = MockDatabase::new(DbBackend::Postgres).into_connection();
        let marker = ProcessingMarker::new();
        let result = resend(&db, &marker, Uuid::new_v4(), Channel::Phone).await;
        assert!(matches!(result, Err(ActionError::Validation(_))));
        assert!(marker.is_empty());
        assert!(db.into_transaction_log().is_empty());
    }
}
