//! SeaORM Entity for users table

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email_verified: bool,
    pub phone_verified: bool,
    /// "individual" or "corporate"
    pub user_type: String,
    /// Corporate approval state: "pending", "approved", "rejected"
    pub corporate_status: Option<String>,
    pub company_name: Option<String>,
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    /// None while blocked means indefinitely.
    pub blocked_until: Option<DateTimeWithTimeZone>,
    pub two_factor_enabled: bool,
    pub listing_quota: i32,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::car_listings::Entity")]
    Listings,
}

impl Related<super::car_listings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Listings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Name shown in admin tables, falling back to the email address.
    pub fn display_name(&self) -> String {
        self.full_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.email.clone())
    }
}
