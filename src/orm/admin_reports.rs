//! SeaORM Entity for admin_reports table
//!
//! Reports filed by an admin against a listing. The filing admin is the reporter.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "admin_reports")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub listing_id: Uuid,
    pub admin_id: Uuid,
    pub reason: String,
    pub details: Option<String>,
    pub status: String,
    pub resolution_notes: Option<String>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::car_listings::Entity",
        from = "Column::ListingId",
        to = "super::car_listings::Column::Id"
    )]
    Listing,
    #[sea_orm(
        belongs_to = "super::admin_credentials::Entity",
        from = "Column::AdminId",
        to = "super::admin_credentials::Column::Id"
    )]
    Admin,
}

impl ActiveModelBehavior for ActiveModel {}
