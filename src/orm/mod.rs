//! SeaORM entities for the marketplace collections the back-office reads.

pub mod admin_credentials;
pub mod admin_reports;
pub mod car_listings;
pub mod corporate_documents;
pub mod damage_reports;
pub mod listing_purchase_requests;
pub mod listing_reports;
pub mod message_reports;
pub mod messages;
pub mod reviews;
pub mod social_share_requests;
pub mod users;
pub mod verification_codes;
