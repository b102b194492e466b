//! Remote procedure calls into the hosted database.
//!
//! State transitions (report resolution, blocking, approvals, deletions) are
//! owned by stored procedures. This module names them, carries their named
//! arguments and defines the seam the rest of the crate calls through.

mod postgres;

pub use postgres::PgRpc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use uuid::Uuid;

/// Every stored procedure the back-office invokes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Procedure {
    ProcessListingReport,
    ProcessMessageReport,
    ProcessAdminReport,
    BlockUser,
    UnblockUser,
    UpdateListingStatus,
    DeleteListing,
    DeleteMessage,
    UpdateReviewStatus,
    DeleteReview,
    ApproveCorporateUser,
    RejectCorporateUser,
    CreateAdmin,
    DeleteAdmin,
    PurchaseListingSlots,
    ApprovePurchaseRequest,
    RejectPurchaseRequest,
}

impl Procedure {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProcessListingReport => "process_listing_report",
            Self::ProcessMessageReport => "process_message_report",
            Self::ProcessAdminReport => "process_admin_report",
            Self::BlockUser => "block_user",
            Self::UnblockUser => "unblock_user",
            Self::UpdateListingStatus => "update_listing_status",
            Self::DeleteListing => "delete_listing",
            Self::DeleteMessage => "delete_message",
            Self::UpdateReviewStatus => "update_review_status",
            Self::DeleteReview => "delete_review",
            Self::ApproveCorporateUser => "approve_corporate_user",
            Self::RejectCorporateUser => "reject_corporate_user",
            Self::CreateAdmin => "create_admin",
            Self::DeleteAdmin => "delete_admin",
            Self::PurchaseListingSlots => "purchase_listing_slots",
            Self::ApprovePurchaseRequest => "approve_purchase_request",
            Self::RejectPurchaseRequest => "reject_purchase_request",
        }
    }
}

impl std::fmt::Display for Procedure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed procedure argument.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Uuid(Uuid),
    Text(String),
    OptText(Option<String>),
    Int(i32),
    Timestamp(Option<DateTime<Utc>>),
}

impl Arg {
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Arg::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Arg::Text(s) => Some(s),
            Arg::OptText(s) => s.as_deref(),
            _ => None,
        }
    }
}

impl From<Arg> for sea_orm::Value {
    fn from(arg: Arg) -> Self {
        match arg {
            Arg::Uuid(u) => u.into(),
            Arg::Text(s) => s.into(),
            Arg::OptText(s) => s.into(),
            Arg::Int(i) => i.into(),
            Arg::Timestamp(t) => t.into(),
        }
    }
}

/// Named arguments, in call order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params(Vec<(&'static str, Arg)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uuid(mut self, name: &'static str, value: Uuid) -> Self {
        self.0.push((name, Arg::Uuid(value)));
        self
    }

    pub fn text(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.0.push((name, Arg::Text(value.into())));
        self
    }

    pub fn opt_text(mut self, name: &'static str, value: Option<String>) -> Self {
        self.0.push((name, Arg::OptText(value)));
        self
    }

    pub fn int(mut self, name: &'static str, value: i32) -> Self {
        self.0.push((name, Arg::Int(value)));
        self
    }

    pub fn timestamp(mut self, name: &'static str, value: Option<DateTime<Utc>>) -> Self {
        self.0.push((name, Arg::Timestamp(value)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.0.iter().find(|(n, _)| *n == name).map(|(_, a)| a)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, Arg)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<(&'static str, Arg)> {
        self.0
    }
}

#[derive(Debug)]
pub enum RpcError {
    /// Connection or SQL error.
    Database(DbErr),
    /// The procedure ran and reported failure in its result.
    Rejected(String),
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::Database(e) => write!(f, "Database error: {}", e),
            RpcError::Rejected(msg) => write!(f, "Procedure rejected call: {}", msg),
        }
    }
}

impl std::error::Error for RpcError {}

impl From<DbErr> for RpcError {
    fn from(e: DbErr) -> Self {
        RpcError::Database(e)
    }
}

/// Seam to the stored procedures.
#[async_trait]
pub trait Rpc: Send + Sync {
    async fn call(&self, procedure: Procedure, params: Params)
        -> Result<serde_json::Value, RpcError>;
}

/// Interpret a raw procedure result.
///
/// Procedures return nothing, a scalar, or a JSON object. An object carrying
/// `"success": false` is a rejection; its `error` or `message` explains why.
pub fn interpret_result(raw: Option<String>) -> Result<serde_json::Value, RpcError> {
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Ok(serde_json::Value::Null),
    };

    let value = serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw));

    if value.get("success").and_then(|s| s.as_bool()) == Some(false) {
        let reason = value
            .get("error")
            .or_else(|| value.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or("unspecified")
            .to_string();
        return Err(RpcError::Rejected(reason));
    }

    Ok(value)
}
