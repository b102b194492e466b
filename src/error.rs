//! Errors surfaced by admin actions and list views.
//!
//! The `Display` impl is for logs. Admins only ever see `user_message()`,
//! which is short and generic; remote error details stay in the log.

use crate::rpc::RpcError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::DbErr;
use serde::Serialize;

#[derive(Debug)]
pub enum ActionError {
    /// No valid admin session accompanies the action.
    NotAuthenticated,
    /// Client-side validation failed; nothing was sent upstream.
    Validation(String),
    /// The same entity already has an action in flight from this server.
    InProgress,
    /// The report (or other queue item) was already resolved.
    NotPending,
    NotFound(&'static str),
    /// Database, network or procedure failure.
    Remote(String),
}

impl ActionError {
    /// Short message shown to the admin.
    pub fn user_message(&self) -> String {
        match self {
            ActionError::NotAuthenticated => "Your admin session has expired. Please log in again.".to_string(),
            ActionError::Validation(msg) => msg.clone(),
            ActionError::InProgress => "This item is already being processed.".to_string(),
            ActionError::NotPending => "This item has already been resolved.".to_string(),
            ActionError::NotFound(what) => format!("{} not found.", what),
            ActionError::Remote(_) => "The operation failed. Please try again.".to_string(),
        }
    }

    pub fn validation(msg: &str) -> Self {
        ActionError::Validation(msg.to_string())
    }
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionError::NotAuthenticated => write!(f, "admin session missing"),
            ActionError::Validation(msg) => write!(f, "validation failed: {}", msg),
            ActionError::InProgress => write!(f, "action already in progress"),
            ActionError::NotPending => write!(f, "item is not pending"),
            ActionError::NotFound(what) => write!(f, "{} not found", what),
            ActionError::Remote(msg) => write!(f, "remote call failed: {}", msg),
        }
    }
}

impl std::error::Error for ActionError {}

impl From<RpcError> for ActionError {
    fn from(e: RpcError) -> Self {
        ActionError::Remote(e.to_string())
    }
}

impl From<DbErr> for ActionError {
    fn from(e: DbErr) -> Self {
        ActionError::Remote(e.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for ActionError {
    fn status_code(&self) -> StatusCode {
        match self {
            ActionError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ActionError::Validation(_) => StatusCode::BAD_REQUEST,
            ActionError::InProgress | ActionError::NotPending => StatusCode::CONFLICT,
            ActionError::NotFound(_) => StatusCode::NOT_FOUND,
            ActionError::Remote(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ActionError::Remote(detail) = self {
            log::error!("Admin action failed: {}", detail);
        }
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.user_message(),
        })
    }
}
