//! Single-call admin actions.
//!
//! Every action validates its input locally, takes the processing marker for
//! its entity and then issues exactly one stored-procedure call. Lists are not
//! patched optimistically; views pick up the new state through their live
//! subscription or the next fetch.

use crate::error::ActionError;
use crate::notice::Notice;
use crate::notify::{notify_best_effort, Notifier, UserNotification};
use crate::processing::ProcessingMarker;
use crate::rpc::{Params, Procedure, Rpc};
use crate::session::AdminContext;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub const MIN_PURCHASE_SLOTS: i32 = 1;
pub const MAX_PURCHASE_SLOTS: i32 = 100;

#[derive(Clone, Debug, PartialEq)]
pub enum AdminAction {
    ApproveListing {
        listing_id: Uuid,
    },
    RejectListing {
        listing_id: Uuid,
        owner_id: Uuid,
        reason: String,
    },
    DeleteListing {
        listing_id: Uuid,
    },
    ApproveReview {
        review_id: Uuid,
    },
    RejectReview {
        review_id: Uuid,
    },
    DeleteReview {
        review_id: Uuid,
    },
    ApproveCorporate {
        user_id: Uuid,
    },
    RejectCorporate {
        user_id: Uuid,
        reason: String,
    },
    BlockUser {
        user_id: Uuid,
        reason: String,
        until: Option<DateTime<Utc>>,
    },
    UnblockUser {
        user_id: Uuid,
    },
    DeleteMessage {
        message_id: Uuid,
    },
    CreateAdmin {
        username: String,
        password_hash: String,
        totp_secret: Option<String>,
    },
    DeleteAdmin {
        target_admin_id: Uuid,
    },
    PurchaseSlots {
        user_id: Uuid,
        slots: i32,
    },
    ApprovePurchase {
        request_id: Uuid,
    },
    RejectPurchase {
        request_id: Uuid,
        reason: String,
    },
}

fn require_text(value: &str, message: &str) -> Result<(), ActionError> {
    if value.trim().is_empty() {
        Err(ActionError::validation(message))
    } else {
        Ok(())
    }
}

impl AdminAction {
    /// Key of the processing marker this action holds while in flight.
    pub fn entity_key(&self) -> String {
        match self {
            Self::ApproveListing { listing_id }
            | Self::RejectListing { listing_id, .. }
            | Self::DeleteListing { listing_id } => ProcessingMarker::key("listing", *listing_id),
            Self::ApproveReview { review_id }
            | Self::RejectReview { review_id }
            | Self::DeleteReview { review_id } => ProcessingMarker::key("review", *review_id),
            Self::ApproveCorporate { user_id }
            | Self::RejectCorporate { user_id, .. }
            | Self::BlockUser { user_id, .. }
            | Self::UnblockUser { user_id }
            | Self::PurchaseSlots { user_id, .. } => ProcessingMarker::key("user", *user_id),
            Self::DeleteMessage { message_id } => ProcessingMarker::key("message", *message_id),
            Self::CreateAdmin { username, .. } => format!("admin:{}", username.to_lowercase()),
            Self::DeleteAdmin { target_admin_id } => ProcessingMarker::key("admin", *target_admin_id),
            Self::ApprovePurchase { request_id } | Self::RejectPurchase { request_id, .. } => {
                ProcessingMarker::key("purchase", *request_id)
            }
        }
    }

    pub fn procedure(&self) -> Procedure {
        match self {
            Self::ApproveListing { .. } | Self::RejectListing { .. } => {
                Procedure::UpdateListingStatus
            }
            Self::DeleteListing { .. } => Procedure::DeleteListing,
            Self::ApproveReview { .. } | Self::RejectReview { .. } => Procedure::UpdateReviewStatus,
            Self::DeleteReview { .. } => Procedure::DeleteReview,
            Self::ApproveCorporate { .. } => Procedure::ApproveCorporateUser,
            Self::RejectCorporate { .. } => Procedure::RejectCorporateUser,
            Self::BlockUser { .. } => Procedure::BlockUser,
            Self::UnblockUser { .. } => Procedure::UnblockUser,
            Self::DeleteMessage { .. } => Procedure::DeleteMessage,
            Self::CreateAdmin { .. } => Procedure::CreateAdmin,
            Self::DeleteAdmin { .. } => Procedure::DeleteAdmin,
            Self::PurchaseSlots { .. } => Procedure::PurchaseListingSlots,
            Self::ApprovePurchase { .. } => Procedure::ApprovePurchaseRequest,
            Self::RejectPurchase { .. } => Procedure::RejectPurchaseRequest,
        }
    }

    /// Named procedure arguments. The acting admin is always attached.
    pub fn params(&self, admin: &AdminContext) -> Params {
        let p = Params::new();
        match self {
            Self::ApproveListing { listing_id } => p
                .uuid("p_listing_id", *listing_id)
                .uuid("p_admin_id", admin.admin_id)
                .text("p_status", "approved")
                .opt_text("p_reason", None),
            Self::RejectListing {
                listing_id, reason, ..
            } => p
                .uuid("p_listing_id", *listing_id)
                .uuid("p_admin_id", admin.admin_id)
                .text("p_status", "rejected")
                .opt_text("p_reason", Some(reason.trim().to_string())),
            Self::DeleteListing { listing_id } => p
                .uuid("p_listing_id", *listing_id)
                .uuid("p_admin_id", admin.admin_id),
            Self::ApproveReview { review_id } => p
                .uuid("p_review_id", *review_id)
                .uuid("p_admin_id", admin.admin_id)
                .text("p_status", "approved"),
            Self::RejectReview { review_id } => p
                .uuid("p_review_id", *review_id)
                .uuid("p_admin_id", admin.admin_id)
                .text("p_status", "rejected"),
            Self::DeleteReview { review_id } => p
                .uuid("p_review_id", *review_id)
                .uuid("p_admin_id", admin.admin_id),
            Self::ApproveCorporate { user_id } => p
                .uuid("p_user_id", *user_id)
                .uuid("p_admin_id", admin.admin_id),
            Self::RejectCorporate { user_id, reason } => p
                .uuid("p_user_id", *user_id)
                .uuid("p_admin_id", admin.admin_id)
                .text("p_reason", reason.trim()),
            Self::BlockUser {
                user_id,
                reason,
                until,
            } => p
                .uuid("p_user_id", *user_id)
                .uuid("p_admin_id", admin.admin_id)
                .text("p_reason", reason.trim())
                .timestamp("p_blocked_until", *until),
            Self::UnblockUser { user_id } => p
                .uuid("p_user_id", *user_id)
                .uuid("p_admin_id", admin.admin_id),
            Self::DeleteMessage { message_id } => p
                .uuid("p_message_id", *message_id)
                .uuid("p_admin_id", admin.admin_id),
            Self::CreateAdmin {
                username,
                password_hash,
                totp_secret,
            } => p
                .uuid("p_admin_id", admin.admin_id)
                .text("p_username", username.trim())
                .text("p_password_hash", password_hash.as_str())
                .opt_text("p_totp_secret", totp_secret.clone()),
            Self::DeleteAdmin { target_admin_id } => p
                .uuid("p_admin_id", admin.admin_id)
                .uuid("p_target_admin_id", *target_admin_id),
            Self::PurchaseSlots { user_id, slots } => p
                .uuid("p_user_id", *user_id)
                .uuid("p_admin_id", admin.admin_id)
                .int("p_slots", *slots),
            Self::ApprovePurchase { request_id } => p
                .uuid("p_request_id", *request_id)
                .uuid("p_admin_id", admin.admin_id),
            Self::RejectPurchase { request_id, reason } => p
                .uuid("p_request_id", *request_id)
                .uuid("p_admin_id", admin.admin_id)
                .text("p_reason", reason.trim()),
        }
    }

    /// Local checks. A failure here means nothing is sent upstream.
    pub fn validate(&self, admin: &AdminContext) -> Result<(), ActionError> {
        match self {
            Self::RejectListing { reason, .. } => {
                require_text(reason, "A rejection reason is required.")
            }
            Self::RejectCorporate { reason, .. } => {
                require_text(reason, "A rejection reason is required.")
            }
            Self::RejectPurchase { reason, .. } => {
                require_text(reason, "A rejection reason is required.")
            }
            Self::BlockUser { reason, until, .. } => {
                require_text(reason, "A block reason is required.")?;
                match until {
                    Some(until) if *until <= Utc::now() => Err(ActionError::validation(
                        "The block end date must be in the future.",
                    )),
                    _ => Ok(()),
                }
            }
            Self::CreateAdmin {
                username,
                password_hash,
                ..
            } => {
                let len = username.trim().chars().count();
                if !(3..=64).contains(&len) {
                    return Err(ActionError::validation(
                        "Usernames must be between 3 and 64 characters.",
                    ));
                }
                require_text(password_hash, "A password is required.")
            }
            Self::DeleteAdmin { target_admin_id } => {
                if *target_admin_id == admin.admin_id {
                    Err(ActionError::validation("You cannot delete your own account."))
                } else {
                    Ok(())
                }
            }
            Self::PurchaseSlots { slots, .. } => {
                if (MIN_PURCHASE_SLOTS..=MAX_PURCHASE_SLOTS).contains(slots) {
                    Ok(())
                } else {
                    Err(ActionError::Validation(format!(
                        "Slot count must be between {} and {}.",
                        MIN_PURCHASE_SLOTS, MAX_PURCHASE_SLOTS
                    )))
                }
            }
            _ => Ok(()),
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            Self::ApproveListing { .. } => "Listing approved.",
            Self::RejectListing { .. } => "Listing rejected.",
            Self::DeleteListing { .. } => "Listing deleted.",
            Self::ApproveReview { .. } => "Review approved.",
            Self::RejectReview { .. } => "Review rejected.",
            Self::DeleteReview { .. } => "Review deleted.",
            Self::ApproveCorporate { .. } => "Corporate account approved.",
            Self::RejectCorporate { .. } => "Corporate account rejected.",
            Self::BlockUser { .. } => "User blocked.",
            Self::UnblockUser { .. } => "User unblocked.",
            Self::DeleteMessage { .. } => "Message deleted.",
            Self::CreateAdmin { .. } => "Admin created.",
            Self::DeleteAdmin { .. } => "Admin deleted.",
            Self::PurchaseSlots { .. } => "Listing slots added.",
            Self::ApprovePurchase { .. } => "Purchase request approved.",
            Self::RejectPurchase { .. } => "Purchase request rejected.",
        }
    }

    /// Email sent to the affected user once the action has succeeded.
    pub fn notification(&self) -> Option<UserNotification> {
        let (user_id, subject, message) = match self {
            Self::BlockUser {
                user_id,
                reason,
                until,
            } => {
                let message = match until {
                    Some(until) => format!(
                        "Your account has been blocked until {}. Reason: {}",
                        until.format("%Y-%m-%d %H:%M UTC"),
                        reason.trim()
                    ),
                    None => format!("Your account has been blocked. Reason: {}", reason.trim()),
                };
                (*user_id, "Your account has been blocked", message)
            }
            Self::ApproveCorporate { user_id } => (
                *user_id,
                "Corporate account approved",
                "Your corporate account has been approved. You can now publish listings as a company."
                    .to_string(),
            ),
            Self::RejectCorporate { user_id, reason } => (
                *user_id,
                "Corporate account rejected",
                format!(
                    "Your corporate account application was rejected. Reason: {}",
                    reason.trim()
                ),
            ),
            Self::RejectListing {
                owner_id, reason, ..
            } => (
                *owner_id,
                "Listing rejected",
                format!("One of your listings was rejected. Reason: {}", reason.trim()),
            ),
            _ => return None,
        };

        Some(UserNotification {
            user_id,
            subject: subject.to_string(),
            message,
        })
    }
}

/// Runs admin actions against the stored procedures.
#[derive(Clone)]
pub struct ActionDispatcher {
    rpc: Arc<dyn Rpc>,
    notifier: Arc<dyn Notifier>,
    processing: ProcessingMarker,
}

impl ActionDispatcher {
    pub fn new(rpc: Arc<dyn Rpc>, notifier: Arc<dyn Notifier>, processing: ProcessingMarker) -> Self {
        Self {
            rpc,
            notifier,
            processing,
        }
    }

    pub fn processing(&self) -> &ProcessingMarker {
        &self.processing
    }

    pub fn rpc(&self) -> &Arc<dyn Rpc> {
        &self.rpc
    }

    pub async fn dispatch(
        &self,
        admin: &AdminContext,
        action: AdminAction,
    ) -> Result<Notice, ActionError> {
        action.validate(admin)?;

        let _guard = self
            .processing
            .try_begin(action.entity_key())
            .ok_or(ActionError::InProgress)?;

        let procedure = action.procedure();
        self.rpc
            .call(procedure, action.params(admin))
            .await
            .map_err(|e| {
                log::error!(
                    "{} by admin {} failed: {}",
                    procedure,
                    admin.admin_id,
                    e
                );
                ActionError::from(e)
            })?;

        log::info!(
            "Admin {} ran {} on {}",
            admin.username,
            procedure,
            action.entity_key()
        );

        if let Some(notification) = action.notification() {
            notify_best_effort(self.notifier.as_ref(), notification).await;
        }

        Ok(Notice::success(action.success_message()))
    }
}
