//! Single-call admin actions and queue decisions
//!
//! Every handler builds an `AdminAction` (or a queue decision) from its path
//! and body and hands it to the dispatcher. Responses only carry notices; the
//! lists update through their live subscription.

use super::ActionResponse;
use crate::dispatch::{ActionDispatcher, AdminAction};
use crate::error::ActionError;
use crate::middleware::AdminCtx;
use crate::session::{generate_totp_secret, hash_password, AdminContext};
use crate::views::verifications::Channel;
use crate::views::{damage_reports, listings, share_requests, verifications, Decision};
use actix_web::{delete, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(approve_listing)
        .service(reject_listing)
        .service(delete_listing)
        .service(approve_review)
        .service(reject_review)
        .service(delete_review)
        .service(approve_corporate)
        .service(reject_corporate)
        .service(block_user)
        .service(unblock_user)
        .service(purchase_slots)
        .service(delete_message)
        .service(create_admin)
        .service(delete_admin)
        .service(approve_purchase)
        .service(reject_purchase)
        .service(decide_share_request)
        .service(decide_damage_report)
        .service(resend_verification);
}

#[derive(Deserialize)]
pub struct ReasonBody {
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
pub struct BlockBody {
    #[serde(default)]
    reason: String,
    /// Omitted for a permanent block.
    until: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct SlotsBody {
    slots: i32,
}

#[derive(Deserialize, Validate)]
pub struct CreateAdminBody {
    #[validate(length(min = 3, max = 64))]
    username: String,
    #[validate(length(min = 8, max = 1000))]
    password: String,
    #[serde(default)]
    enable_2fa: bool,
}

#[derive(Serialize)]
pub struct CreatedAdmin {
    #[serde(flatten)]
    response: ActionResponse,
    /// Shown once so the new admin can enroll their authenticator.
    totp_secret: Option<String>,
}

#[derive(Deserialize)]
pub struct NotesBody {
    notes: Option<String>,
}

#[derive(Deserialize)]
pub struct ResendBody {
    #[serde(default = "default_channel")]
    channel: Channel,
}

fn default_channel() -> Channel {
    Channel::Email
}

async fn run(
    dispatcher: &ActionDispatcher,
    admin: &AdminContext,
    action: AdminAction,
) -> Result<HttpResponse, ActionError> {
    let notice = dispatcher.dispatch(admin, action).await?;
    Ok(HttpResponse::Ok().json(ActionResponse::from(notice)))
}

#[post("/admin/api/listings/{id}/approve")]
pub async fn approve_listing(
    admin: AdminCtx,
    dispatcher: web::Data<ActionDispatcher>,
    listing_id: web::Path<Uuid>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let action = AdminAction::ApproveListing {
        listing_id: listing_id.into_inner(),
    };
    run(&dispatcher, admin, action).await
}

#[post("/admin/api/listings/{id}/reject")]
pub async fn reject_listing(
    admin: AdminCtx,
    db: web::Data<DatabaseConnection>,
    dispatcher: web::Data<ActionDispatcher>,
    listing_id: web::Path<Uuid>,
    body: web::Json<ReasonBody>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let listing_id = listing_id.into_inner();
    if body.reason.trim().is_empty() {
        return Err(ActionError::validation("Please give a reason for the rejection."));
    }

    let owner_id = listings::owner_of(&db, listing_id).await?;
    let action = AdminAction::RejectListing {
        listing_id,
        owner_id,
        reason: body.into_inner().reason,
    };
    run(&dispatcher, admin, action).await
}

#[delete("/admin/api/listings/{id}")]
pub async fn delete_listing(
    admin: AdminCtx,
    dispatcher: web::Data<ActionDispatcher>,
    listing_id: web::Path<Uuid>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let action = AdminAction::DeleteListing {
        listing_id: listing_id.into_inner(),
    };
    run(&dispatcher, admin, action).await
}

#[post("/admin/api/reviews/{id}/approve")]
pub async fn approve_review(
    admin: AdminCtx,
    dispatcher: web::Data<ActionDispatcher>,
    review_id: web::Path<Uuid>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let action = AdminAction::ApproveReview {
        review_id: review_id.into_inner(),
    };
    run(&dispatcher, admin, action).await
}

#[post("/admin/api/reviews/{id}/reject")]
pub async fn reject_review(
    admin: AdminCtx,
    dispatcher: web::Data<ActionDispatcher>,
    review_id: web::Path<Uuid>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let action = AdminAction::RejectReview {
        review_id: review_id.into_inner(),
    };
    run(&dispatcher, admin, action).await
}

#[delete("/admin/api/reviews/{id}")]
pub async fn delete_review(
    admin: AdminCtx,
    dispatcher: web::Data<ActionDispatcher>,
    review_id: web::Path<Uuid>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let action = AdminAction::DeleteReview {
        review_id: review_id.into_inner(),
    };
    run(&dispatcher, admin, action).await
}

#[post("/admin/api/users/{id}/corporate/approve")]
pub async fn approve_corporate(
    admin: AdminCtx,
    dispatcher: web::Data<ActionDispatcher>,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let action = AdminAction::ApproveCorporate {
        user_id: user_id.into_inner(),
    };
    run(&dispatcher, admin, action).await
}

#[post("/admin/api/users/{id}/corporate/reject")]
pub async fn reject_corporate(
    admin: AdminCtx,
    dispatcher: web::Data<ActionDispatcher>,
    user_id: web::Path<Uuid>,
    body: web::Json<ReasonBody>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let action = AdminAction::RejectCorporate {
        user_id: user_id.into_inner(),
        reason: body.into_inner().reason,
    };
    run(&dispatcher, admin, action).await
}

#[post("/admin/api/users/{id}/block")]
pub async fn block_user(
    admin: AdminCtx,
    dispatcher: web::Data<ActionDispatcher>,
    user_id: web::Path<Uuid>,
    body: web::Json<BlockBody>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let body = body.into_inner();
    let action = AdminAction::BlockUser {
        user_id: user_id.into_inner(),
        reason: body.reason,
        until: body.until,
    };
    run(&dispatcher, admin, action).await
}

#[post("/admin/api/users/{id}/unblock")]
pub async fn unblock_user(
    admin: AdminCtx,
    dispatcher: web::Data<ActionDispatcher>,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let action = AdminAction::UnblockUser {
        user_id: user_id.into_inner(),
    };
    run(&dispatcher, admin, action).await
}

#[post("/admin/api/users/{id}/slots")]
pub async fn purchase_slots(
    admin: AdminCtx,
    dispatcher: web::Data<ActionDispatcher>,
    user_id: web::Path<Uuid>,
    body: web::Json<SlotsBody>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let action = AdminAction::PurchaseSlots {
        user_id: user_id.into_inner(),
        slots: body.slots,
    };
    run(&dispatcher, admin, action).await
}

#[delete("/admin/api/messages/{id}")]
pub async fn delete_message(
    admin: AdminCtx,
    dispatcher: web::Data<ActionDispatcher>,
    message_id: web::Path<Uuid>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let action = AdminAction::DeleteMessage {
        message_id: message_id.into_inner(),
    };
    run(&dispatcher, admin, action).await
}

#[post("/admin/api/admins")]
pub async fn create_admin(
    admin: AdminCtx,
    dispatcher: web::Data<ActionDispatcher>,
    body: web::Json<CreateAdminBody>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    body.validate().map_err(|e| {
        log::debug!("create_admin: validation failed: {}", e);
        ActionError::validation("Usernames need 3 to 64 characters and passwords at least 8.")
    })?;
    let body = body.into_inner();

    let password_hash = hash_password(&body.password).map_err(|e| {
        log::error!("create_admin: hash_password() {}", e);
        ActionError::Remote(e.to_string())
    })?;
    let totp_secret = body.enable_2fa.then(generate_totp_secret);

    let notice = dispatcher
        .dispatch(
            admin,
            AdminAction::CreateAdmin {
                username: body.username.trim().to_string(),
                password_hash,
                totp_secret: totp_secret.clone(),
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(CreatedAdmin {
        response: ActionResponse::from(notice),
        totp_secret,
    }))
}

#[delete("/admin/api/admins/{id}")]
pub async fn delete_admin(
    admin: AdminCtx,
    dispatcher: web::Data<ActionDispatcher>,
    target: web::Path<Uuid>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let action = AdminAction::DeleteAdmin {
        target_admin_id: target.into_inner(),
    };
    run(&dispatcher, admin, action).await
}

#[post("/admin/api/purchases/{id}/approve")]
pub async fn approve_purchase(
    admin: AdminCtx,
    dispatcher: web::Data<ActionDispatcher>,
    request_id: web::Path<Uuid>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let action = AdminAction::ApprovePurchase {
        request_id: request_id.into_inner(),
    };
    run(&dispatcher, admin, action).await
}

#[post("/admin/api/purchases/{id}/reject")]
pub async fn reject_purchase(
    admin: AdminCtx,
    dispatcher: web::Data<ActionDispatcher>,
    request_id: web::Path<Uuid>,
    body: web::Json<ReasonBody>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let action = AdminAction::RejectPurchase {
        request_id: request_id.into_inner(),
        reason: body.into_inner().reason,
    };
    run(&dispatcher, admin, action).await
}

#[post("/admin/api/share-requests/{id}/{decision}")]
pub async fn decide_share_request(
    admin: AdminCtx,
    db: web::Data<DatabaseConnection>,
    dispatcher: web::Data<ActionDispatcher>,
    path: web::Path<(Uuid, Decision)>,
    body: web::Json<NotesBody>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let (id, decision) = path.into_inner();
    let notice = share_requests::decide(
        &db,
        dispatcher.processing(),
        admin,
        id,
        decision,
        body.into_inner().notes,
    )
    .await?;
    Ok(HttpResponse::Ok().json(ActionResponse::from(notice)))
}

#[post("/admin/api/damage-reports/{id}/{decision}")]
pub async fn decide_damage_report(
    admin: AdminCtx,
    db: web::Data<DatabaseConnection>,
    dispatcher: web::Data<ActionDispatcher>,
    path: web::Path<(Uuid, Decision)>,
    body: web::Json<NotesBody>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let (id, decision) = path.into_inner();
    let notice = damage_reports::decide(
        &db,
        dispatcher.processing(),
        admin,
        id,
        decision,
        body.into_inner().notes,
    )
    .await?;
    Ok(HttpResponse::Ok().json(ActionResponse::from(notice)))
}

#[post("/admin/api/verifications/{user_id}/resend")]
pub async fn resend_verification(
    admin: AdminCtx,
    db: web::Data<DatabaseConnection>,
    dispatcher: web::Data<ActionDispatcher>,
    user_id: web::Path<Uuid>,
    body: web::Json<ResendBody>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    log::debug!("Admin {} resending verification", admin.username);
    let notice = verifications::resend(
        &db,
        dispatcher.processing(),
        user_id.into_inner(),
        body.channel,
    )
    .await?;
    Ok(HttpResponse::Ok().json(ActionResponse::from(notice)))
}
