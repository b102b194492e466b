//! List endpoints, one per view. Filters come from the query string.

use crate::error::ActionError;
use crate::views::{
    admins, blocked, chat, corporate, damage_reports, listings, purchases, reviews,
    share_requests, users, verifications, ViewContext,
};
use actix_web::{get, web, HttpResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_users)
        .service(view_listings)
        .service(view_reviews)
        .service(view_verifications)
        .service(view_chat)
        .service(view_share_requests)
        .service(view_damage_reports)
        .service(view_blocked_users)
        .service(view_corporate)
        .service(view_purchases)
        .service(view_admins);
}

#[get("/admin/api/users")]
pub async fn view_users(
    ctx: web::Data<ViewContext>,
    filter: web::Query<users::UserFilter>,
) -> Result<HttpResponse, ActionError> {
    Ok(HttpResponse::Ok().json(users::load(&ctx.db, &filter, ctx.max_rows).await?))
}

#[get("/admin/api/listings")]
pub async fn view_listings(
    ctx: web::Data<ViewContext>,
    filter: web::Query<listings::ListingFilter>,
) -> Result<HttpResponse, ActionError> {
    Ok(HttpResponse::Ok().json(listings::load(&ctx.db, &filter, ctx.max_rows).await?))
}

#[get("/admin/api/reviews")]
pub async fn view_reviews(
    ctx: web::Data<ViewContext>,
    filter: web::Query<reviews::ReviewFilter>,
) -> Result<HttpResponse, ActionError> {
    Ok(HttpResponse::Ok().json(reviews::load(&ctx.db, &filter, ctx.max_rows).await?))
}

#[get("/admin/api/verifications")]
pub async fn view_verifications(
    ctx: web::Data<ViewContext>,
    filter: web::Query<verifications::VerificationFilter>,
) -> Result<HttpResponse, ActionError> {
    Ok(HttpResponse::Ok().json(verifications::load(&ctx.db, &filter, ctx.max_rows).await?))
}

#[get("/admin/api/messages")]
pub async fn view_chat(
    ctx: web::Data<ViewContext>,
    filter: web::Query<chat::ChatFilter>,
) -> Result<HttpResponse, ActionError> {
    Ok(HttpResponse::Ok().json(chat::load(&ctx.db, &filter, ctx.max_rows).await?))
}

#[get("/admin/api/share-requests")]
pub async fn view_share_requests(
    ctx: web::Data<ViewContext>,
    filter: web::Query<share_requests::ShareRequestFilter>,
) -> Result<HttpResponse, ActionError> {
    Ok(HttpResponse::Ok().json(share_requests::load(&ctx.db, &filter, ctx.max_rows).await?))
}

#[get("/admin/api/damage-reports")]
pub async fn view_damage_reports(
    ctx: web::Data<ViewContext>,
    filter: web::Query<damage_reports::DamageReportFilter>,
) -> Result<HttpResponse, ActionError> {
    let listing =
        damage_reports::load(&ctx.db, ctx.storage.as_ref(), &filter, ctx.max_rows).await?;
    Ok(HttpResponse::Ok().json(listing))
}

#[get("/admin/api/blocked-users")]
pub async fn view_blocked_users(
    ctx: web::Data<ViewContext>,
    filter: web::Query<blocked::BlockedFilter>,
) -> Result<HttpResponse, ActionError> {
    Ok(HttpResponse::Ok().json(blocked::load(&ctx.db, &filter, ctx.max_rows).await?))
}

#[get("/admin/api/corporate")]
pub async fn view_corporate(
    ctx: web::Data<ViewContext>,
    filter: web::Query<corporate::CorporateFilter>,
) -> Result<HttpResponse, ActionError> {
    let listing = corporate::load(
        &ctx.db,
        ctx.storage.as_ref(),
        ctx.signed_url_ttl,
        &filter,
        ctx.max_rows,
    )
    .await?;
    Ok(HttpResponse::Ok().json(listing))
}

#[get("/admin/api/purchases")]
pub async fn view_purchases(
    ctx: web::Data<ViewContext>,
    filter: web::Query<purchases::PurchaseFilter>,
) -> Result<HttpResponse, ActionError> {
    Ok(HttpResponse::Ok().json(purchases::load(&ctx.db, &filter, ctx.max_rows).await?))
}

#[get("/admin/api/admins")]
pub async fn view_admins(
    ctx: web::Data<ViewContext>,
    filter: web::Query<admins::AdminFilter>,
) -> Result<HttpResponse, ActionError> {
    Ok(HttpResponse::Ok().json(admins::load(&ctx.db, &filter, ctx.max_rows).await?))
}
