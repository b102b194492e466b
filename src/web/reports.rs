//! Report queue endpoints

use super::ActionResponse;
use crate::error::ActionError;
use crate::middleware::AdminCtx;
use crate::moderation::report::{ReportKind, ReportRow, ReportStatus};
use crate::moderation::{ApproveOptions, ReportDesk, ReportFilter, ReportListing, ResolveOutcome};
use crate::notice::Notice;
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_reports)
        .service(approve_report)
        .service(reject_report)
        .service(report_listing);
}

#[derive(Deserialize)]
pub struct ApproveBody {
    #[serde(flatten)]
    options: ApproveOptions,
    /// Filter of the list the admin is looking at, used for the refresh.
    #[serde(default)]
    filter: ReportFilter,
}

#[derive(Deserialize)]
pub struct RejectBody {
    #[serde(default)]
    notes: String,
    #[serde(default)]
    filter: ReportFilter,
}

#[derive(Deserialize)]
pub struct ListingReportBody {
    reason: String,
    details: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    report_id: Uuid,
    status: ReportStatus,
    notices: Vec<Notice>,
    refreshed: Option<ReportListing>,
}

impl From<ResolveOutcome> for ResolveResponse {
    fn from(outcome: ResolveOutcome) -> Self {
        Self {
            notices: outcome.notices(),
            report_id: outcome.report_id,
            status: outcome.status,
            refreshed: outcome.refreshed,
        }
    }
}

async fn find_report(desk: &ReportDesk, kind: ReportKind, id: Uuid) -> Result<ReportRow, ActionError> {
    desk.store()
        .find(kind, id)
        .await?
        .ok_or(ActionError::NotFound("Report"))
}

#[get("/admin/api/reports")]
pub async fn view_reports(
    desk: web::Data<ReportDesk>,
    filter: web::Query<ReportFilter>,
) -> Result<HttpResponse, ActionError> {
    Ok(HttpResponse::Ok().json(desk.list(&filter).await?))
}

#[post("/admin/api/reports/{kind}/{id}/approve")]
pub async fn approve_report(
    admin: AdminCtx,
    desk: web::Data<ReportDesk>,
    path: web::Path<(ReportKind, Uuid)>,
    body: web::Json<ApproveBody>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let (kind, id) = path.into_inner();
    let body = body.into_inner();

    let report = find_report(&desk, kind, id).await?;
    let outcome = desk.approve(admin, &report, body.options, &body.filter).await?;
    Ok(HttpResponse::Ok().json(ResolveResponse::from(outcome)))
}

#[post("/admin/api/reports/{kind}/{id}/reject")]
pub async fn reject_report(
    admin: AdminCtx,
    desk: web::Data<ReportDesk>,
    path: web::Path<(ReportKind, Uuid)>,
    body: web::Json<RejectBody>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let (kind, id) = path.into_inner();

    if body.notes.trim().is_empty() {
        return Err(ActionError::validation(
            "Please explain why the report is rejected.",
        ));
    }
    let report = find_report(&desk, kind, id).await?;
    let outcome = desk.reject(admin, &report, &body.notes, &body.filter).await?;
    Ok(HttpResponse::Ok().json(ResolveResponse::from(outcome)))
}

#[post("/admin/api/listings/{id}/report")]
pub async fn report_listing(
    admin: AdminCtx,
    desk: web::Data<ReportDesk>,
    listing_id: web::Path<Uuid>,
    body: web::Json<ListingReportBody>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    let notice = desk
        .report_listing(
            admin,
            listing_id.into_inner(),
            &body.reason,
            body.details.as_deref(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(ActionResponse::from(notice)))
}
