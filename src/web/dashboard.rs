use crate::dashboard::counts;
use actix_web::{get, web, HttpResponse, Responder};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_dashboard);
}

/// Badge counts. A badge whose query failed is reported with a null count.
#[get("/admin/api/dashboard")]
pub async fn view_dashboard(db: web::Data<DatabaseConnection>) -> impl Responder {
    HttpResponse::Ok().json(counts(&db).await)
}
