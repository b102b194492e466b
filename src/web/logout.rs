use crate::session::{clear_admin_session, get_session_admin_id};
use actix_web::{post, HttpResponse, Responder};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_logout);
}

#[post("/logout")]
pub async fn post_logout(cookies: actix_session::Session) -> impl Responder {
    match get_session_admin_id(&cookies) {
        Some(admin_id) => log::info!("Admin {} logged out", admin_id),
        None => log::debug!("post_logout: no admin session (already logged out?)"),
    }
    clear_admin_session(&cookies);
    HttpResponse::NoContent().finish()
}
