//! Account notice endpoint, called by `HttpNotifier` and other services.

use crate::email::templates::send_user_notification;
use crate::middleware::csrf::constant_time_eq;
use crate::notify::UserNotification;
use crate::orm::users;
use actix_web::{error, post, web, Error, HttpRequest, HttpResponse};
use sea_orm::{DatabaseConnection, EntityTrait};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_notify);
}

/// An empty configured key disables the endpoint.
fn authorized(req: &HttpRequest, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    req.headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|given| constant_time_eq(given.as_bytes(), expected.as_bytes()))
        .unwrap_or(false)
}

#[post("/api/notify")]
pub async fn post_notify(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    body: web::Json<UserNotification>,
) -> Result<HttpResponse, Error> {
    if !authorized(&req, &crate::app_config::notify().api_key) {
        return Err(error::ErrorUnauthorized("Invalid API key"));
    }
    let body = body.into_inner();
    if body.subject.trim().is_empty() || body.message.trim().is_empty() {
        return Err(error::ErrorBadRequest("Subject and message are required"));
    }

    let user = users::Entity::find_by_id(body.user_id)
        .one(db.get_ref())
        .await
        .map_err(|e| {
            log::error!("post_notify: {}", e);
            error::ErrorInternalServerError("DB error")
        })?
        .ok_or_else(|| error::ErrorNotFound("User not found"))?;

    send_user_notification(&user.email, &user.display_name(), &body.subject, &body.message)
        .await
        .map_err(|e| {
            log::error!("post_notify: failed to mail user {}: {}", user.id, e);
            error::ErrorBadGateway("Failed to send email")
        })?;

    log::info!("Sent \"{}\" to user {}", body.subject, user.id);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_api_key_check() {
        let req = TestRequest::default()
            .insert_header(("x-api-key", "s3cret"))
            .to_http_request();
        assert!(authorized(&req, "s3cret"));
        assert!(!authorized(&req, "other"));
        assert!(!authorized(&req, ""));

        let anonymous = TestRequest::default().to_http_request();
        assert!(!authorized(&anonymous, "s3cret"));
    }
}
