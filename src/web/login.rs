use crate::middleware::csrf::get_or_create_csrf_token;
use crate::middleware::AdminCtx;
use crate::session::{self, LoginOutcome};
use actix_web::{error, get, post, web, Error, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_login).service(view_session);
}

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
    totp: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub admin_id: Uuid,
    pub username: String,
    pub csrf_token: String,
}

#[post("/login")]
pub async fn post_login(
    cookies: actix_session::Session,
    db: web::Data<DatabaseConnection>,
    form: web::Json<LoginForm>,
) -> Result<HttpResponse, Error> {
    let outcome = session::login(
        db.get_ref(),
        form.username.trim(),
        &form.password,
        form.totp.as_deref(),
    )
    .await
    .map_err(|e| {
        log::error!("post_login: {}", e);
        error::ErrorInternalServerError("DB error")
    })?;

    let admin = match outcome {
        LoginOutcome::Success(admin) => admin,
        LoginOutcome::Missing2FA => {
            return Ok(HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "A two-factor code is required.",
                "needs_totp": true,
            })))
        }
        LoginOutcome::Bad2FA => {
            return Ok(HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "The two-factor code is incorrect.",
                "needs_totp": true,
            })))
        }
        LoginOutcome::BadCredentials => {
            return Ok(HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "Incorrect username or password."
            })))
        }
    };

    session::store_admin_session(&cookies, admin.admin_id)?;
    let csrf_token = get_or_create_csrf_token(&cookies)?;
    log::info!("Admin {} logged in", admin.username);

    Ok(HttpResponse::Ok().json(SessionInfo {
        admin_id: admin.admin_id,
        username: admin.username,
        csrf_token,
    }))
}

/// Current admin and CSRF token, for a UI that was reloaded.
#[get("/admin/api/session")]
pub async fn view_session(
    admin: AdminCtx,
    cookies: actix_session::Session,
) -> Result<HttpResponse, Error> {
    let admin = admin.require_admin()?;
    Ok(HttpResponse::Ok().json(SessionInfo {
        admin_id: admin.admin_id,
        username: admin.username.clone(),
        csrf_token: get_or_create_csrf_token(&cookies)?,
    }))
}
