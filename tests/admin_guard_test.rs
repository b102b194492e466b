//! Integration tests for the admin session guard

use actix_session::{storage::CookieSessionStore, Session, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App, HttpResponse};
use carmarket_admin::middleware::{AdminCtx, AdminGuard};
use carmarket_admin::orm::admin_credentials;
use carmarket_admin::session::store_admin_session;
use sea_orm::{DatabaseConnection, DbBackend, DbErr, MockDatabase};
use uuid::Uuid;

async fn whoami(admin: AdminCtx) -> HttpResponse {
    match admin.get() {
        Some(admin) => HttpResponse::Ok().body(admin.username.clone()),
        None => HttpResponse::Ok().body("nobody"),
    }
}

/// Plants an admin id in the session without logging in.
async fn forge(session: Session) -> Result<HttpResponse, actix_web::Error> {
    store_admin_session(&session, Uuid::new_v4())?;
    Ok(HttpResponse::NoContent().finish())
}

/// For requests that never get as far as an admin lookup.
fn no_queries() -> DatabaseConnection {
    MockDatabase::new(DbBackend::Postgres).into_connection()
}

macro_rules! guarded_app {
    () => {
        guarded_app!(no_queries())
    };
    ($db:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($db))
                .wrap(AdminGuard::new("/login"))
                .wrap(
                    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
                        .cookie_secure(false)
                        .build(),
                )
                .route("/forge", web::post().to(forge))
                .route("/public", web::get().to(whoami))
                .route("/admin/reports", web::get().to(whoami))
                .route("/admin/api/reports", web::get().to(whoami)),
        )
        .await
    };
}

#[actix_rt::test]
async fn test_pages_redirect_to_login() {
    let app = guarded_app!();

    let req = test::TestRequest::get().uri("/admin/reports").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok()),
        Some("/login")
    );
}

#[actix_rt::test]
async fn test_api_answers_unauthorized() {
    let app = guarded_app!();

    let req = test::TestRequest::get().uri("/admin/api/reports").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().is_some());
}

#[actix_rt::test]
async fn test_routes_outside_admin_are_open() {
    let app = guarded_app!();

    let req = test::TestRequest::get().uri("/public").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "nobody");
}

/// Plants a session cookie for an admin id the database knows nothing about.
macro_rules! forged_cookie {
    ($app:expr) => {{
        let req = test::TestRequest::post().uri("/forge").to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        resp.response()
            .cookies()
            .next()
            .expect("session cookie set")
            .into_owned()
    }};
}

#[actix_rt::test]
async fn test_unverifiable_session_is_unauthenticated() {
    let db = MockDatabase::new(DbBackend::Postgres)
        .append_query_errors([DbErr::Custom("connection refused".to_string())])
        .into_connection();
    let app = guarded_app!(db);
    let cookie = forged_cookie!(app);

    // The database cannot confirm the admin, so the session is not trusted.
    let req = test::TestRequest::get()
        .uri("/admin/api/reports")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_deleted_admin_session_is_unauthenticated() {
    let db = MockDatabase::new(DbBackend::Postgres)
        .append_query_results([Vec::<admin_credentials::Model>::new()])
        .into_connection();
    let app = guarded_app!(db);
    let cookie = forged_cookie!(app);

    let req = test::TestRequest::get()
        .uri("/admin/reports")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
}

#[actix_rt::test]
async fn test_known_admin_passes_the_guard() {
    let db = MockDatabase::new(DbBackend::Postgres)
        .append_query_results([vec![admin_credentials::Model {
            id: Uuid::new_v4(),
            username: "moderator".to_string(),
            password_hash: String::new(),
            totp_secret: None,
            created_at: chrono::Utc::now().into(),
        }]])
        .into_connection();
    let app = guarded_app!(db);
    let cookie = forged_cookie!(app);

    let req = test::TestRequest::get()
        .uri("/admin/api/reports")
        .cookie(cookie)
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "moderator");
}
