use actix::{Actor, Supervisor};
use actix_files::Files;
use actix_session::{config::PersistentSession, storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{time, Key, SameSite};
use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use carmarket_admin::app_config;
use carmarket_admin::db::{get_db_pool, init_db};
use carmarket_admin::dispatch::ActionDispatcher;
use carmarket_admin::middleware::AdminGuard;
use carmarket_admin::moderation::{DbReportStore, ReportDesk};
use carmarket_admin::notify::HttpNotifier;
use carmarket_admin::processing::ProcessingMarker;
use carmarket_admin::realtime::{ChangeHub, RealtimeFeed};
use carmarket_admin::rpc::PgRpc;
use carmarket_admin::storage::local::LocalStorage;
use carmarket_admin::storage::s3::S3Storage;
use carmarket_admin::storage::StorageBackend;
use carmarket_admin::upload::UploadPolicy;
use carmarket_admin::views::ViewContext;
use env_logger::Env;
use rand::{distributions::Alphanumeric, Rng};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();
    app_config::init();

    let config = app_config::get_config();
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| config.database.url.clone());
    init_db(database_url).await;
    let db = get_db_pool().clone();

    let secret_key = match std::env::var("SECRET_KEY") {
        Ok(key) if key.len() >= 64 => Key::from(key.as_bytes()),
        other => {
            let random_string: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(128)
                .map(char::from)
                .collect();
            log::warn!("SECRET_KEY was invalid ({:?}). Session cookies will be invalidated every time the application is restarted. A secret key must be at least 64 bytes.", other.err());
            Key::from(random_string.as_bytes())
        }
    };

    // Storage: the local backend also serves `/signed/` and `/uploads`.
    let mut local_storage: Option<Arc<LocalStorage>> = None;
    let storage: Arc<dyn StorageBackend> = match config.storage.backend.as_str() {
        "s3" => Arc::new(S3Storage::from_config(&config.storage).context("S3 storage")?),
        _ => {
            let local = Arc::new(
                LocalStorage::new(
                    PathBuf::from(&config.storage.local_path),
                    &config.storage.public_url,
                    &config.site.base_url,
                    &config.storage.signing_key,
                )
                .context("local storage")?,
            );
            local_storage = Some(local.clone());
            local
        }
    };

    let processing = ProcessingMarker::new();
    let dispatcher = ActionDispatcher::new(
        Arc::new(PgRpc::new(db.clone())),
        Arc::new(HttpNotifier::from_config()),
        processing,
    );
    let desk = ReportDesk::new(
        dispatcher.clone(),
        Arc::new(DbReportStore::new(db.clone())),
        config.limits.max_rows,
    );
    let views = ViewContext {
        db: db.clone(),
        reports: desk.clone(),
        storage: storage.clone(),
        max_rows: config.limits.max_rows,
        signed_url_ttl: Duration::from_secs(config.limits.signed_url_seconds),
    };
    let policy = UploadPolicy::from_config();

    let hub = Supervisor::start(|_| ChangeHub::new());
    if config.realtime.enabled {
        RealtimeFeed::new((&config.realtime).into(), hub.clone()).start();
    } else {
        log::warn!("Realtime is disabled; live views only load once.");
    }

    let login_path = config.site.login_path.clone();
    let session_ttl = time::Duration::minutes(config.security.session_timeout_minutes as i64);
    let cookie_secure = config.security.cookie_secure;
    let uploads_dir = config.storage.local_path.clone();
    let bind = config.site.bind.clone();

    log::info!("Starting {} on {}", config.site.name, bind);

    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        let mut app = App::new()
            .app_data(Data::new(db.clone()))
            .app_data(Data::new(dispatcher.clone()))
            .app_data(Data::new(desk.clone()))
            .app_data(Data::new(views.clone()))
            .app_data(Data::new(storage.clone()))
            .app_data(Data::new(policy.clone()))
            .app_data(Data::new(hub.clone()));
        if let Some(local) = &local_storage {
            app = app.app_data(Data::new(local.clone()));
        }

        app.wrap(
            DefaultHeaders::new()
                .add((header::X_FRAME_OPTIONS, "DENY"))
                .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                .add(("Referrer-Policy", "strict-origin-when-cross-origin")),
        )
        .wrap(AdminGuard::new(login_path.clone()))
        .wrap(
            SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                .cookie_same_site(SameSite::Lax)
                .cookie_secure(cookie_secure)
                .session_lifecycle(PersistentSession::default().session_ttl(session_ttl))
                .build(),
        )
        .wrap(Logger::new("%a %r %s %Dms"))
        .configure(carmarket_admin::web::configure)
        .service(Files::new("/uploads", uploads_dir.clone()))
    })
    .bind(&bind)?
    .run()
    .await?;

    Ok(())
}

/// Initialize third party crates we rely on but don't have control over.
pub fn init_lib_mods() {
    if let Err(e) = dotenv::dotenv() {
        eprintln!("No .env loaded: {}", e);
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
