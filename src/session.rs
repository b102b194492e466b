//! Admin sessions and credentials.
//!
//! The only client-side state is the admin id stored in the cookie session.
//! Every mutating action receives an explicit `AdminContext` built from it.

use crate::orm::admin_credentials;
use actix_session::Session;
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use google_authenticator::GoogleAuthenticator;
use once_cell::sync::Lazy;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use serde::Serialize;
use uuid::Uuid;

const ADMIN_ID_KEY: &str = "admin_id";

static ARGON2: Lazy<Argon2<'static>> = Lazy::new(Argon2::default);

pub fn get_argon2() -> &'static Argon2<'static> {
    &ARGON2
}

/// Credential of the admin performing an action. Carried into every
/// mutating call for audit attribution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AdminContext {
    pub admin_id: Uuid,
    pub username: String,
}

/// Reads the admin id from the session without validating it.
pub fn get_session_admin_id(session: &Session) -> Option<Uuid> {
    match session.get::<String>(ADMIN_ID_KEY) {
        Ok(Some(raw)) => Uuid::parse_str(&raw).ok(),
        Ok(None) => None,
        Err(e) => {
            log::warn!("Unreadable admin session: {}", e);
            None
        }
    }
}

/// Resolves the session to a live admin. Ids that fail to parse or no longer
/// exist in `admin_credentials` count as unauthenticated.
pub async fn authenticate_admin_by_session(
    db: &DatabaseConnection,
    session: &Session,
) -> Option<AdminContext> {
    let admin_id = get_session_admin_id(session)?;

    match admin_credentials::Entity::find_by_id(admin_id).one(db).await {
        Ok(Some(admin)) => Some(AdminContext {
            admin_id: admin.id,
            username: admin.username,
        }),
        Ok(None) => {
            log::info!("Session references deleted admin {}", admin_id);
            None
        }
        Err(e) => {
            log::error!("Failed to validate admin session: {}", e);
            None
        }
    }
}

pub fn store_admin_session(session: &Session, admin_id: Uuid) -> Result<(), actix_web::Error> {
    session.renew();
    session
        .insert(ADMIN_ID_KEY, admin_id.to_string())
        .map_err(|_| actix_web::error::ErrorInternalServerError("Failed to store session"))
}

pub fn clear_admin_session(session: &Session) {
    session.purge();
}

#[derive(Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    Success(AdminContext),
    BadCredentials,
    Missing2FA,
    Bad2FA,
}

/// Checks a username/password pair and, when the admin has one, a TOTP code.
pub async fn login(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
    totp: Option<&str>,
) -> Result<LoginOutcome, DbErr> {
    let admin = admin_credentials::Entity::find()
        .filter(admin_credentials::Column::Username.eq(username))
        .one(db)
        .await?;

    let admin = match admin {
        Some(admin) => admin,
        None => return Ok(LoginOutcome::BadCredentials),
    };

    if !verify_password(&admin.password_hash, password) {
        log::info!("Failed admin login for {}", username);
        return Ok(LoginOutcome::BadCredentials);
    }

    if let Some(secret) = admin.totp_secret.as_deref() {
        match totp.map(str::trim).filter(|c| !c.is_empty()) {
            None => return Ok(LoginOutcome::Missing2FA),
            Some(code) => {
                if !GoogleAuthenticator::new().verify_code(secret, code, 1, 0) {
                    return Ok(LoginOutcome::Bad2FA);
                }
            }
        }
    }

    Ok(LoginOutcome::Success(AdminContext {
        admin_id: admin.id,
        username: admin.username,
    }))
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => get_argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::error!("Stored admin password hash is malformed: {}", e);
            false
        }
    }
}

/// PHC string for a new admin password.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(get_argon2()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Fresh base32 secret for enrolling an admin in TOTP.
pub fn generate_totp_secret() -> String {
    GoogleAuthenticator::new().create_secret(32)
}
