/// CSRF (Cross-Site Request Forgery) protection
///
/// State-changing requests under `/admin` must echo the session's CSRF token
/// in the `x-csrf-token` header. The token is:
/// - Generated once per session
/// - Stored in the session cookie
/// - Handed to the admin UI by `POST /login` and `GET /admin/api/session`
/// - Checked by `AdminGuard` before the request reaches a handler
use actix_web::http::Method;
use rand::{distributions::Alphanumeric, Rng};

pub const CSRF_TOKEN_LENGTH: usize = 32;
pub const CSRF_HEADER: &str = "x-csrf-token";
const CSRF_SESSION_KEY: &str = "csrf_token";

/// Generate a new CSRF token
pub fn generate_csrf_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CSRF_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Get or create the CSRF token for the current session
pub fn get_or_create_csrf_token(
    session: &actix_session::Session,
) -> Result<String, actix_web::Error> {
    match session.get::<String>(CSRF_SESSION_KEY) {
        Ok(Some(token)) => Ok(token),
        _ => {
            let token = generate_csrf_token();
            session
                .insert(CSRF_SESSION_KEY, token.clone())
                .map_err(|_| {
                    actix_web::error::ErrorInternalServerError("Failed to store CSRF token")
                })?;
            Ok(token)
        }
    }
}

/// Whether the method can change state and therefore needs a token.
pub fn requires_token(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Compare the submitted token with the one in the session.
pub fn is_valid_csrf_token(session: &actix_session::Session, submitted: Option<&str>) -> bool {
    let expected = match session.get::<String>(CSRF_SESSION_KEY) {
        Ok(Some(token)) => token,
        _ => return false,
    };

    match submitted {
        Some(token) => constant_time_eq(expected.as_bytes(), token.as_bytes()),
        None => false,
    }
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
