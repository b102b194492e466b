use crate::error::ActionError;
use crate::middleware::csrf::{is_valid_csrf_token, requires_token, CSRF_HEADER};
use crate::session::{authenticate_admin_by_session, get_session_admin_id, AdminContext};
use actix_session::SessionExt;
use actix_web::body::EitherBody;
use actix_web::dev::{self, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header;
use actix_web::{
    web::Data, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use sea_orm::DatabaseConnection;
use std::rc::Rc;

/// Admin identity for the current request. Empty outside `/admin` or when
/// the guard did not authenticate anyone.
#[derive(Clone, Debug, Default)]
pub struct AdminCtx(Option<AdminContext>);

impl AdminCtx {
    pub fn new(admin: Option<AdminContext>) -> Self {
        Self(admin)
    }

    pub fn get(&self) -> Option<&AdminContext> {
        self.0.as_ref()
    }

    pub fn get_id(&self) -> Option<uuid::Uuid> {
        self.0.as_ref().map(|a| a.admin_id)
    }

    /// Precondition of every mutating action. The view itself stays usable.
    pub fn require_admin(&self) -> Result<&AdminContext, ActionError> {
        self.0.as_ref().ok_or(ActionError::NotAuthenticated)
    }
}

impl FromRequest for AdminCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(AdminCtx(
            req.extensions().get::<AdminContext>().cloned(),
        )))
    }
}

/// Identity guard for everything under `/admin`.
///
/// Requests without a valid admin session are redirected to the login route;
/// `/admin/api/*` requests get `401` instead. Unsafe methods must also carry
/// the session CSRF token.
#[derive(Clone)]
pub struct AdminGuard {
    login_path: Rc<String>,
}

impl AdminGuard {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: Rc::new(login_path.into()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AdminGuardMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminGuardMiddleware {
            service: Rc::new(service),
            login_path: self.login_path.clone(),
        }))
    }
}

pub struct AdminGuardMiddleware<S> {
    service: Rc<S>,
    login_path: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for AdminGuardMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let login_path = self.login_path.clone();

        Box::pin(async move {
            if !req.path().starts_with("/admin") {
                return svc.call(req).await.map(ServiceResponse::map_into_left_body);
            }

            let session = req.get_session();

            // Only touch the database when the session claims an admin.
            let admin = match get_session_admin_id(&session) {
                Some(_) => match req.app_data::<Data<DatabaseConnection>>().cloned() {
                    Some(db) => authenticate_admin_by_session(db.get_ref(), &session).await,
                    None => {
                        log::error!("AdminGuard: no database connection registered");
                        None
                    }
                },
                None => None,
            };

            let admin = match admin {
                Some(admin) => admin,
                None => {
                    let response = if req.path().starts_with("/admin/api") {
                        ActionError::NotAuthenticated.error_response()
                    } else {
                        HttpResponse::Found()
                            .insert_header((header::LOCATION, login_path.as_str()))
                            .finish()
                    };
                    return Ok(req.into_response(response).map_into_right_body());
                }
            };

            if requires_token(req.method()) {
                let submitted = req
                    .headers()
                    .get(CSRF_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);

                if !is_valid_csrf_token(&session, submitted.as_deref()) {
                    log::warn!(
                        "Rejected {} {} from admin {}: bad CSRF token",
                        req.method(),
                        req.path(),
                        admin.admin_id
                    );
                    let response = HttpResponse::Forbidden().json(serde_json::json!({
                        "error": "Invalid or missing CSRF token."
                    }));
                    return Ok(req.into_response(response).map_into_right_body());
                }
            }

            req.extensions_mut().insert(admin);
            svc.call(req).await.map(ServiceResponse::map_into_left_body)
        })
    }
}
