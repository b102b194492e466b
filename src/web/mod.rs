pub mod admin;
pub mod dashboard;
pub mod live;
pub mod login;
pub mod logout;
pub mod notify;
pub mod reports;
pub mod storage;
pub mod views;

use crate::notice::Notice;
use serde::Serialize;

/// Configures the web app by adding services from each web file.
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Route resolution will stop at the first match.
    login::configure(conf);
    logout::configure(conf);
    dashboard::configure(conf);
    reports::configure(conf);
    admin::configure(conf);
    views::configure(conf);
    storage::configure(conf);
    live::configure(conf);
    notify::configure(conf);
}

/// Body of every action response.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub notices: Vec<Notice>,
}

impl From<Notice> for ActionResponse {
    fn from(notice: Notice) -> Self {
        Self {
            notices: vec![notice],
        }
    }
}
