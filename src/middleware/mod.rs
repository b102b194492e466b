pub mod admin_ctx;
pub mod csrf;

pub use admin_ctx::{AdminCtx, AdminGuard};
