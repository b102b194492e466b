//! Global database connection pool.

use once_cell::sync::OnceCell;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;

static DB_POOL: OnceCell<DatabaseConnection> = OnceCell::new();

/// Connect to the database and store the pool globally.
/// Panics if the connection cannot be established or the pool was already set.
pub async fn init_db(database_url: String) {
    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(16)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let pool = Database::connect(options)
        .await
        .expect("Failed to connect to the database.");

    if DB_POOL.set(pool).is_err() {
        log::warn!("init_db called more than once; keeping the first pool.");
    }
}

/// Returns the global pool. Panics if `init_db` has not run.
pub fn get_db_pool() -> &'static DatabaseConnection {
    DB_POOL
        .get()
        .expect("Database pool accessed before init_db.")
}
