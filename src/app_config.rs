//! Application configuration from file and environment variables
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (prefixed with CARMARKET_, sections split by `__`)
//! 2. Config file (config.toml)
//! 3. Default values
//!
//! Secrets like the database URL, realtime API key and storage credentials
//! should be kept in environment variables, not in the config file.

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Global application configuration
pub static APP_CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    RwLock::new(AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config file, using defaults: {}", e);
        AppConfig::default()
    }))
});

/// Site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    pub base_url: String,
    /// Where unauthenticated admin requests are redirected.
    pub login_path: String,
    /// Address the HTTP server binds to.
    pub bind: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Carmarket Admin".to_string(),
            base_url: "http://localhost:8080".to_string(),
            login_path: "/login".to_string(),
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection string (should be in env var CARMARKET_DATABASE__URL or DATABASE_URL)
    pub url: String,
}

/// Realtime change-feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    pub enabled: bool,
    /// WebSocket endpoint of the realtime service
    pub url: String,
    /// API key sent as `apikey` query parameter (should be in env var)
    #[serde(default)]
    pub api_key: String,
    /// Database schema the subscribed tables live in
    pub schema: String,
    /// Heartbeat interval in seconds
    pub heartbeat_seconds: u64,
    /// Delay before reconnecting after the socket drops
    pub reconnect_seconds: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "ws://localhost:4000/realtime/v1/websocket".to_string(),
            api_key: String::new(),
            schema: "public".to_string(),
            heartbeat_seconds: 30,
            reconnect_seconds: 5,
        }
    }
}

/// Content and fetch limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Upper bound on rows fetched for a single list view
    pub max_rows: u64,
    /// Maximum upload size in MB
    pub max_upload_size_mb: u32,
    /// MIME types accepted by the upload helper
    pub allowed_upload_types: Vec<String>,
    /// Lifetime of signed URLs in seconds
    pub signed_url_seconds: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_rows: 1000,
            max_upload_size_mb: 10,
            allowed_upload_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
                "application/pdf".to_string(),
            ],
            signed_url_seconds: 3600,
        }
    }
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// SMTP server host
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// Use TLS for SMTP
    pub smtp_tls: bool,
    /// SMTP username (if required)
    pub smtp_username: String,
    /// SMTP password (should be in env var CARMARKET_EMAIL__SMTP_PASSWORD)
    #[serde(default)]
    pub smtp_password: String,
    /// From address for emails
    pub from_address: String,
    /// From name for emails
    pub from_name: String,
    /// Log emails instead of sending them
    pub mock: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_tls: true,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: "noreply@localhost".to_string(),
            from_name: "Carmarket".to_string(),
            mock: false,
        }
    }
}

/// Outbound user notification endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Endpoint accepting `{userId, subject, message}`
    pub endpoint: String,
    /// Shared key expected in the `x-api-key` header
    #[serde(default)]
    pub api_key: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/api/notify".to_string(),
            api_key: String::new(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend: "local" or "s3"
    pub backend: String,
    /// Local storage path (used when backend = "local")
    pub local_path: String,
    /// Base URL local files are publicly served under
    pub public_url: String,
    /// Key used to sign local download URLs (should be in env var)
    #[serde(default)]
    pub signing_key: String,
    /// S3 endpoint URL (used when backend = "s3")
    pub s3_endpoint: String,
    /// S3 region (used when backend = "s3")
    pub s3_region: String,
    /// S3 bucket name (used when backend = "s3")
    pub s3_bucket: String,
    /// S3 public URL for serving files (used when backend = "s3")
    pub s3_public_url: String,
    /// S3 access key (should be in env var CARMARKET_STORAGE__S3_ACCESS_KEY)
    #[serde(default)]
    pub s3_access_key: String,
    /// S3 secret key (should be in env var CARMARKET_STORAGE__S3_SECRET_KEY)
    #[serde(default)]
    pub s3_secret_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "local".to_string(),
            local_path: "./uploads".to_string(),
            public_url: "http://localhost:8080/uploads".to_string(),
            signing_key: String::new(),
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_bucket: "carmarket".to_string(),
            s3_public_url: "http://localhost:9000/carmarket".to_string(),
            s3_access_key: String::new(),
            s3_secret_key: String::new(),
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Admin session lifetime in minutes (default: 8 hours)
    pub session_timeout_minutes: u32,
    /// Use secure session cookies
    pub cookie_secure: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            session_timeout_minutes: 480,
            cookie_secure: false,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub database: DatabaseConfig,
    pub realtime: RealtimeConfig,
    pub limits: LimitsConfig,
    pub email: EmailConfig,
    pub notify: NotifyConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        use config::FileFormat;

        let config = Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(File::new(path, FileFormat::Toml).required(false))
            // e.g. CARMARKET_REALTIME__API_KEY, CARMARKET_LIMITS__MAX_ROWS
            .add_source(
                Environment::with_prefix("CARMARKET")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("limits.allowed_upload_types")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reload configuration from file
    pub fn reload() -> Result<(), ConfigError> {
        let new_config = Self::load()?;
        if let Ok(mut config) = APP_CONFIG.write() {
            *config = new_config;
            log::info!("Configuration reloaded");
        }
        Ok(())
    }
}

/// Initialize application configuration
///
/// Triggers the lazy loading of the config file and logs the result.
pub fn init() {
    let config = get_config();
    log::info!(
        "Configuration loaded: site.name = {}, storage.backend = {}",
        config.site.name,
        config.storage.backend
    );
}

/// Get the current application configuration
pub fn get_config() -> AppConfig {
    APP_CONFIG.read().map(|c| c.clone()).unwrap_or_default()
}

pub fn site() -> SiteConfig {
    get_config().site
}

pub fn database() -> DatabaseConfig {
    get_config().database
}

pub fn realtime() -> RealtimeConfig {
    get_config().realtime
}

pub fn limits() -> LimitsConfig {
    get_config().limits
}

pub fn email() -> EmailConfig {
    get_config().email
}

pub fn notify() -> NotifyConfig {
    get_config().notify
}

pub fn storage() -> StorageConfig {
    get_config().storage
}

pub fn security() -> SecurityConfig {
    get_config().security
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.site.login_path, "/login");
        assert_eq!(config.limits.max_rows, 1000);
        assert_eq!(config.limits.max_upload_size_mb, 10);
        assert_eq!(config.realtime.heartbeat_seconds, 30);
        assert_eq!(config.storage.backend, "local");
    }

    #[test]
    fn test_default_upload_types_are_images_and_pdf() {
        let config = AppConfig::default();
        assert!(config
            .limits
            .allowed_upload_types
            .contains(&"application/pdf".to_string()));
        assert!(!config
            .limits
            .allowed_upload_types
            .contains(&"text/html".to_string()));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[site]
name = "Test Admin"
login_path = "/auth/login"

[realtime]
url = "wss://realtime.example.com/socket"
heartbeat_seconds = 15

[limits]
max_rows = 250
allowed_upload_types = ["image/png"]
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(temp_file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.site.name, "Test Admin");
        assert_eq!(config.site.login_path, "/auth/login");
        assert_eq!(config.realtime.url, "wss://realtime.example.com/socket");
        assert_eq!(config.realtime.heartbeat_seconds, 15);
        assert_eq!(config.limits.max_rows, 250);
        assert_eq!(config.limits.allowed_upload_types, vec!["image/png"]);
        // Defaults should still apply for unspecified values
        assert_eq!(config.limits.max_upload_size_mb, 10);
        assert_eq!(config.realtime.reconnect_seconds, 5);
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = AppConfig::load_from_path("/nonexistent/config.toml").unwrap();
        assert_eq!(config.site.name, "Carmarket Admin");
        assert_eq!(config.security.session_timeout_minutes, 480);
    }
}
