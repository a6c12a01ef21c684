//! Application configuration management.

use std::path::PathBuf;

use serde::Deserialize;

/// Environment variables set by the hosting platform. Any of them being
/// present means the local disk cannot be trusted to survive a redeploy.
pub const HOSTING_MARKERS: [&str; 3] = [
    "RAILWAY_ENVIRONMENT_NAME",
    "RAILWAY_STATIC_URL",
    "RAILWAY_PROJECT_ID",
];

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted request body size, in bytes (uploads included).
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Raw file storage settings, read from the `FILE_STORAGE_*` variables.
///
/// Values are kept as given; deciding which backend they select is the
/// storage layer's job.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// `FILE_STORAGE_DRIVER`: explicit backend override.
    #[serde(default)]
    pub driver: Option<String>,
    /// `FILE_STORAGE_PATH`: base directory for the filesystem backend.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// `FILE_STORAGE_ENDPOINT_URL`.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// `FILE_STORAGE_BUCKET_NAME`.
    #[serde(default)]
    pub bucket_name: Option<String>,
    /// `FILE_STORAGE_ACCESS_KEY_ID`.
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// `FILE_STORAGE_SECRET_ACCESS_KEY`.
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// `FILE_STORAGE_REGION`.
    #[serde(default = "default_region")]
    pub region: String,
    /// `FILE_STORAGE_SERVE_MODE`: `stream` or `redirect`.
    #[serde(default)]
    pub serve_mode: Option<String>,
    /// Whether one of [`HOSTING_MARKERS`] is set.
    #[serde(skip)]
    pub hosted_platform: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            driver: None,
            path: default_storage_path(),
            endpoint_url: None,
            bucket_name: None,
            access_key_id: None,
            secret_access_key: None,
            region: default_region(),
            serve_mode: None,
            hosted_platform: false,
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./storage/files")
}

fn default_region() -> String {
    "auto".to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("FIELDOPS").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

impl StorageSettings {
    /// Loads storage settings from `FILE_STORAGE_*` variables and the
    /// hosting platform markers. Empty variables count as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be deserialized.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("FILE_STORAGE")
                    .prefix_separator("_")
                    .ignore_empty(true),
            )
            .build()?;

        let mut settings: Self = config.try_deserialize()?;
        settings.hosted_platform = HOSTING_MARKERS
            .iter()
            .any(|name| std::env::var_os(name).is_some_and(|value| !value.is_empty()));
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORAGE_VARS: [&str; 8] = [
        "FILE_STORAGE_DRIVER",
        "FILE_STORAGE_PATH",
        "FILE_STORAGE_ENDPOINT_URL",
        "FILE_STORAGE_BUCKET_NAME",
        "FILE_STORAGE_ACCESS_KEY_ID",
        "FILE_STORAGE_SECRET_ACCESS_KEY",
        "FILE_STORAGE_REGION",
        "FILE_STORAGE_SERVE_MODE",
    ];

    fn cleared() -> Vec<(&'static str, Option<&'static str>)> {
        STORAGE_VARS
            .iter()
            .chain(HOSTING_MARKERS.iter())
            .map(|name| (*name, None))
            .collect()
    }

    fn with(
        overrides: &[(&'static str, &'static str)],
    ) -> Vec<(&'static str, Option<&'static str>)> {
        let mut vars = cleared();
        for &(name, value) in overrides {
            vars.retain(|(existing, _)| *existing != name);
            vars.push((name, Some(value)));
        }
        vars
    }

    #[test]
    fn test_storage_settings_defaults() {
        temp_env::with_vars(cleared(), || {
            let settings = StorageSettings::load().expect("should load");
            assert_eq!(settings.driver, None);
            assert_eq!(settings.path, PathBuf::from("./storage/files"));
            assert_eq!(settings.region, "auto");
            assert!(settings.endpoint_url.is_none());
            assert!(!settings.hosted_platform);
        });
    }

    #[test]
    fn test_storage_settings_reads_object_storage_vars() {
        let vars = with(&[
            ("FILE_STORAGE_ENDPOINT_URL", "https://storage.example.com"),
            ("FILE_STORAGE_BUCKET_NAME", "fleet"),
            ("FILE_STORAGE_ACCESS_KEY_ID", "key"),
            ("FILE_STORAGE_SECRET_ACCESS_KEY", "secret"),
            ("FILE_STORAGE_REGION", "eu-west-1"),
        ]);
        temp_env::with_vars(vars, || {
            let settings = StorageSettings::load().expect("should load");
            assert_eq!(
                settings.endpoint_url.as_deref(),
                Some("https://storage.example.com")
            );
            assert_eq!(settings.bucket_name.as_deref(), Some("fleet"));
            assert_eq!(settings.access_key_id.as_deref(), Some("key"));
            assert_eq!(settings.secret_access_key.as_deref(), Some("secret"));
            assert_eq!(settings.region, "eu-west-1");
        });
    }

    #[test]
    fn test_storage_settings_driver_and_path() {
        let vars = with(&[
            ("FILE_STORAGE_DRIVER", "bucket"),
            ("FILE_STORAGE_PATH", "/var/lib/fieldops"),
            ("FILE_STORAGE_SERVE_MODE", "redirect"),
        ]);
        temp_env::with_vars(vars, || {
            let settings = StorageSettings::load().expect("should load");
            assert_eq!(settings.driver.as_deref(), Some("bucket"));
            assert_eq!(settings.path, PathBuf::from("/var/lib/fieldops"));
            assert_eq!(settings.serve_mode.as_deref(), Some("redirect"));
        });
    }

    #[test]
    fn test_storage_settings_ignores_empty_values() {
        let vars = with(&[("FILE_STORAGE_BUCKET_NAME", "")]);
        temp_env::with_vars(vars, || {
            let settings = StorageSettings::load().expect("should load");
            assert!(settings.bucket_name.is_none());
        });
    }

    #[test]
    fn test_hosting_marker_detected() {
        let vars = with(&[("RAILWAY_PROJECT_ID", "abc123")]);
        temp_env::with_vars(vars, || {
            let settings = StorageSettings::load().expect("should load");
            assert!(settings.hosted_platform);
        });
    }

    #[test]
    fn test_empty_hosting_marker_ignored() {
        let vars = with(&[("RAILWAY_STATIC_URL", "")]);
        temp_env::with_vars(vars, || {
            let settings = StorageSettings::load().expect("should load");
            assert!(!settings.hosted_platform);
        });
    }

    #[test]
    fn test_server_config_defaults() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);
        assert_eq!(server.max_upload_bytes, 25 * 1024 * 1024);
    }
}
