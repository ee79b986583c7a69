use config::{Config, ConfigError, Environment, File, Map};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::files::{DEFAULT_ALLOWED_MIME_TYPES, DEFAULT_MAX_FILE_SIZE};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub storage_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub max_file_size_bytes: u64,
    /// Initial allow-list. Runtime changes are not written back.
    pub allowed_mime_types: Vec<String>,
    pub route_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub permissive: bool,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("./SharedStorage"),
            staging_dir: PathBuf::from("./SharedStorage.staging"),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
            route_prefix: "/files".to_string(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            permissive: false,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Defaults, then `config.toml` if present, then `APP_` environment
    /// variables (`APP_SERVER__PORT=8080`).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("config.toml"), None)
    }

    /// Like [`AppConfig::load`], with an explicit config file and, when
    /// `env` is given, that map in place of the process environment.
    pub fn load_from(
        config_file: &Path,
        env: Option<Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?);

        if config_file.exists() {
            builder = builder.add_source(File::from(config_file));
        }

        builder = builder.add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("storage.allowed_mime_types")
                .with_list_parse_key("cors.allowed_origins")
                .try_parsing(true)
                .source(env),
        );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.storage.storage_dir.as_os_str().is_empty() {
            return Err(ConfigError::Message(
                "Storage directory cannot be empty".to_string(),
            ));
        }

        if self.storage.staging_dir.as_os_str().is_empty() {
            return Err(ConfigError::Message(
                "Staging directory cannot be empty".to_string(),
            ));
        }

        if self.storage.max_file_size_bytes == 0 {
            return Err(ConfigError::Message(
                "Max file size must be greater than 0".to_string(),
            ));
        }

        if !self.storage.route_prefix.starts_with('/') {
            return Err(ConfigError::Message(
                "Route prefix must start with '/'".to_string(),
            ));
        }

        if self.storage.allowed_mime_types.is_empty() {
            tracing::warn!("No MIME types allowed at startup - every upload will be rejected until one is added");
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
