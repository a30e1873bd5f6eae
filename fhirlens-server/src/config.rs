use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides `[gcp] access_token`
pub const ACCESS_TOKEN_ENV: &str = "FHIRLENS_ACCESS_TOKEN";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gcp: GcpConfig,
    pub query: QueryConfig,
    pub cors: Option<CorsConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GcpConfig {
    pub project_id: String,
    pub region: String,
    pub model: String,
    pub dataset: String,
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QueryConfig {
    pub max_bytes_scanned: u64,
    pub default_row_limit: u32,
    pub model_timeout_secs: u64,
    pub query_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            gcp: GcpConfig {
                project_id: String::new(),
                region: "us-central1".to_string(),
                model: "gemini-2.0-flash".to_string(),
                dataset: "bigquery-public-data.fhir_synthea".to_string(),
                access_token: None,
            },
            query: QueryConfig {
                max_bytes_scanned: 10 * 1024 * 1024 * 1024,
                default_row_limit: 1000,
                model_timeout_secs: 60,
                query_timeout_secs: 60,
            },
            cors: Some(CorsConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            }),
        }
    }
}

impl AppConfig {
    /// Load configuration from the given file, or the default location.
    ///
    /// A commented default file is written on first run. The access token
    /// may also come from `FHIRLENS_ACCESS_TOKEN`, which takes precedence
    /// over the file.
    pub fn load(config_path: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        let config_path = match config_path {
            Some(path) => path.to_path_buf(),
            None => get_config_path(),
        };

        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Message(format!("Failed to create config directory: {e}"))
            })?;
        }

        // Create default config file if it doesn't exist
        if !config_path.exists() {
            std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE).map_err(|e| {
                ConfigError::Message(format!("Failed to write default config: {e}"))
            })?;
        }

        let builder = Config::builder()
            .add_source(File::from(config_path.clone()))
            .build()?;

        let mut config: AppConfig = builder.try_deserialize()?;

        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.is_empty() {
                config.gcp.access_token = Some(token);
            }
        }

        Ok((config, config_path))
    }

    /// Reject configurations the service cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gcp.project_id.is_empty() {
            return Err(ConfigError::Message(
                "gcp.project_id is required".to_string(),
            ));
        }
        if self.access_token().is_none() {
            return Err(ConfigError::Message(format!(
                "gcp.access_token (or {ACCESS_TOKEN_ENV}) is required"
            )));
        }
        if self.query.default_row_limit == 0 {
            return Err(ConfigError::Message(
                "query.default_row_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn access_token(&self) -> Option<&str> {
        self.gcp
            .access_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}

fn get_config_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join("fhirlens/server.toml")
    } else {
        PathBuf::from("server.toml")
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"
[server]
host = "127.0.0.1"
port = 8080

[gcp]
# project_id is required; the token can also come from FHIRLENS_ACCESS_TOKEN
project_id = ""
region = "us-central1"
model = "gemini-2.0-flash"
dataset = "bigquery-public-data.fhir_synthea"
# access_token = "ya29...."

[query]
# 10 GiB scan ceiling per query
max_bytes_scanned = 10737418240
default_row_limit = 1000
model_timeout_secs = 60
query_timeout_secs = 60

[cors]
allowed_origins = ["http://localhost:3000"]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");

        let (config, written_path) = AppConfig::load(Some(&path)).unwrap();

        assert!(path.exists());
        assert_eq!(written_path, path);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.gcp.dataset, "bigquery-public-data.fhir_synthea");
        assert_eq!(config.query.default_row_limit, 1000);
    }

    #[test]
    fn test_load_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(
            &path,
            r#"
[server]
host = "0.0.0.0"
port = 9000

[gcp]
project_id = "analytics-proj"
region = "us-central1"
model = "gemini-2.0-flash"
dataset = "bigquery-public-data.fhir_synthea"
access_token = "file-token"

[query]
max_bytes_scanned = 1024
default_row_limit = 50
model_timeout_secs = 10
query_timeout_secs = 10
"#,
        )
        .unwrap();

        let (config, _) = AppConfig::load(Some(&path)).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.gcp.project_id, "analytics-proj");
        assert_eq!(config.query.max_bytes_scanned, 1024);
        assert!(config.cors.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_project_and_token() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_err());

        config.gcp.project_id = "analytics-proj".to_string();
        assert!(config.validate().is_err());

        config.gcp.access_token = Some("tok".to_string());
        assert!(config.validate().is_ok());
    }
}
