//! Gateway configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Storage settings.
    pub storage: StorageConfig,
    /// Upload settings.
    pub upload: UploadConfig,
    /// Device connectivity settings.
    pub connectivity: ConnectivityConfig,
}

impl GatewayConfig {
    /// Load configuration from the default path.
    ///
    /// Returns the default configuration if no file exists there yet.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] if an
    /// existing file cannot be loaded.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if it is not valid TOML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] or [`ConfigError::Write`] on
    /// failure.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Storage path is not empty
    /// - Upload interval and batch size are positive
    /// - Remote credentials, when present, name a host and device
    /// - Ping interval is positive
    ///
    /// # Example
    ///
    /// ```
    /// use speck_gateway::GatewayConfig;
    ///
    /// let config = GatewayConfig::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] listing every failed check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.storage.validate());
        errors.extend(self.upload.validate());
        errors.extend(self.connectivity.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns any [`ConfigError`] from loading or validation.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: speck_store::default_data_dir().join("samples.db"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Upload configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Seconds between upload batches.
    pub interval_secs: u64,
    /// Samples claimed per batch.
    pub batch_size: i32,
    /// Remote endpoint credentials. Uploading is disabled when absent.
    pub credentials: Option<RemoteStorageCredentials>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            batch_size: 100,
            credentials: None,
        }
    }
}

impl UploadConfig {
    /// Validate upload configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.interval_secs == 0 {
            errors.push(ValidationError {
                field: "upload.interval_secs".to_string(),
                message: "upload interval cannot be 0".to_string(),
            });
        }

        if self.batch_size <= 0 {
            errors.push(ValidationError {
                field: "upload.batch_size".to_string(),
                message: format!("batch size {} must be positive", self.batch_size),
            });
        }

        if let Some(credentials) = &self.credentials {
            errors.extend(credentials.validate("upload.credentials"));
        }

        errors
    }
}

/// Device connectivity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Seconds between liveness pings while connected.
    pub ping_interval_secs: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 5,
        }
    }
}

impl ConnectivityConfig {
    /// Validate connectivity configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.ping_interval_secs == 0 {
            errors.push(ValidationError {
                field: "connectivity.ping_interval_secs".to_string(),
                message: "ping interval cannot be 0".to_string(),
            });
        }

        errors
    }
}

/// Credentials for a remote storage endpoint.
///
/// `Debug` redacts the password so credentials can be logged safely.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStorageCredentials {
    /// Endpoint host name or address.
    pub host: String,
    /// Endpoint port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Account user name.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Name this gateway's device registers under.
    pub device_name: String,
}

fn default_port() -> u16 {
    80
}

impl RemoteStorageCredentials {
    /// Validate credential fields.
    pub fn validate(&self, prefix: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.host.is_empty() {
            errors.push(ValidationError {
                field: format!("{}.host", prefix),
                message: "host cannot be empty".to_string(),
            });
        }

        if self.port == 0 {
            errors.push(ValidationError {
                field: format!("{}.port", prefix),
                message: "port cannot be 0".to_string(),
            });
        }

        if self.username.is_empty() {
            errors.push(ValidationError {
                field: format!("{}.username", prefix),
                message: "username cannot be empty".to_string(),
            });
        }

        if self.device_name.is_empty() {
            errors.push(ValidationError {
                field: format!("{}.device_name", prefix),
                message: "device name cannot be empty".to_string(),
            });
        }

        errors
    }
}

impl std::fmt::Debug for RemoteStorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStorageCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("device_name", &self.device_name)
            .finish()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `upload.batch_size`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("speck")
        .join("gateway.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_credentials() -> RemoteStorageCredentials {
        RemoteStorageCredentials {
            host: "sensors.example.org".to_string(),
            port: 8080,
            username: "gateway".to_string(),
            password: "hunter2".to_string(),
            device_name: "Speck4A3F".to_string(),
        }
    }

    #[test]
    fn test_config_default() {
        let config = GatewayConfig::default();
        assert_eq!(config.upload.interval_secs, 30);
        assert_eq!(config.upload.batch_size, 100);
        assert!(config.upload.credentials.is_none());
        assert_eq!(config.connectivity.ping_interval_secs, 5);
    }

    #[test]
    fn test_default_config_validates() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("gateway.toml");

        let config = GatewayConfig {
            storage: StorageConfig {
                path: PathBuf::from("/data/samples.db"),
            },
            upload: UploadConfig {
                interval_secs: 60,
                batch_size: 50,
                credentials: Some(test_credentials()),
            },
            connectivity: ConnectivityConfig {
                ping_interval_secs: 10,
            },
        };

        config.save(&config_path).unwrap();
        let loaded = GatewayConfig::load(&config_path).unwrap();

        assert_eq!(loaded.storage.path, PathBuf::from("/data/samples.db"));
        assert_eq!(loaded.upload.interval_secs, 60);
        assert_eq!(loaded.upload.batch_size, 50);
        assert_eq!(loaded.upload.credentials, Some(test_credentials()));
        assert_eq!(loaded.connectivity.ping_interval_secs, 10);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = GatewayConfig::load("/nonexistent/path/gateway.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = GatewayConfig::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_config_full_toml() {
        let toml = r#"
            [storage]
            path = "/data/samples.db"

            [upload]
            interval_secs = 15
            batch_size = 25

            [upload.credentials]
            host = "sensors.example.org"
            username = "gateway"
            password = "hunter2"
            device_name = "Speck4A3F"

            [connectivity]
            ping_interval_secs = 3
        "#;

        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.upload.interval_secs, 15);
        assert_eq!(config.upload.batch_size, 25);
        let credentials = config.upload.credentials.unwrap();
        assert_eq!(credentials.host, "sensors.example.org");
        // Port falls back to the default when omitted
        assert_eq!(credentials.port, 80);
        assert_eq!(config.connectivity.ping_interval_secs, 3);
    }

    #[test]
    fn test_upload_validation() {
        let zero_interval = UploadConfig {
            interval_secs: 0,
            ..UploadConfig::default()
        };
        let errors = zero_interval.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("cannot be 0"));

        let bad_batch = UploadConfig {
            batch_size: -1,
            ..UploadConfig::default()
        };
        let errors = bad_batch.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("must be positive"));
    }

    #[test]
    fn test_credentials_validation() {
        assert!(test_credentials().validate("upload.credentials").is_empty());

        let empty_host = RemoteStorageCredentials {
            host: String::new(),
            ..test_credentials()
        };
        let errors = empty_host.validate("upload.credentials");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "upload.credentials.host");

        let bad_port = RemoteStorageCredentials {
            port: 0,
            ..test_credentials()
        };
        let errors = bad_port.validate("upload.credentials");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("port cannot be 0"));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let debug = format!("{:?}", test_credentials());
        assert!(debug.contains("sensors.example.org"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_ping_interval_validation() {
        let config = ConnectivityConfig {
            ping_interval_secs: 0,
        };
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "connectivity.ping_interval_secs");
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("speck/gateway.toml"));
    }

    #[test]
    fn test_validation_error_display() {
        let error = ValidationError {
            field: "upload.batch_size".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(format!("{}", error), "upload.batch_size: must be positive");
    }

    #[test]
    fn test_config_validation_error_display() {
        let errors = vec![
            ValidationError {
                field: "upload.interval_secs".to_string(),
                message: "upload interval cannot be 0".to_string(),
            },
            ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            },
        ];
        let error = ConfigError::Validation(errors);
        let display = format!("{}", error);
        assert!(display.contains("upload.interval_secs"));
        assert!(display.contains("storage.path"));
    }
}
