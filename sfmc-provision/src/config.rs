//! Configuration loading.
//!
//! Values are layered with `figment`, later sources overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. An optional config file (`.toml`, `.yaml`/`.yml` or `.json`)
//! 3. Environment variables prefixed with `SFMC_`; nested keys use `__`
//!    (`SFMC_HTTP__TIMEOUT_SECS=10`)

use crate::auth::Credentials;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const ENV_PREFIX: &str = "SFMC_";
pub const DEFAULT_AUTH_BASE_URL: &str = "https://auth.exacttargetapis.com";
pub const DEFAULT_FOLDER_NAME: &str = "Hearsay Integrations";
pub const DEFAULT_PARENT_FOLDER_NAME: &str = "Data Extensions";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required setting has no value
    #[error("missing configuration value '{key}' (set it in the config file or as {})", env_name(.key))]
    MissingValue { key: String },

    /// A setting has a value that cannot be used
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// The requested config file does not exist
    #[error("configuration file not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    /// The config file extension is not one we can read
    #[error("unsupported configuration file format: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    /// Merging or extracting the layered configuration failed
    #[error("failed to load configuration: {source}")]
    Load {
        #[source]
        source: Box<figment::Error>,
    },

    /// The HTTP client could not be built from the configuration
    #[error("failed to build HTTP client: {message}")]
    HttpClient { message: String },
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        ConfigError::Load {
            source: Box::new(error),
        }
    }
}

fn env_name(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.replace('.', "__").to_uppercase())
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("sfmc-provision/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for a provisioning run.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Tenant authentication host; token and user-info calls go here
    pub auth_base_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Business unit MID for the client-credentials grant
    pub account_id: Option<String>,
    /// When set, the refresh-token grant is used instead of client credentials
    pub refresh_token: Option<String>,
    /// Folder new Data Extensions are placed in
    pub folder_name: String,
    /// Root the folder is created under when it does not exist yet
    pub parent_folder_name: String,
    /// External key of the Data Extension receiving org-setup rows
    pub org_setup_key: Option<String>,
    pub http: HttpConfig,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            auth_base_url: DEFAULT_AUTH_BASE_URL.to_string(),
            client_id: None,
            client_secret: None,
            account_id: None,
            refresh_token: None,
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            parent_folder_name: DEFAULT_PARENT_FOLDER_NAME.to_string(),
            org_setup_key: None,
            http: HttpConfig::default(),
        }
    }
}

impl fmt::Debug for ProvisionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionConfig")
            .field("auth_base_url", &self.auth_base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("account_id", &self.account_id)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("folder_name", &self.folder_name)
            .field("parent_folder_name", &self.parent_folder_name)
            .field("org_setup_key", &self.org_setup_key)
            .field("http", &self.http)
            .finish()
    }
}

impl ProvisionConfig {
    pub fn builder() -> ProvisionConfigBuilder {
        ProvisionConfigBuilder::default()
    }

    /// Loads defaults, then `file` when given, then `SFMC_*` environment
    /// variables, and validates the result.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let config: ProvisionConfig = Self::figment(file)?.extract()?;
        config.validate()?;
        debug!(config = ?config, "Loaded provisioning configuration");
        Ok(config)
    }

    fn figment(file: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(ProvisionConfig::default()));

        if let Some(path) = file {
            if !path.is_file() {
                return Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase);
            figment = match extension.as_deref() {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => {
                    return Err(ConfigError::UnsupportedFormat {
                        path: path.to_path_buf(),
                    })
                }
            };
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Checks credentials, the auth URL and the HTTP settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("client_id", &self.client_id)?;
        require("client_secret", &self.client_secret)?;

        let url = url::Url::parse(&self.auth_base_url).map_err(|e| ConfigError::InvalidValue {
            key: "auth_base_url".to_string(),
            message: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                key: "auth_base_url".to_string(),
                message: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        if self.folder_name.trim().is_empty() {
            return Err(ConfigError::MissingValue {
                key: "folder_name".to_string(),
            });
        }
        if self.parent_folder_name.trim().is_empty() {
            return Err(ConfigError::MissingValue {
                key: "parent_folder_name".to_string(),
            });
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "http.timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Credentials for the token exchange.
    ///
    /// A configured refresh token selects the refresh-token grant.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let client_id = require("client_id", &self.client_id)?.to_string();
        let client_secret = require("client_secret", &self.client_secret)?.to_string();

        let refresh_token = self
            .refresh_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        Ok(match refresh_token {
            Some(refresh_token) => Credentials::RefreshToken {
                client_id,
                client_secret,
                refresh_token: refresh_token.to_string(),
            },
            None => Credentials::ClientCredentials {
                client_id,
                client_secret,
                account_id: self
                    .account_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string),
            },
        })
    }
}

/// Trimmed value of an optional setting, or [`ConfigError::MissingValue`].
pub(crate) fn require<'a>(key: &str, value: &'a Option<String>) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingValue {
            key: key.to_string(),
        })
}

/// Builder for programmatic configuration.
#[derive(Debug, Default)]
pub struct ProvisionConfigBuilder {
    config: ProvisionConfig,
}

impl ProvisionConfigBuilder {
    pub fn auth_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.auth_base_url = url.into();
        self
    }

    pub fn client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.config.client_id = Some(client_id.into());
        self.config.client_secret = Some(client_secret.into());
        self
    }

    pub fn account_id(mut self, account_id: impl Into<String>) -> Self {
        self.config.account_id = Some(account_id.into());
        self
    }

    pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
        self.config.refresh_token = Some(token.into());
        self
    }

    pub fn folder_name(mut self, name: impl Into<String>) -> Self {
        self.config.folder_name = name.into();
        self
    }

    pub fn parent_folder_name(mut self, name: impl Into<String>) -> Self {
        self.config.parent_folder_name = name.into();
        self
    }

    pub fn org_setup_key(mut self, key: impl Into<String>) -> Self {
        self.config.org_setup_key = Some(key.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.http.timeout_secs = secs;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<ProvisionConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
