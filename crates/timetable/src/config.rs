/// Server configuration, loaded from a JSON file
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::repository::RepositoryClientConfig;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Top-level configuration for the timetable server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimetableConfig {
    /// Address the HTTP server binds to, e.g. `127.0.0.1:8080`
    pub bind_address: String,
    pub repository: RepositoryConfig,
}

impl Default for TimetableConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            repository: RepositoryConfig::default(),
        }
    }
}

/// Where schedule records are stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepositoryConfig {
    /// The school's schedule service
    Http {
        base_url: String,
        #[serde(default)]
        api_token: Option<String>,
        #[serde(default = "default_connect_timeout_secs")]
        connect_timeout_secs: u64,
        #[serde(default = "default_request_timeout_secs")]
        request_timeout_secs: u64,
        #[serde(default)]
        user_agent: Option<String>,
    },
    /// An embedded SQLite database; `:memory:` keeps everything in memory
    Sqlite { path: String },
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        RepositoryConfig::Sqlite {
            path: "timetable.db".to_string(),
        }
    }
}

impl RepositoryConfig {
    /// Client settings for the HTTP repository, or `None` for SQLite.
    pub fn client_config(&self) -> Option<RepositoryClientConfig> {
        match self {
            RepositoryConfig::Http {
                base_url,
                api_token,
                connect_timeout_secs,
                request_timeout_secs,
                user_agent,
            } => {
                let defaults = RepositoryClientConfig::default();
                Some(RepositoryClientConfig {
                    base_url: base_url.clone(),
                    api_token: api_token.clone(),
                    connect_timeout: Duration::from_secs(*connect_timeout_secs),
                    request_timeout: Duration::from_secs(*request_timeout_secs),
                    user_agent: user_agent.clone().unwrap_or(defaults.user_agent),
                })
            }
            RepositoryConfig::Sqlite { .. } => None,
        }
    }
}

impl TimetableConfig {
    /// Loads the configuration from a JSON file
    ///
    /// # Arguments
    /// * `path` - Path to the config file
    ///
    /// # Returns
    /// * `Ok(TimetableConfig)` - The validated configuration
    /// * `Err` - If the file can't be read, parsed, or has invalid values
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config: TimetableConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "bind_address must not be empty".to_string(),
            });
        }

        match &self.repository {
            RepositoryConfig::Http {
                base_url,
                request_timeout_secs,
                ..
            } => {
                if url::Url::parse(base_url).is_err() {
                    return Err(ConfigError::Invalid {
                        message: format!("repository base_url {:?} is not a valid URL", base_url),
                    });
                }
                if *request_timeout_secs == 0 {
                    return Err(ConfigError::Invalid {
                        message: "request_timeout_secs must be positive".to_string(),
                    });
                }
            }
            RepositoryConfig::Sqlite { path } => {
                if path.trim().is_empty() {
                    return Err(ConfigError::Invalid {
                        message: "sqlite path must not be empty".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
