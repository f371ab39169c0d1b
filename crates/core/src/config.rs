//! Runtime configuration.
//!
//! Values are layered: built-in defaults, then `estatedesk.toml` (or
//! `config/estatedesk.toml`) with `${VAR}` interpolation, then `ESTATEDESK_*`
//! environment variables, then programmatic overrides. The merged result is
//! validated once at the end.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["estatedesk.toml", "config/estatedesk.toml"];

/// A configurable setting: its dotted path in the TOML file and the
/// environment variables that override it, highest priority first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigKey {
    pub path: &'static str,
    pub env: &'static [&'static str],
}

pub mod keys {
    use super::ConfigKey;

    pub const DATABASE_URL: ConfigKey =
        ConfigKey { path: "database.url", env: &["ESTATEDESK_DATABASE_URL"] };
    pub const DATABASE_MAX_CONNECTIONS: ConfigKey = ConfigKey {
        path: "database.max_connections",
        env: &["ESTATEDESK_DATABASE_MAX_CONNECTIONS"],
    };
    pub const DATABASE_TIMEOUT_SECS: ConfigKey =
        ConfigKey { path: "database.timeout_secs", env: &["ESTATEDESK_DATABASE_TIMEOUT_SECS"] };
    pub const SERVER_BIND_ADDRESS: ConfigKey =
        ConfigKey { path: "server.bind_address", env: &["ESTATEDESK_SERVER_BIND_ADDRESS"] };
    pub const SERVER_PORT: ConfigKey =
        ConfigKey { path: "server.port", env: &["ESTATEDESK_SERVER_PORT"] };
    pub const SERVER_GRACEFUL_SHUTDOWN_SECS: ConfigKey = ConfigKey {
        path: "server.graceful_shutdown_secs",
        env: &["ESTATEDESK_SERVER_GRACEFUL_SHUTDOWN_SECS"],
    };
    pub const NOTIFICATION_ENABLED: ConfigKey =
        ConfigKey { path: "notification.enabled", env: &["ESTATEDESK_NOTIFICATION_ENABLED"] };
    pub const NOTIFICATION_ENDPOINT: ConfigKey =
        ConfigKey { path: "notification.endpoint", env: &["ESTATEDESK_NOTIFICATION_ENDPOINT"] };
    pub const NOTIFICATION_API_TOKEN: ConfigKey = ConfigKey {
        path: "notification.api_token",
        env: &["ESTATEDESK_NOTIFICATION_API_TOKEN"],
    };
    pub const NOTIFICATION_REQUEST_SUBJECT: ConfigKey =
        ConfigKey { path: "notification.request_subject", env: &[] };
    pub const NOTIFICATION_REASSIGNMENT_SUBJECT: ConfigKey =
        ConfigKey { path: "notification.reassignment_subject", env: &[] };
    pub const NOTIFICATION_QUEUE_CAPACITY: ConfigKey = ConfigKey {
        path: "notification.queue_capacity",
        env: &["ESTATEDESK_NOTIFICATION_QUEUE_CAPACITY"],
    };
    pub const NOTIFICATION_TIMEOUT_SECS: ConfigKey = ConfigKey {
        path: "notification.timeout_secs",
        env: &["ESTATEDESK_NOTIFICATION_TIMEOUT_SECS"],
    };
    pub const LOGGING_LEVEL: ConfigKey = ConfigKey {
        path: "logging.level",
        env: &["ESTATEDESK_LOGGING_LEVEL", "ESTATEDESK_LOG_LEVEL"],
    };
    pub const LOGGING_FORMAT: ConfigKey = ConfigKey {
        path: "logging.format",
        env: &["ESTATEDESK_LOGGING_FORMAT", "ESTATEDESK_LOG_FORMAT"],
    };
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub notification: NotificationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Advisor e-mail delivery. When `enabled` is false the queue still runs but
/// every message is dropped by a no-op transport.
#[derive(Clone, Debug)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub api_token: Option<SecretString>,
    pub request_subject: String,
    pub reassignment_subject: String,
    pub queue_capacity: usize,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unsupported log format `{other}`")),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub notification_enabled: Option<bool>,
    pub notification_endpoint: Option<String>,
    pub notification_api_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("config file references unset environment variable `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated `${{...}}` expression in config file")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://estatedesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            notification: NotificationConfig {
                enabled: false,
                endpoint: "http://localhost:5000/email".to_string(),
                api_token: None,
                request_subject: "New request for one of your properties".to_string(),
                reassignment_subject: "Request assignment update".to_string(),
                queue_capacity: 256,
                timeout_secs: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match find_config_file(options.config_path.as_deref()) {
            Some(path) => config.merge_file(read_file_layer(&path)?),
            None if options.require_file => {
                let expected = options
                    .config_path
                    .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        config.merge_env()?;
        config.merge_overrides(options.overrides);
        config.validate()?;
        Ok(config)
    }

    fn merge_file(&mut self, layer: FileLayer) {
        let FileLayer { database, server, notification, logging } = layer;

        if let Some(database) = database {
            replace(&mut self.database.url, database.url);
            replace(&mut self.database.max_connections, database.max_connections);
            replace(&mut self.database.timeout_secs, database.timeout_secs);
        }
        if let Some(server) = server {
            replace(&mut self.server.bind_address, server.bind_address);
            replace(&mut self.server.port, server.port);
            replace(&mut self.server.graceful_shutdown_secs, server.graceful_shutdown_secs);
        }
        if let Some(notification) = notification {
            let target = &mut self.notification;
            replace(&mut target.enabled, notification.enabled);
            replace(&mut target.endpoint, notification.endpoint);
            if let Some(token) = notification.api_token {
                target.api_token = Some(token.into());
            }
            replace(&mut target.request_subject, notification.request_subject);
            replace(&mut target.reassignment_subject, notification.reassignment_subject);
            replace(&mut target.queue_capacity, notification.queue_capacity);
            replace(&mut target.timeout_secs, notification.timeout_secs);
        }
        if let Some(logging) = logging {
            replace(&mut self.logging.level, logging.level);
            replace(&mut self.logging.format, logging.format);
        }
    }

    fn merge_env(&mut self) -> Result<(), ConfigError> {
        replace(&mut self.database.url, env_value(keys::DATABASE_URL)?);
        replace(&mut self.database.max_connections, env_value(keys::DATABASE_MAX_CONNECTIONS)?);
        replace(&mut self.database.timeout_secs, env_value(keys::DATABASE_TIMEOUT_SECS)?);

        replace(&mut self.server.bind_address, env_value(keys::SERVER_BIND_ADDRESS)?);
        replace(&mut self.server.port, env_value(keys::SERVER_PORT)?);
        replace(
            &mut self.server.graceful_shutdown_secs,
            env_value(keys::SERVER_GRACEFUL_SHUTDOWN_SECS)?,
        );

        let notification = &mut self.notification;
        replace(&mut notification.enabled, env_value(keys::NOTIFICATION_ENABLED)?);
        replace(&mut notification.endpoint, env_value(keys::NOTIFICATION_ENDPOINT)?);
        if let Some(token) = env_value::<String>(keys::NOTIFICATION_API_TOKEN)? {
            notification.api_token = Some(token.into());
        }
        replace(&mut notification.queue_capacity, env_value(keys::NOTIFICATION_QUEUE_CAPACITY)?);
        replace(&mut notification.timeout_secs, env_value(keys::NOTIFICATION_TIMEOUT_SECS)?);

        replace(&mut self.logging.level, env_value(keys::LOGGING_LEVEL)?);
        replace(&mut self.logging.format, env_value(keys::LOGGING_FORMAT)?);
        Ok(())
    }

    fn merge_overrides(&mut self, overrides: ConfigOverrides) {
        replace(&mut self.database.url, overrides.database_url);
        replace(&mut self.logging.level, overrides.log_level);
        replace(&mut self.server.port, overrides.server_port);
        replace(&mut self.notification.enabled, overrides.notification_enabled);
        replace(&mut self.notification.endpoint, overrides.notification_endpoint);
        if let Some(token) = overrides.notification_api_token {
            self.notification.api_token = Some(token.into());
        }
    }

    /// Checks the merged configuration and reports the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let database = &self.database;
        let url = database.url.trim();
        require(
            url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:",
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)",
        )?;
        require(database.max_connections > 0, "database.max_connections must be at least 1")?;
        require(
            (1..=300).contains(&database.timeout_secs),
            "database.timeout_secs must be in range 1..=300",
        )?;

        require(self.server.port > 0, "server.port must be greater than zero")?;
        require(
            self.server.graceful_shutdown_secs > 0,
            "server.graceful_shutdown_secs must be greater than zero",
        )?;

        let notification = &self.notification;
        require(
            (1..=10_000).contains(&notification.queue_capacity),
            "notification.queue_capacity must be in range 1..=10000",
        )?;
        require(
            (1..=300).contains(&notification.timeout_secs),
            "notification.timeout_secs must be in range 1..=300",
        )?;
        require(
            !notification.request_subject.trim().is_empty()
                && !notification.reassignment_subject.trim().is_empty(),
            "notification subjects must not be empty",
        )?;
        if notification.enabled {
            let endpoint = notification.endpoint.trim();
            require(
                endpoint.starts_with("http://") || endpoint.starts_with("https://"),
                "notification.endpoint must start with http:// or https:// when notifications \
                 are enabled",
            )?;
            require(
                notification
                    .api_token
                    .as_ref()
                    .map_or(true, |token| !token.expose_secret().trim().is_empty()),
                "notification.api_token must not be blank when set",
            )?;
        }

        require(
            matches!(
                self.logging.level.trim().to_ascii_lowercase().as_str(),
                "trace" | "debug" | "info" | "warn" | "error"
            ),
            "logging.level must be one of trace|debug|info|warn|error",
        )
    }
}

fn replace<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn require(condition: bool, message: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Validation(message.to_string()))
    }
}

/// First non-blank variable among `key.env`, parsed as `T`.
fn env_value<T: FromStr>(key: ConfigKey) -> Result<Option<T>, ConfigError> {
    let Some((name, raw)) = key.env.iter().find_map(|name| {
        env::var(name).ok().filter(|value| !value.trim().is_empty()).map(|value| (*name, value))
    }) else {
        return Ok(None);
    };

    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnvOverride { key: name.to_string(), value: raw })
}

fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => CONFIG_FILE_CANDIDATES.iter().map(PathBuf::from).find(|path| path.exists()),
    }
}

fn read_file_layer(path: &Path) -> Result<FileLayer, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&expand_env_references(&raw)?)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replaces every `${NAME}` with the value of that environment variable.
fn expand_env_references(input: &str) -> Result<String, ConfigError> {
    let mut expanded = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        expanded.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let (name, tail) =
            after_open.split_once('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let value = env::var(name)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: name.to_string() })?;
        expanded.push_str(&value);
        rest = tail;
    }

    expanded.push_str(rest);
    Ok(expanded)
}

/// Shape of the TOML file; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileLayer {
    database: Option<DatabaseLayer>,
    server: Option<ServerLayer>,
    notification: Option<NotificationLayer>,
    logging: Option<LoggingLayer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatabaseLayer {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerLayer {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NotificationLayer {
    enabled: Option<bool>,
    endpoint: Option<String>,
    api_token: Option<String>,
    request_subject: Option<String>,
    reassignment_subject: Option<String>,
    queue_capacity: Option<usize>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingLayer {
    level: Option<String>,
    format: Option<LogFormat>,
}
