use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use estatedesk_core::config::{keys, AppConfig, ConfigKey, CONFIG_FILE_CANDIDATES};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{load_config, CommandResult};

/// One rendered setting next to the key that describes where it can come from.
struct ConfigField {
    key: ConfigKey,
    value: String,
}

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(effective_fields(&config).into_iter().map(|field| {
        let source = field_source(
            field.key.path,
            field.key.env,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        render_line(field.key.path, &field.value, source)
    }));

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn effective_fields(config: &AppConfig) -> Vec<ConfigField> {
    let database = &config.database;
    let server = &config.server;
    let notification = &config.notification;
    let api_token = notification
        .api_token
        .as_ref()
        .map(|token| redact_token(token.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    [
        (keys::DATABASE_URL, database.url.clone()),
        (keys::DATABASE_MAX_CONNECTIONS, database.max_connections.to_string()),
        (keys::DATABASE_TIMEOUT_SECS, database.timeout_secs.to_string()),
        (keys::SERVER_BIND_ADDRESS, server.bind_address.clone()),
        (keys::SERVER_PORT, server.port.to_string()),
        (keys::SERVER_GRACEFUL_SHUTDOWN_SECS, server.graceful_shutdown_secs.to_string()),
        (keys::NOTIFICATION_ENABLED, notification.enabled.to_string()),
        (keys::NOTIFICATION_ENDPOINT, notification.endpoint.clone()),
        (keys::NOTIFICATION_API_TOKEN, api_token),
        (keys::NOTIFICATION_REQUEST_SUBJECT, notification.request_subject.clone()),
        (keys::NOTIFICATION_REASSIGNMENT_SUBJECT, notification.reassignment_subject.clone()),
        (keys::NOTIFICATION_QUEUE_CAPACITY, notification.queue_capacity.to_string()),
        (keys::NOTIFICATION_TIMEOUT_SECS, notification.timeout_secs.to_string()),
        (keys::LOGGING_LEVEL, config.logging.level.clone()),
        (keys::LOGGING_FORMAT, format!("{:?}", config.logging.format)),
    ]
    .into_iter()
    .map(|(key, value)| ConfigField { key, value })
    .collect()
}

fn detect_config_path() -> Option<PathBuf> {
    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a short prefix so operators can tell tokens apart without leaking them.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if trimmed.len() > 8 && trimmed.is_char_boundary(4) {
        return format!("{}***", &trimmed[..4]);
    }
    "<redacted>".to_string()
}
