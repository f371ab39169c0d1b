use std::env;
use std::sync::{Mutex, OnceLock};

use estatedesk_cli::commands::{config, migrate, seed};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("ESTATEDESK_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert!(payload["error_class"].is_null());
    });
}

#[test]
fn migrate_returns_config_failure_for_malformed_env() {
    with_env(
        &[
            ("ESTATEDESK_DATABASE_URL", "sqlite::memory:"),
            ("ESTATEDESK_NOTIFICATION_QUEUE_CAPACITY", "lots"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn migrate_reports_unreachable_database() {
    with_env(
        &[
            ("ESTATEDESK_DATABASE_URL", "sqlite:///nonexistent-dir/estatedesk.db"),
            ("ESTATEDESK_DATABASE_TIMEOUT_SECS", "1"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 4, "expected db connectivity failure: {}", result.output);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["error_class"], "db_connectivity");
        },
    );
}

#[test]
fn seed_loads_and_lists_the_demo_catalog() {
    with_env(&[("ESTATEDESK_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().expect("message should be a string");
        assert!(message.starts_with("demo catalog loaded:"), "unexpected message: {message}");
        assert!(message.contains("advisor (3)"));
        assert!(message.contains("property (3)"));
        assert!(message.contains("request (1)"));
    });
}

#[test]
fn seed_is_repeatable_against_the_same_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("seed.db").display());

    with_env(&[("ESTATEDESK_DATABASE_URL", url.as_str())], || {
        let first = seed::run();
        let second = seed::run();

        assert_eq!(first.exit_code, 0, "first seed failed: {}", first.output);
        assert_eq!(second.exit_code, 0, "second seed failed: {}", second.output);
        assert_eq!(
            parse_payload(&first.output)["message"],
            parse_payload(&second.output)["message"]
        );
    });
}

#[test]
fn config_attributes_env_overrides_and_redacts_the_api_token() {
    with_env(
        &[
            ("ESTATEDESK_DATABASE_URL", "sqlite::memory:"),
            ("ESTATEDESK_NOTIFICATION_API_TOKEN", "tok_live_0123456789"),
            ("ESTATEDESK_LOG_LEVEL", "debug"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);

            let output = result.output;
            assert!(output.contains(
                "- database.url = sqlite::memory: (source: env (ESTATEDESK_DATABASE_URL))"
            ));
            assert!(output.contains(
                "- notification.api_token = tok_*** (source: env (ESTATEDESK_NOTIFICATION_API_TOKEN))"
            ));
            assert!(
                output.contains("- logging.level = debug (source: env (ESTATEDESK_LOG_LEVEL))")
            );
            assert!(output.contains("- server.port = 8080 (source: default)"));
            assert!(!output.contains("0123456789"));
        },
    );
}

#[test]
fn config_returns_structured_failure_for_invalid_values() {
    with_env(&[("ESTATEDESK_SERVER_PORT", "not-a-port")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(last_line(output)).expect("command output should be valid json")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "ESTATEDESK_DATABASE_URL",
        "ESTATEDESK_DATABASE_MAX_CONNECTIONS",
        "ESTATEDESK_DATABASE_TIMEOUT_SECS",
        "ESTATEDESK_SERVER_BIND_ADDRESS",
        "ESTATEDESK_SERVER_PORT",
        "ESTATEDESK_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "ESTATEDESK_NOTIFICATION_ENABLED",
        "ESTATEDESK_NOTIFICATION_ENDPOINT",
        "ESTATEDESK_NOTIFICATION_API_TOKEN",
        "ESTATEDESK_NOTIFICATION_QUEUE_CAPACITY",
        "ESTATEDESK_NOTIFICATION_TIMEOUT_SECS",
        "ESTATEDESK_LOGGING_LEVEL",
        "ESTATEDESK_LOGGING_FORMAT",
        "ESTATEDESK_LOG_LEVEL",
        "ESTATEDESK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
