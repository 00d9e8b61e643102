use std::env;
use std::sync::{Mutex, OnceLock};

use remedi_cli::commands::{chat, doctor, migrate, seed};
use serde_json::Value;

/// Commands open and close their own pool per invocation, so the tests need a
/// database that outlives a single connection.
fn temp_db_url(name: &str) -> String {
    let path = env::temp_dir().join(format!("remedi-cli-{name}-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);
    format!("sqlite://{}?mode=rwc", path.display())
}

#[test]
fn migrate_returns_success_with_valid_env() {
    let url = temp_db_url("migrate");
    with_env(&[("REMEDI_DATABASE_URL", url.as_str())], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn seed_reports_the_demo_dataset_shape() {
    let url = temp_db_url("seed-shape");
    with_env(&[("REMEDI_DATABASE_URL", url.as_str())], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected deterministic seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("5 medicines"));
        assert!(message.contains("1 users"));
        assert!(message.contains("2 prescriptions"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let url = temp_db_url("seed-idempotent");
    with_env(&[("REMEDI_DATABASE_URL", url.as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        assert_eq!(parse_payload(&first.output)["message"], parse_payload(&second.output)["message"]);
    });
}

#[test]
fn doctor_json_reports_database_connectivity() {
    with_env(&[("REMEDI_DATABASE_URL", "sqlite::memory:")], || {
        let report = parse_payload(&doctor::run(true));
        assert_eq!(report["overall_status"], "pass");

        let checks = report["checks"].as_array().expect("doctor report lists checks");
        let database = checks
            .iter()
            .find(|check| check["name"] == "database_connectivity")
            .expect("database connectivity check present");
        assert_eq!(database["status"], "pass");
    });
}

#[test]
fn doctor_warns_when_no_provider_keys_are_configured() {
    with_env(&[("REMEDI_DATABASE_URL", "sqlite::memory:")], || {
        let report = parse_payload(&doctor::run(true));
        let checks = report["checks"].as_array().expect("doctor report lists checks");
        let primary = checks
            .iter()
            .find(|check| check["name"] == "primary_provider_key")
            .expect("primary provider check present");
        assert_eq!(primary["status"], "warn");
    });
}

#[test]
fn chat_answers_even_without_provider_keys() {
    let url = temp_db_url("chat");
    with_env(&[("REMEDI_DATABASE_URL", url.as_str())], || {
        let result = chat::run("user-demo-001", "hello there");
        assert_eq!(result.exit_code, 0, "expected chat turn to complete");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["intent"], "Fallback");
        assert_eq!(payload["workflow_status"], "COMPLETED_CONVERSATION");
        assert!(!payload["answer"].as_str().unwrap_or("").is_empty());
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "REMEDI_CONFIG",
        "REMEDI_DATABASE_URL",
        "REMEDI_LOG_LEVEL",
        "REMEDI_PRIMARY_API_KEY",
        "REMEDI_SECONDARY_API_KEY",
        "REMEDI_FULFILLMENT_WEBHOOK_URL",
        "REMEDI_LOW_STOCK_WEBHOOK_URL",
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
