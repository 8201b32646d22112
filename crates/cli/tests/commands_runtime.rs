use std::env;
use std::sync::{Mutex, OnceLock};

use rahnuma_agent::prompts::SAFETY_REFUSAL;
use rahnuma_cli::commands::{ask, config, doctor};
use serde_json::Value;

const UNREACHABLE_BACKEND: &str = "http://127.0.0.1:9";

#[test]
fn config_reports_env_sources_and_redacts_api_key() {
    with_env(
        &[("RAHNUMA_ORACLE_MODEL", "qalb-test"), ("RAHNUMA_ORACLE_API_KEY", "sk-very-secret")],
        || {
            let output = config::run();

            assert!(output.starts_with("effective config"));
            assert!(output
                .contains("- oracle.model = qalb-test (source: env (RAHNUMA_ORACLE_MODEL))"));
            assert!(output.contains("- oracle.api_key = sk-*** (source: env"));
            assert!(!output.contains("very-secret"), "api key must never be printed");
            assert!(output.contains("- server.port = 8001 (source: default)"));
        },
    );
}

#[test]
fn config_reports_log_alias_as_source() {
    with_env(&[("RAHNUMA_LOG_LEVEL", "debug")], || {
        let output = config::run();
        assert!(output.contains("- logging.level = debug (source: env (RAHNUMA_LOG_LEVEL))"));
    });
}

#[test]
fn config_surfaces_validation_failure() {
    with_env(&[("RAHNUMA_ORACLE_BASE_URL", "localhost:11434")], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed"));
        assert!(output.contains("oracle.base_url"));
    });
}

#[test]
fn doctor_fails_when_backend_is_unreachable() {
    with_env(&[("RAHNUMA_ORACLE_BASE_URL", UNREACHABLE_BACKEND)], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "pass");
        assert_eq!(payload["checks"][1]["name"], "backend_reachability");
        assert_eq!(payload["checks"][1]["status"], "fail");
        assert_eq!(payload["checks"][2]["name"], "model_availability");
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

#[test]
fn doctor_skips_backend_checks_on_invalid_config() {
    with_env(&[("RAHNUMA_SERVER_PORT", "not-a-port")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);

        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation"));
        assert!(result.output.contains("- [skip] backend_reachability"));
    });
}

#[test]
fn ask_refuses_screened_input_without_backend() {
    with_env(&[("RAHNUMA_ORACLE_BASE_URL", UNREACHABLE_BACKEND)], || {
        let result = ask::run("مجھے دوائی بتائیں", Vec::new());
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["intent"], "blocked");
        assert_eq!(payload["safety_passed"], false);
        assert_eq!(payload["reply"], SAFETY_REFUSAL);
        assert!(payload.get("error_class").is_none());
    });
}

#[test]
fn ask_reports_generation_failure_when_backend_is_down() {
    with_env(&[("RAHNUMA_ORACLE_BASE_URL", UNREACHABLE_BACKEND)], || {
        let result = ask::run("آپ کیسے ہیں؟", vec!["صارف: سلام".to_string()]);
        assert_eq!(result.exit_code, 4);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "generation");
    });
}

#[test]
fn ask_rejects_empty_message() {
    with_env(&[], || {
        let result = ask::run("", Vec::new());
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_input");
        assert_eq!(payload["message"], "message must not be empty");
    });
}

#[test]
fn ask_passes_whitespace_message_to_the_pipeline() {
    with_env(&[("RAHNUMA_ORACLE_BASE_URL", UNREACHABLE_BACKEND)], || {
        let result = ask::run("   ", Vec::new());

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "generation", "whitespace is not rejected up front");
        assert_eq!(result.exit_code, 4);
    });
}

#[test]
fn ask_reports_config_failure_with_context() {
    with_env(&[("RAHNUMA_SERVER_PORT", "eighty")], || {
        let result = ask::run("سلام", Vec::new());
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.starts_with("configuration issue: "));
        assert!(message.contains("RAHNUMA_SERVER_PORT"));
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
        "RAHNUMA_ORACLE_BASE_URL",
        "RAHNUMA_ORACLE_MODEL",
        "RAHNUMA_ORACLE_API_KEY",
        "RAHNUMA_ORACLE_TIMEOUT_SECS",
        "RAHNUMA_ORACLE_KEEP_ALIVE",
        "RAHNUMA_SERVER_BIND_ADDRESS",
        "RAHNUMA_SERVER_PORT",
        "RAHNUMA_SERVER_UI_DIR",
        "RAHNUMA_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "RAHNUMA_PIPELINE_MAX_NEW_TOKENS",
        "RAHNUMA_PIPELINE_TEMPERATURE",
        "RAHNUMA_LOGGING_LEVEL",
        "RAHNUMA_LOGGING_FORMAT",
        "RAHNUMA_LOG_LEVEL",
        "RAHNUMA_LOG_FORMAT",
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
