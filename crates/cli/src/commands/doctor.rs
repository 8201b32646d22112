use rahnuma_agent::ollama::OllamaOracle;
use rahnuma_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            checks.extend(check_backend(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.push(DoctorCheck::skipped(
                "backend_reachability",
                "configuration did not load",
            ));
            checks.push(DoctorCheck::skipped("model_availability", "configuration did not load"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_backend(config: &AppConfig) -> Vec<DoctorCheck> {
    let oracle = match OllamaOracle::new(&config.oracle) {
        Ok(oracle) => oracle,
        Err(error) => {
            return vec![
                DoctorCheck::fail("backend_reachability", format!("client setup failed: {error}")),
                DoctorCheck::skipped("model_availability", "the backend client did not build"),
            ];
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "backend_reachability",
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("model_availability", "the async runtime did not start"),
            ];
        }
    };

    let models = match runtime.block_on(oracle.list_models()) {
        Ok(models) => models,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "backend_reachability",
                    format!("could not reach `{}`: {error}", config.oracle.base_url),
                ),
                DoctorCheck::skipped("model_availability", "the backend was unreachable"),
            ];
        }
    };

    let reachability = DoctorCheck::pass(
        "backend_reachability",
        format!("`{}` serves {} model(s)", config.oracle.base_url, models.len()),
    );
    let availability = if model_listed(&models, &config.oracle.model) {
        DoctorCheck::pass("model_availability", format!("`{}` is available", config.oracle.model))
    } else {
        DoctorCheck::fail(
            "model_availability",
            format!("`{}` is not among the served models", config.oracle.model),
        )
    };

    vec![reachability, availability]
}

/// Tags without an explicit version are served as `<name>:latest`.
fn model_listed(models: &[String], wanted: &str) -> bool {
    models.iter().any(|name| {
        name == wanted || name.strip_suffix(":latest").is_some_and(|base| base == wanted)
    })
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
