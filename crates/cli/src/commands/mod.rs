pub mod ask;
pub mod config;
pub mod doctor;

use serde::Serialize;

/// Printed output and process exit code of one subcommand.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// Why a subcommand stopped early. `error_class` is the stable label scripts
/// match on; `source` carries the human-readable chain.
#[derive(Debug)]
pub struct CommandFailure {
    pub error_class: &'static str,
    pub exit_code: u8,
    pub source: anyhow::Error,
}

impl CommandFailure {
    pub fn new(error_class: &'static str, exit_code: u8, source: impl Into<anyhow::Error>) -> Self {
        Self { error_class, exit_code, source: source.into() }
    }
}

pub trait FailWith<T> {
    fn fail_with(self, error_class: &'static str, exit_code: u8) -> Result<T, CommandFailure>;
}

impl<T, E> FailWith<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn fail_with(self, error_class: &'static str, exit_code: u8) -> Result<T, CommandFailure> {
        self.map_err(|error| CommandFailure::new(error_class, exit_code, error))
    }
}

#[derive(Serialize)]
struct Envelope<'a, B: Serialize> {
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<&'static str>,
    #[serde(flatten)]
    body: B,
}

#[derive(Serialize)]
struct FailureBody {
    message: String,
}

/// Renders a command outcome as one JSON object: the success fields of `T`
/// flattened next to `command` and `status`, or `error_class` and `message`.
pub fn render<T: Serialize>(command: &str, outcome: Result<T, CommandFailure>) -> CommandResult {
    match outcome {
        Ok(body) => CommandResult {
            exit_code: 0,
            output: to_json(&Envelope { command, status: "ok", error_class: None, body }),
        },
        Err(failure) => CommandResult {
            exit_code: failure.exit_code,
            output: to_json(&Envelope {
                command,
                status: "error",
                error_class: Some(failure.error_class),
                body: FailureBody { message: format!("{:#}", failure.source) },
            }),
        },
    }
}

fn to_json<B: Serialize>(envelope: &Envelope<'_, B>) -> String {
    serde_json::to_string(envelope).unwrap_or_else(|error| {
        serde_json::json!({
            "command": envelope.command,
            "status": "error",
            "error_class": "serialization",
            "message": error.to_string(),
        })
        .to_string()
    })
}
