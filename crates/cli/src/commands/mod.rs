pub mod chat;
pub mod migrate;
pub mod seed;

use serde::Serialize;

/// What `main` needs from a finished command: the JSON envelope for stdout
/// and the process exit code.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// A failure inside a command body. `class` becomes the machine-readable
/// `error_class` in the envelope and `code` the process exit code.
#[derive(Debug)]
pub(crate) struct CommandError {
    pub class: &'static str,
    pub code: u8,
    pub message: String,
}

impl CommandError {
    pub fn new(class: &'static str, code: u8, message: impl Into<String>) -> Self {
        Self { class, code, message: message.into() }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Ok,
    Error,
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    command: &'a str,
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<&'static str>,
    message: &'a str,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let envelope =
            Envelope { command, status: Status::Ok, error_class: None, message: &message };
        Self { exit_code: 0, output: render(&envelope) }
    }

    pub(crate) fn from_error(command: &str, error: CommandError) -> Self {
        let envelope = Envelope {
            command,
            status: Status::Error,
            error_class: Some(error.class),
            message: &error.message,
        };
        Self { exit_code: error.code, output: render(&envelope) }
    }
}

fn render(envelope: &Envelope<'_>) -> String {
    serde_json::to_string(envelope).unwrap_or_else(|_| {
        concat!(
            r#"{"command":"unknown","status":"error","#,
            r#""error_class":"serialization","message":"could not encode command output"}"#,
        )
        .to_string()
    })
}
