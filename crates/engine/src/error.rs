//! Error kinds surfaced by the runtime.

use std::io;

use thiserror::Error;

pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid manifest for {extension}: {reason}")]
    Manifest { extension: String, reason: String },

    #[error("{operation} timed out after {timeout_ms}ms")]
    InvocationTimeout { operation: String, timeout_ms: u64 },

    /// Non-zero exit in a mode where that is fatal. Displays stderr verbatim.
    #[error("{}", exit_message(.command, .code, .stderr))]
    ExtensionExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("malformed page: {reason}")]
    MalformedPage { reason: String },

    #[error("missing required input '{name}'")]
    UnresolvedInput { name: String },

    #[error("invalid value for input '{name}': {reason}")]
    InvalidInput { name: String, reason: String },

    #[error("unknown command '{command}' in {extension}")]
    UnknownCommand { extension: String, command: String },

    #[error("unknown action: {reference}")]
    UnknownAction { reference: String },

    #[error("'{directive}' is not allowed here: {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("unknown extension '{name}'")]
    UnknownExtension { name: String },

    #[error("{operation} was cancelled")]
    Cancelled { operation: String },

    #[error("the session has ended")]
    SessionEnded,

    #[error("{collaborator} failed: {message}")]
    Collaborator { collaborator: &'static str, message: String },

    #[error("could not encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("i/o error running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

fn exit_message(command: &str, code: &Option<i32>, stderr: &str) -> String {
    let trimmed = stderr.trim_end();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    match code {
        Some(code) => format!("{command} exited with code {code}"),
        None => format!("{command} was terminated by a signal"),
    }
}

impl RuntimeError {
    pub fn manifest(extension: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Manifest {
            extension: extension.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::InvocationTimeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn malformed_page(reason: impl Into<String>) -> Self {
        Self::MalformedPage { reason: reason.into() }
    }

    pub fn unresolved_input(name: impl Into<String>) -> Self {
        Self::UnresolvedInput { name: name.into() }
    }

    pub fn invalid_input(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown_command(extension: impl Into<String>, command: impl Into<String>) -> Self {
        Self::UnknownCommand {
            extension: extension.into(),
            command: command.into(),
        }
    }

    pub fn unknown_action(reference: impl Into<String>) -> Self {
        Self::UnknownAction {
            reference: reference.into(),
        }
    }

    pub fn invalid_directive(directive: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDirective {
            directive: directive.into(),
            reason: reason.into(),
        }
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    pub fn collaborator(collaborator: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Collaborator {
            collaborator,
            message: error.to_string(),
        }
    }

    /// Errors raised by an in-stack action that the user may simply retry.
    /// The current frame is always left intact when one of these occurs.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvocationTimeout { .. }
                | Self::ExtensionExit { .. }
                | Self::MalformedPage { .. }
                | Self::UnresolvedInput { .. }
                | Self::InvalidInput { .. }
                | Self::Cancelled { .. }
                | Self::Collaborator { .. }
                | Self::Io { .. }
        )
    }
}
