//! CLI error types with miette diagnostics.
//!
//! Maps core, config and store failures into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use rfevents_config::ConfigError;
use rfevents_core::{ApiResponse, CoreError, StoreError};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Service responses ────────────────────────────────────────────
    #[error("Request failed with status {status}: {message}")]
    #[diagnostic(code(rfevents::request_failed))]
    Request {
        status: u16,
        message_id: String,
        message: String,
    },

    #[error("Plugin '{plugin}' not found in the store")]
    #[diagnostic(
        code(rfevents::plugin_not_found),
        help("Plugins are read from the store file. Check its `Plugins` table.")
    )]
    PluginNotFound { plugin: String },

    #[error(transparent)]
    #[diagnostic(code(rfevents::core))]
    Core(#[from] CoreError),

    // ── Store file ───────────────────────────────────────────────────
    #[error("Store file {path} is not a valid snapshot")]
    #[diagnostic(
        code(rfevents::store_file),
        help("The store file must be a JSON object with Subscriptions, Targets, Plugins, ... tables.")
    )]
    StoreFile {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(rfevents::store))]
    Store(#[from] StoreError),

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(rfevents::config),
        help("Check the config file and RFEVENTS_* environment variables.")
    )]
    Config(#[from] ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error("Could not read {path}")]
    #[diagnostic(code(rfevents::io))]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {0}")]
    #[diagnostic(code(rfevents::output))]
    Output(String),
}

impl CliError {
    /// Turn an unsuccessful service response into an error.
    pub fn from_response(response: &ApiResponse) -> Self {
        let message = response
            .body
            .pointer("/error/@Message.ExtendedInfo/0/Message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned();
        Self::Request {
            status: response.status,
            message_id: response.status_message.message_id(),
            message,
        }
    }

    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Request { status, .. } => exit_code_for_status(*status),
            Self::Core(err) => exit_code_for_status(err.status_code()),
            Self::PluginNotFound { .. } => exit_code::NOT_FOUND,
            Self::Config(_) | Self::StoreFile { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

fn exit_code_for_status(status: u16) -> i32 {
    match status {
        400 => exit_code::USAGE,
        401 | 403 => exit_code::AUTH,
        404 => exit_code::NOT_FOUND,
        409 => exit_code::CONFLICT,
        503 => exit_code::CONNECTION,
        _ => exit_code::GENERAL,
    }
}

#[cfg(test)]
mod tests {
    use rfevents_core::StatusMessage;

    use super::*;

    #[test]
    fn failed_responses_carry_registry_message() {
        let response = ApiResponse::error(
            404,
            StatusMessage::ResourceNotFound,
            "",
            vec!["Subscription".into(), "abc".into()],
        );
        let err = CliError::from_response(&response);
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        assert!(err.to_string().contains("Subscription named abc"));
    }

    #[test]
    fn core_errors_map_by_status() {
        let err = CliError::from(CoreError::Conflict {
            destination: "https://listener".into(),
        });
        assert_eq!(err.exit_code(), exit_code::CONFLICT);
    }
}
