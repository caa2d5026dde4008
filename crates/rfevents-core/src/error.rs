// ── Core error types ──
//
// Errors surfaced by the reconciler, router and store. Plugin transport
// failures arrive as `rfevents_api::Error` and are folded in by `From`.

use thiserror::Error;

use crate::response::StatusMessage;

/// Failure of the subscription store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{table} record {key} already exists")]
    Duplicate { table: &'static str, key: String },

    #[error("{table} record {key} not found")]
    Missing { table: &'static str, key: String },

    #[error("Malformed {table} record {key}: {reason}")]
    Corrupt {
        table: &'static str,
        key: String,
        reason: String,
    },

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Request errors ───────────────────────────────────────────────
    #[error("Malformed JSON: {message}")]
    MalformedJson { message: String },

    #[error("Invalid request: {message}")]
    Validation {
        kind: StatusMessage,
        /// Registry message arguments, e.g. `[value, property]`.
        args: Vec<String>,
        message: String,
    },

    #[error("Destination {destination} is already subscribed")]
    Conflict { destination: String },

    #[error("{entity} not found: {identifier}")]
    NotFound {
        entity: &'static str,
        identifier: String,
    },

    // ── Collaborator errors ──────────────────────────────────────────
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Plugin error: {message}")]
    Plugin {
        message: String,
        status: Option<u16>,
    },

    #[error("Plugin unavailable: {message}")]
    Unavailable { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation<I, S>(kind: StatusMessage, args: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Validation {
            kind,
            args: args.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            identifier: identifier.into(),
        }
    }

    /// HTTP status presented to the API caller.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MalformedJson { .. } | Self::Validation { .. } => 400,
            Self::Conflict { .. } => 409,
            Self::NotFound { .. } => 404,
            Self::Plugin { status, .. } => status.unwrap_or(500),
            Self::Unavailable { .. } => 503,
            Self::Store(_) | Self::Internal(_) => 500,
        }
    }

    /// Redfish status message describing this error.
    pub fn status_message(&self) -> StatusMessage {
        match self {
            Self::MalformedJson { .. } => StatusMessage::MalformedJson,
            Self::Validation { kind, .. } => *kind,
            Self::Conflict { .. } => StatusMessage::ResourceInUse,
            Self::NotFound { .. } => StatusMessage::ResourceNotFound,
            Self::Plugin {
                status: Some(401), ..
            } => StatusMessage::NoValidSession,
            Self::Plugin { .. } | Self::Unavailable { .. } => StatusMessage::GeneralError,
            Self::Store(_) | Self::Internal(_) => StatusMessage::InternalError,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<rfevents_api::Error> for CoreError {
    fn from(err: rfevents_api::Error) -> Self {
        match err {
            rfevents_api::Error::PluginUnavailable { plugin_id, log } => CoreError::Unavailable {
                message: format!("plugin {plugin_id}: {log}"),
            },
            rfevents_api::Error::SessionCreation { .. } | rfevents_api::Error::Unauthorized { .. } => {
                CoreError::Plugin {
                    message: err.to_string(),
                    status: Some(401),
                }
            }
            rfevents_api::Error::Plugin { status, ref body } => CoreError::Plugin {
                message: if body.is_empty() {
                    err.to_string()
                } else {
                    body.clone()
                },
                status: Some(status),
            },
            rfevents_api::Error::Transport(ref e) if e.is_timeout() || e.is_connect() => {
                CoreError::Unavailable {
                    message: err.to_string(),
                }
            }
            other => CoreError::Plugin {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}
