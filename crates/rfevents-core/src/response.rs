// ── Redfish responses ──
//
// Outcome of a client-facing operation: HTTP status, optional `Location`
// and a JSON body. Failures carry the Redfish error envelope with one
// `@Message.ExtendedInfo` entry.

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::CoreError;

const BASE_REGISTRY: &str = "Base.1.13.0";
const MESSAGE_ODATA_TYPE: &str = "#Message.v1_0_8.Message";
const ERROR_HELPER: &str = "An error has occurred. See ExtendedInfo for more information.";

/// Base registry messages produced by the event service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum StatusMessage {
    Success,
    Created,
    ResourceRemoved,
    PropertyUnknown,
    PropertyValueNotInList,
    PropertyValueFormatError,
    PropertyValueTypeError,
    PropertyMissing,
    PropertyValueConflict,
    #[strum(to_string = "MalformedJSON")]
    MalformedJson,
    ResourceInUse,
    ResourceNotFound,
    InternalError,
    NoValidSession,
    GeneralError,
}

impl StatusMessage {
    pub fn message_id(self) -> String {
        format!("{BASE_REGISTRY}.{self}")
    }

    fn severity(self) -> &'static str {
        match self {
            Self::Success | Self::Created | Self::ResourceRemoved => "OK",
            Self::InternalError | Self::NoValidSession | Self::GeneralError => "Critical",
            _ => "Warning",
        }
    }

    fn describe(self, args: &[String], detail: &str) -> String {
        let arg = |i: usize| args.get(i).map_or("", String::as_str);
        let text = match self {
            Self::Success => "Successfully Completed Request".to_owned(),
            Self::Created => "The resource has been created successfully.".to_owned(),
            Self::ResourceRemoved => "The resource has been removed successfully.".to_owned(),
            Self::PropertyUnknown => {
                format!("The property {} is not in the list of valid properties for the resource.", arg(0))
            }
            Self::PropertyValueNotInList => format!(
                "The value {} for the property {} is not in the list of acceptable values.",
                arg(0),
                arg(1)
            ),
            Self::PropertyValueFormatError => format!(
                "The value {} for the property {} is of a different format than the property can accept.",
                arg(0),
                arg(1)
            ),
            Self::PropertyValueTypeError => format!(
                "The value {} for the property {} is of a different type than the property can accept.",
                arg(0),
                arg(1)
            ),
            Self::PropertyMissing => format!(
                "The property {} is a required property and must be included in the request.",
                arg(0)
            ),
            Self::PropertyValueConflict => format!(
                "The property {} could not be written because its value would conflict with the value of the {} property.",
                arg(0),
                arg(1)
            ),
            Self::MalformedJson => "The request body submitted was malformed JSON and could not be parsed by the receiving service.".to_owned(),
            Self::ResourceInUse => "The change to the requested resource failed because the resource is in use or in transition.".to_owned(),
            Self::ResourceNotFound => {
                format!("The requested resource of type {} named {} was not found.", arg(0), arg(1))
            }
            Self::InternalError => "The request failed due to an internal service error.  The service is still operational.".to_owned(),
            Self::NoValidSession => "There is no valid session established with the implementation.".to_owned(),
            Self::GeneralError => "A general error has occurred. See Resolution for details.".to_owned(),
        };
        if detail.is_empty() {
            text
        } else {
            format!("{text} {detail}")
        }
    }
}

/// A Redfish `@Message.ExtendedInfo` entry.
#[derive(Debug, Clone, Serialize)]
pub struct ExtendedInfo {
    #[serde(rename = "@odata.type")]
    pub odata_type: &'static str,
    #[serde(rename = "MessageId")]
    pub message_id: String,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Severity")]
    pub severity: &'static str,
    #[serde(rename = "MessageArgs", skip_serializing_if = "Vec::is_empty")]
    pub message_args: Vec<String>,
}

impl ExtendedInfo {
    pub fn new(status: StatusMessage, args: Vec<String>, detail: &str) -> Self {
        Self {
            odata_type: MESSAGE_ODATA_TYPE,
            message_id: status.message_id(),
            message: status.describe(&args, detail),
            severity: status.severity(),
            message_args: args,
        }
    }
}

/// `{"error": {...}}` body for a failed request.
pub fn error_body(status: StatusMessage, detail: &str, args: Vec<String>) -> Value {
    json!({
        "error": {
            "code": format!("{BASE_REGISTRY}.GeneralError"),
            "message": ERROR_HELPER,
            "@Message.ExtendedInfo": [ExtendedInfo::new(status, args, detail)],
        }
    })
}

/// Result of a client-facing operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub status_message: StatusMessage,
    pub location: Option<String>,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            status_message: StatusMessage::Success,
            location: None,
            body,
        }
    }

    pub fn created(location: impl Into<String>, body: Value) -> Self {
        Self {
            status: 201,
            status_message: StatusMessage::Created,
            location: Some(location.into()),
            body,
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            status_message: StatusMessage::Success,
            location: None,
            body: Value::Null,
        }
    }

    /// Error response with explicit registry message arguments.
    pub fn error(status: u16, message: StatusMessage, detail: &str, args: Vec<String>) -> Self {
        Self {
            status,
            status_message: message,
            location: None,
            body: error_body(message, detail, args),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl From<&CoreError> for ApiResponse {
    fn from(err: &CoreError) -> Self {
        let args = match err {
            CoreError::Validation { args, .. } => args.clone(),
            CoreError::NotFound { entity, identifier } => {
                vec![(*entity).to_owned(), identifier.clone()]
            }
            _ => Vec::new(),
        };
        ApiResponse::error(err.status_code(), err.status_message(), &err.to_string(), args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_body_has_extended_info() {
        let body = error_body(
            StatusMessage::PropertyMissing,
            "",
            vec!["Destination".into()],
        );
        let info = &body["error"]["@Message.ExtendedInfo"][0];
        assert_eq!(info["MessageId"], "Base.1.13.0.PropertyMissing");
        assert_eq!(info["MessageArgs"], json!(["Destination"]));
        assert!(info["Message"].as_str().unwrap_or_default().contains("Destination"));
    }

    #[test]
    fn core_error_converts_to_response() {
        let resp = ApiResponse::from(&CoreError::not_found("EventDestination", "42"));
        assert_eq!(resp.status, 404);
        assert_eq!(resp.status_message, StatusMessage::ResourceNotFound);
        assert!(!resp.is_success());
    }

    #[test]
    fn malformed_json_keeps_registry_spelling() {
        assert_eq!(StatusMessage::MalformedJson.message_id(), "Base.1.13.0.MalformedJSON");
    }
}
