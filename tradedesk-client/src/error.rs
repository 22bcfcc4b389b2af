//! Error taxonomy for backend calls and its mapping to user-facing messages.
//!
//! Library calls return [`ApiError`]. The editor converts it into a
//! [`Failure`], the display-ready value kept in editor state. A status of 0
//! stands for "no response" (connection refused, DNS, timeout).

use serde_json::Value;
use thiserror::Error;
use tradedesk_core::{RecordError, ResourceKind, ValidationErrors};

pub const MSG_NETWORK: &str =
    "Unable to connect to the server. Please check your internet connection.";
pub const MSG_UNAUTHORIZED: &str = "Your session has expired. Please log in again.";
pub const MSG_SERVER: &str = "Server error occurred. Please try again later.";
pub const MSG_INVALID: &str = "Invalid configuration. Please check your inputs.";
pub const MSG_FIX_VALIDATION: &str = "Please fix the validation errors before saving.";

/// Failure without a usable HTTP response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("request failed: {0}")]
    Request(String),

    /// A response arrived but its body could not be read or parsed.
    #[error("response body unreadable: {0}")]
    Body(String),
}

/// Structured errors from [`crate::api::ConfigApi`] calls.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("HTTP {status}")]
    Status { status: u16, body: Option<Value> },

    #[error("unexpected payload: {0}")]
    Decode(#[from] RecordError),

    #[error("unexpected JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} has no server-side validation endpoint")]
    Unsupported(ResourceKind),
}

impl ApiError {
    /// HTTP status, 0 when no response arrived.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Status { status, .. } => *status,
            _ => 0,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            // A response arrived; its body was unusable.
            ApiError::Transport(TransportError::Body(_)) => ErrorKind::Unexpected,
            ApiError::Transport(_) => ErrorKind::Network,
            ApiError::Status { status, .. } => ErrorKind::from_status(*status),
            ApiError::Decode(_) | ApiError::Json(_) | ApiError::Unsupported(_) => {
                ErrorKind::Unexpected
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    fn body(&self) -> Option<&Value> {
        match self {
            ApiError::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}

/// Error class derived from the transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    NotFound,
    Unauthorized,
    Forbidden,
    Validation,
    Conflict,
    Server,
    Unexpected,
}

impl ErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            0 => ErrorKind::Network,
            400 | 422 => ErrorKind::Validation,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Unexpected,
        }
    }

    /// Worth repeating on idempotent reads.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Server)
    }
}

/// What the user was doing; selects the wording of the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Save,
    Delete,
    List,
    Check,
}

impl Operation {
    fn permission_verb(self) -> &'static str {
        match self {
            Operation::Load | Operation::List | Operation::Check => "view",
            Operation::Save => "update",
            Operation::Delete => "delete",
        }
    }

    fn fallback(self) -> &'static str {
        match self {
            Operation::Load => "Failed to load configuration.",
            Operation::Save => "Failed to save configuration. Please try again.",
            Operation::Delete => "Failed to delete configuration. Please try again.",
            Operation::List => "Failed to load configurations.",
            Operation::Check => "Failed to validate configuration.",
        }
    }
}

/// Display-ready description of a failed backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub status: u16,
    pub message: String,
    /// Per-field messages reported by the server on a 400.
    pub field_errors: ValidationErrors,
}

impl Failure {
    /// Map an API error to the message shown for `operation` on `resource`.
    pub fn from_api_error(resource: ResourceKind, operation: Operation, err: &ApiError) -> Self {
        let kind = err.kind();
        let body = err.body();
        let body_message = body
            .and_then(|b| b.get("message"))
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string);

        let mut field_errors = ValidationErrors::new();
        let message = match kind {
            ErrorKind::Network => MSG_NETWORK.to_string(),
            ErrorKind::Unauthorized => MSG_UNAUTHORIZED.to_string(),
            ErrorKind::Forbidden => format!(
                "You do not have permission to {} this configuration.",
                operation.permission_verb()
            ),
            ErrorKind::Server => MSG_SERVER.to_string(),
            ErrorKind::Validation if operation != Operation::Load => {
                if let Some(b) = body {
                    field_errors = field_errors_from_body(b);
                }
                body_message.unwrap_or_else(|| MSG_INVALID.to_string())
            }
            ErrorKind::NotFound
                if matches!(operation, Operation::Save | Operation::Delete | Operation::Check) =>
            {
                format!(
                    "{} not found. It may have been deleted.",
                    resource.display_name()
                )
            }
            ErrorKind::Conflict if operation == Operation::Save => format!(
                "A configuration already exists for this {resource}. Reload it before saving again."
            ),
            _ => body_message.unwrap_or_else(|| operation.fallback().to_string()),
        };

        Self {
            kind,
            status: err.status(),
            message,
            field_errors,
        }
    }

    /// Local refusal to save an invalid record. Never sent to the server.
    pub fn invalid_locally(errors: ValidationErrors) -> Self {
        Self {
            kind: ErrorKind::Validation,
            status: 0,
            message: MSG_FIX_VALIDATION.to_string(),
            field_errors: errors,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Per-field messages from a 400 body.
///
/// Accepts either `{"errors": {"field": "msg" | ["msg", ...]}}` or
/// `{"fieldErrors": [{"field": "...", "message": "..."}]}`.
pub fn field_errors_from_body(body: &Value) -> ValidationErrors {
    let mut out = ValidationErrors::new();

    if let Some(map) = body.get("errors").and_then(Value::as_object) {
        for (field, v) in map {
            let message = match v {
                Value::String(s) => Some(s.clone()),
                Value::Array(items) => items.iter().find_map(Value::as_str).map(str::to_string),
                _ => None,
            };
            if let Some(message) = message {
                out.insert(field.clone(), message);
            }
        }
    }

    if let Some(items) = body.get("fieldErrors").and_then(Value::as_array) {
        for item in items {
            let field = item.get("field").and_then(Value::as_str);
            let message = item
                .get("message")
                .or_else(|| item.get("defaultMessage"))
                .and_then(Value::as_str);
            if let (Some(field), Some(message)) = (field, message) {
                out.insert(field, message);
            }
        }
    }

    out
}
