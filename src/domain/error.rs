//! Domain error types and user-facing error messages.

use serde_json::Value;

/// Message shown when a failure carries nothing more specific.
pub const FALLBACK_MESSAGE: &str = "Something went wrong";

/// Top-level error type for stratify.
#[derive(Debug, thiserror::Error)]
pub enum StratifyError {
    #[error("transport error: {reason}")]
    Transport { reason: String },

    #[error("request rejected with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("not authenticated")]
    Unauthorized,

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("read-only: {reason}")]
    ReadOnly { reason: String },

    #[error("decode error: {reason}")]
    Decode { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown timezone: {name}")]
    UnknownTimezone { name: String },

    #[error("Indicator type not implemented: {short_name}")]
    UnknownIndicator { short_name: String },

    #[error("{what} not found: {id}")]
    NotFound { what: String, id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StratifyError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        StratifyError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(what: &str, id: impl ToString) -> Self {
        StratifyError::NotFound {
            what: what.to_string(),
            id: id.to_string(),
        }
    }

    /// Short message suitable for a transient notification.
    pub fn user_message(&self) -> String {
        match self {
            StratifyError::Api { message, .. } => message.clone(),
            StratifyError::Transport { reason } => reason.clone(),
            StratifyError::Validation { reason, .. } => reason.clone(),
            StratifyError::ReadOnly { reason } => reason.clone(),
            StratifyError::Unauthorized => "Session expired, please log in again".to_string(),
            StratifyError::UnknownIndicator { .. } => "Indicator type not implemented".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for StratifyError {
    fn from(err: serde_json::Error) -> Self {
        StratifyError::Decode {
            reason: err.to_string(),
        }
    }
}

impl From<csv::Error> for StratifyError {
    fn from(err: csv::Error) -> Self {
        StratifyError::Io(std::io::Error::other(err))
    }
}

impl From<&StratifyError> for std::process::ExitCode {
    fn from(err: &StratifyError) -> Self {
        let code: u8 = match err {
            StratifyError::Io(_) => 1,
            StratifyError::ConfigParse { .. }
            | StratifyError::ConfigMissing { .. }
            | StratifyError::ConfigInvalid { .. }
            | StratifyError::UnknownTimezone { .. } => 2,
            StratifyError::Transport { .. } | StratifyError::Decode { .. } => 3,
            StratifyError::Unauthorized => 4,
            StratifyError::Api { .. } | StratifyError::NotFound { .. } => 5,
            StratifyError::Validation { .. }
            | StratifyError::ReadOnly { .. }
            | StratifyError::UnknownIndicator { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

/// Reduce an API error body to one line.
///
/// `detail` and `non_field_errors` win; otherwise the first field is reported
/// as `field: message`. Array values contribute their first element.
pub fn summarize_error_body(body: &str) -> String {
    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) else {
        return FALLBACK_MESSAGE.to_string();
    };

    for key in ["detail", "non_field_errors"] {
        if let Some(text) = fields.get(key).and_then(first_text) {
            return text;
        }
    }

    fields
        .iter()
        .find_map(|(key, value)| first_text(value).map(|text| format!("{key}: {text}")))
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(first_text),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_prefers_detail() {
        let body = r#"{"username": ["taken"], "detail": "Invalid credentials"}"#;
        assert_eq!(summarize_error_body(body), "Invalid credentials");
    }

    #[test]
    fn summary_takes_first_non_field_error() {
        let body = r#"{"non_field_errors": ["Codes do not match", "second"]}"#;
        assert_eq!(summarize_error_body(body), "Codes do not match");
    }

    #[test]
    fn summary_falls_back_to_first_field() {
        let body = r#"{"email": ["Enter a valid email address."], "username": ["taken"]}"#;
        assert_eq!(
            summarize_error_body(body),
            "email: Enter a valid email address."
        );
    }

    #[test]
    fn summary_of_non_json_body_is_generic() {
        assert_eq!(summarize_error_body("<html>502</html>"), FALLBACK_MESSAGE);
        assert_eq!(summarize_error_body("{}"), FALLBACK_MESSAGE);
        assert_eq!(summarize_error_body("[1, 2]"), FALLBACK_MESSAGE);
    }

    #[test]
    fn summary_renders_non_string_values() {
        assert_eq!(summarize_error_body(r#"{"leverage": 125}"#), "leverage: 125");
    }

    #[test]
    fn user_message_for_api_error_is_summary() {
        let err = StratifyError::Api {
            status: 400,
            message: "name: required".into(),
        };
        assert_eq!(err.user_message(), "name: required");
    }

    #[test]
    fn exit_codes_group_by_category() {
        use std::process::ExitCode;
        let config = StratifyError::ConfigMissing {
            section: "api".into(),
            key: "base_url".into(),
        };
        assert_eq!(ExitCode::from(&config), ExitCode::from(2));
        assert_eq!(ExitCode::from(&StratifyError::Unauthorized), ExitCode::from(4));
        let validation = StratifyError::validation("password", "too short");
        assert_eq!(ExitCode::from(&validation), ExitCode::from(6));
    }
}
