use serde_json::Value;
use thiserror::Error;

/// Every failure of an API call. Transport and HTTP failures share one type;
/// [`ApiError::status`] tells them apart when a caller cares.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Network(#[from] reqwest::Error),

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Invalid API base URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

fn flatten(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|v| flatten(v, out)),
        Value::Object(map) => map.values().for_each(|v| flatten(v, out)),
        Value::Null => {}
        other => out.push(other.to_string()),
    }
}

/// Best-effort human message from an error body: the `errors` map flattened,
/// else `detail`, else `message`, else a generic status line.
pub fn extract_message(status: u16, body: &[u8]) -> String {
    let fallback = || format!("HTTP error! status: {status}");
    let Ok(data) = serde_json::from_slice::<Value>(body) else {
        return fallback();
    };

    if let Some(errors) = data.get("errors").filter(|e| !e.is_null()) {
        let mut messages = Vec::new();
        flatten(errors, &mut messages);
        if !messages.is_empty() {
            return messages.join(", ");
        }
    }
    ["detail", "message", "error"]
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_str))
        .map_or_else(fallback, str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_is_flattened_and_joined() {
        let body = br#"{"success": false, "errors": {"trip_date": ["Trip date must be in the future"], "non_field_errors": ["You already have an active booking"]}}"#;
        let message = extract_message(400, body);
        assert!(message.contains("Trip date must be in the future"));
        assert!(message.contains("You already have an active booking"));
        assert!(message.contains(", "));
    }

    #[test]
    fn string_values_in_errors_map_are_kept() {
        let body = br#"{"errors": {"otp": "Invalid OTP"}}"#;
        assert_eq!(extract_message(400, body), "Invalid OTP");
    }

    #[test]
    fn detail_is_used_without_errors() {
        let body = br#"{"detail": "Authentication credentials were not provided."}"#;
        assert_eq!(
            extract_message(401, body),
            "Authentication credentials were not provided."
        );
    }

    #[test]
    fn message_field_is_a_late_fallback() {
        let body = br#"{"success": false, "message": "No active booking found"}"#;
        assert_eq!(extract_message(404, body), "No active booking found");
    }

    #[test]
    fn non_json_body_gives_status_line() {
        assert_eq!(extract_message(502, b"<html>bad gateway</html>"), "HTTP error! status: 502");
        assert_eq!(extract_message(500, br#"{"errors": {}}"#), "HTTP error! status: 500");
    }
}
