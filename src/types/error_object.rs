use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The envelope OpenAI-compatible endpoints wrap error details in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The error details.
    pub error: ErrorObject,
}

/// Error details reported by the endpoint.
///
/// Every field is optional because providers fill in different subsets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Human-readable error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Error type string, e.g. `invalid_request_error`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    /// Parameter that caused the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,

    /// Provider-specific code; OpenRouter uses HTTP status numbers, OpenAI uses strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
}

impl ErrorObject {
    /// Returns the code as an HTTP status when it is a number in the status range.
    pub fn status_code(&self) -> Option<u16> {
        let code = match self.code.as_ref()? {
            Value::Number(n) => n.as_u64()?,
            Value::String(s) => s.parse::<u64>().ok()?,
            _ => return None,
        };
        if (100..=599).contains(&code) {
            Some(code as u16)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn openai_error_body() {
        let response: ErrorResponse = serde_json::from_value(json!({
            "error": {
                "message": "Incorrect API key provided",
                "type": "invalid_request_error",
                "param": null,
                "code": "invalid_api_key"
            }
        }))
        .unwrap();
        assert_eq!(
            response.error.message.as_deref(),
            Some("Incorrect API key provided")
        );
        assert_eq!(
            response.error.error_type.as_deref(),
            Some("invalid_request_error")
        );
        assert_eq!(response.error.status_code(), None);
    }

    #[test]
    fn openrouter_numeric_code() {
        let response: ErrorResponse = serde_json::from_value(json!({
            "error": {"message": "No auth credentials found", "code": 401}
        }))
        .unwrap();
        assert_eq!(response.error.status_code(), Some(401));
    }

    #[test]
    fn out_of_range_code_is_ignored() {
        let object = ErrorObject {
            code: Some(json!(42)),
            ..ErrorObject::default()
        };
        assert_eq!(object.status_code(), None);
    }
}
