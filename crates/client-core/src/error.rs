use serde_json::Value;
use thiserror::Error;

/// Stable client error emitted by the transport and sync layers.
///
/// Variants carry only owned data so the error stays `Clone`, which lets a
/// single refresh outcome be shared across every request waiting on it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    /// Transport-level failure: DNS, connection refused, timeout.
    ///
    /// Never retried by the transport itself.
    #[error("network request failed calling {url}: {cause}")]
    Network { url: String, cause: String },

    /// The server answered with a non-2xx status.
    ///
    /// `payload` is the parsed JSON body when present, else the raw text
    /// wrapped in a JSON string.
    #[error("HTTP {status} calling {url}")]
    Http {
        status: u16,
        url: String,
        payload: Option<Value>,
    },

    /// A 2xx body could not be decoded into the expected shape.
    ///
    /// Distinct from an empty 204 response, which decodes as JSON `null`.
    #[error("unexpected response shape from {url}: {cause}")]
    Decode { url: String, cause: String },

    /// Local precondition failure, short-circuited before any network call.
    #[error("validation failure: {0}")]
    Validation(String),

    /// Credential state prevents the operation (for example refreshing
    /// without a refresh token).
    #[error("authentication failure: {0}")]
    Auth(String),

    /// Local session persistence failure.
    #[error("session storage failure: {0}")]
    Storage(String),
}

impl ClientError {
    /// Whether this is the 401 that triggers the refresh flow.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Http { status: 401, .. })
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Best-effort human-readable message from a backend error envelope.
    ///
    /// The backend reports failures as `{ "message": ... }` or
    /// `{ "error": ... }`; fall back to the display form otherwise.
    pub fn server_message(&self) -> String {
        if let Self::Http {
            payload: Some(payload),
            ..
        } = self
        {
            for key in ["message", "error"] {
                if let Some(text) = payload.get(key).and_then(Value::as_str) {
                    return text.to_owned();
                }
            }
            if let Some(text) = payload.as_str() {
                return text.to_owned();
            }
        }
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_http_401_is_unauthorized() {
        let unauthorized = ClientError::Http {
            status: 401,
            url: "http://api.example/chat".into(),
            payload: None,
        };
        let forbidden = ClientError::Http {
            status: 403,
            url: "http://api.example/chat".into(),
            payload: None,
        };
        let network = ClientError::Network {
            url: "http://api.example/chat".into(),
            cause: "connection refused".into(),
        };

        assert!(unauthorized.is_unauthorized());
        assert!(!forbidden.is_unauthorized());
        assert!(!network.is_unauthorized());
        assert!(network.is_network());
    }

    #[test]
    fn extracts_server_message_from_error_envelope() {
        let err = ClientError::Http {
            status: 422,
            url: "http://api.example/chat".into(),
            payload: Some(json!({ "message": "text too long" })),
        };
        assert_eq!(err.server_message(), "text too long");

        let err = ClientError::Http {
            status: 500,
            url: "http://api.example/chat".into(),
            payload: Some(Value::String("boom".into())),
        };
        assert_eq!(err.server_message(), "boom");
    }

    #[test]
    fn falls_back_to_display_form() {
        let err = ClientError::Http {
            status: 503,
            url: "http://api.example/chat".into(),
            payload: None,
        };
        assert_eq!(err.server_message(), "HTTP 503 calling http://api.example/chat");
    }
}
