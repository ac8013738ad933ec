use keel_core::FieldError;
use keel_core::field::describe_errors;

/// Everything a client call can fail with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// Caught locally; no request was sent.
    #[error("invalid input: {}", describe_errors(.0))]
    Validation(Vec<FieldError>),
    #[error("not signed in or session expired")]
    Unauthorized,
    #[error("request failed ({status} {code}): {message}")]
    Http { status: u16, code: String, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Transient failures worth another attempt: connection problems and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network(_) => true,
            ClientError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Short text suitable for a notification.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(errors) => describe_errors(errors),
            ClientError::Unauthorized => "Please sign in again".to_string(),
            ClientError::Http { message, .. } => message.clone(),
            ClientError::Network(_) => "Could not reach the server".to_string(),
            ClientError::Decode(_) => "Unexpected response from the server".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_and_server_errors_are_retryable() {
        assert!(ClientError::Network("reset".into()).is_retryable());
        assert!(
            ClientError::Http { status: 503, code: "unavailable".into(), message: String::new() }.is_retryable()
        );
        assert!(
            !ClientError::Http { status: 409, code: "conflict".into(), message: String::new() }.is_retryable()
        );
        assert!(!ClientError::Unauthorized.is_retryable());
        assert!(!ClientError::Validation(vec![]).is_retryable());
    }

    #[test]
    fn validation_message_lists_fields() {
        let err = ClientError::Validation(vec![
            FieldError::new("amount", "is required"),
            FieldError::new("description", "is required"),
        ]);
        assert_eq!(err.user_message(), "amount is required; description is required");
        assert_eq!(err.to_string(), "invalid input: amount is required; description is required");
    }
}
