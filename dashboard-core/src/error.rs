use thiserror::Error;

/// Failure of a current-weather or forecast call.
///
/// A paired fetch fails as a unit: if either call returns one of these, the
/// request id it belongs to commits an error instead of weather.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    /// The provider rejected the request, or it never reached the provider.
    #[error("network failure (status {status:?}): {}", .message.as_deref().unwrap_or("no details"))]
    Network {
        status: Option<u16>,
        /// `message` field of the provider's error payload, when it sent one.
        message: Option<String>,
    },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Text shown to the user when this error is committed to the display.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Network { message: Some(message), .. } if !message.is_empty() => {
                message.clone()
            }
            FetchError::Network { status: Some(status), .. } => {
                format!("Request failed with status code {status}")
            }
            FetchError::Network { .. } | FetchError::MalformedResponse(_) => {
                "Failed to fetch".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("location permission denied")]
    Denied,
    #[error("location request timed out")]
    Timeout,
    #[error("location unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("stored value is corrupt: {0}")]
    Corrupt(String),
    #[error("failed to encode value for storage: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_provider_payload() {
        let err = FetchError::Network { status: Some(404), message: Some("city not found".into()) };
        assert_eq!(err.user_message(), "city not found");
    }

    #[test]
    fn user_message_falls_back_to_status_then_generic() {
        let err = FetchError::Network { status: Some(500), message: None };
        assert_eq!(err.user_message(), "Request failed with status code 500");

        let err = FetchError::Network { status: None, message: None };
        assert_eq!(err.user_message(), "Failed to fetch");

        let err = FetchError::MalformedResponse("expected value".into());
        assert_eq!(err.user_message(), "Failed to fetch");
    }

    #[test]
    fn encode_failure_is_not_reported_as_corruption() {
        let source = serde_json::from_str::<Vec<String>>("x").unwrap_err();
        let err = StorageError::Encode(source);

        assert!(err.to_string().starts_with("failed to encode value for storage"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
