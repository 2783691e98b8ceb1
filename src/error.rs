use thiserror::Error;

/// Fatal failures of an extraction call.
///
/// Missing data is never an error: unknown fields stay `None`.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("document unreadable: {0}")]
    Document(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Typed outcome of a failed call to the remote extraction service.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request is missing html or url")]
    BadRequest,

    #[error("no credential configured for the remote service")]
    NoCredential,

    #[error("remote service answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("remote service returned a malformed payload: {reason}")]
    MalformedResponse { reason: String, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl RemoteError {
    /// The caller should ask for a (new) credential.
    pub fn needs_credential(&self) -> bool {
        matches!(self, RemoteError::NoCredential)
            || matches!(self, RemoteError::Status { status, .. } if *status == 401 || *status == 403)
    }

    /// Retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport(_) => true,
            RemoteError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_and_retry_helpers() {
        assert!(RemoteError::NoCredential.needs_credential());
        assert!(RemoteError::Status {
            status: 401,
            body: String::new()
        }
        .needs_credential());
        assert!(RemoteError::Status {
            status: 502,
            body: String::new()
        }
        .is_retryable());
        assert!(!RemoteError::MalformedResponse {
            reason: "eof".to_string(),
            body: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn test_remote_error_converts_into_extract_error() {
        let err: ExtractError = RemoteError::BadRequest.into();
        assert!(matches!(err, ExtractError::Remote(RemoteError::BadRequest)));
        assert_eq!(err.to_string(), "request is missing html or url");
    }
}
