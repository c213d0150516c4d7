//! Error types
//!
//! The registries never fail; errors only come from the server around them
//! (binding the socket) and from malformed client requests.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for relay operations
#[derive(Debug)]
pub enum Error {
    /// I/O error while binding or serving
    Io(std::io::Error),
    /// Query string could not be parsed
    InvalidQuery(String),
}

impl Error {
    /// HTTP status to report for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::InvalidQuery(reason) => write!(f, "Invalid query: {}", reason),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_query_is_bad_request() {
        assert_eq!(
            Error::InvalidQuery("nope".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken").into();

        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::InvalidQuery("sequenceId: invalid digit".into()).to_string(),
            "Invalid query: sequenceId: invalid digit"
        );
    }
}
