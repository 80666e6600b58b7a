//! Error types for tracker-assistant

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication failed for {0}")]
    AuthFailure(String),

    #[error("Backend returned status {status}: {context}")]
    Backend { status: u16, context: String },

    #[error("Login response carried no session cookie")]
    MissingCookie,

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// True when the backend rejected the credentials rather than being unreachable
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Error::AuthFailure(_) | Error::MissingCookie => true,
            Error::Backend { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::AuthFailure("bob".to_string());
        assert!(err.to_string().contains("bob"));

        let err = Error::Backend {
            status: 502,
            context: "list devices".to_string(),
        };
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("list devices"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_auth_failure_classification() {
        assert!(Error::AuthFailure("x".into()).is_auth_failure());
        assert!(Error::MissingCookie.is_auth_failure());
        assert!(Error::Backend { status: 401, context: String::new() }.is_auth_failure());
        assert!(!Error::Backend { status: 503, context: String::new() }.is_auth_failure());
        assert!(!Error::Transport("closed".into()).is_auth_failure());
    }
}
