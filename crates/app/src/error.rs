//! Error types for the Aroma app layer

/// App result type
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(aroma_core::Error),

    #[error(transparent)]
    Net(#[from] aroma_net::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(String),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl From<aroma_core::Error> for Error {
    fn from(e: aroma_core::Error) -> Self {
        match e {
            aroma_core::Error::Validation(msg) => Error::Validation(msg),
            other => Error::Core(other),
        }
    }
}

impl Error {
    /// True when the remote service rejected the current token
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Net(e) if e.is_unauthorized())
    }

    /// Text suitable for a notification body
    pub fn user_message(&self) -> String {
        match self {
            Error::Net(aroma_net::Error::Remote { message, .. }) => message.clone(),
            Error::Net(aroma_net::Error::Rejected(message)) => message.clone(),
            Error::Net(aroma_net::Error::Timeout) => {
                "The server did not respond in time".to_string()
            }
            Error::Net(aroma_net::Error::Unauthorized) | Error::NotAuthenticated => {
                "Your session has ended. Please sign in again.".to_string()
            }
            Error::Net(aroma_net::Error::Http(_)) => "Could not reach the server".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_validation_is_lifted() {
        let err: Error = aroma_core::Error::validation("Brand name is required").into();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.user_message(), "Brand name is required");
    }

    #[test]
    fn test_remote_message_is_surfaced() {
        let err: Error = aroma_net::Error::Remote {
            status: 409,
            message: "Brand already exists".to_string(),
        }
        .into();
        assert_eq!(err.user_message(), "Brand already exists");
        assert!(!err.is_unauthorized());

        let err: Error = aroma_net::Error::Unauthorized.into();
        assert!(err.is_unauthorized());
    }
}
