//! Network error types

use hostel_core::GatewayError;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Outbound HTTP errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unreadable response: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid transaction reference: {0:?}")]
    InvalidReference(String),
}

impl From<Error> for GatewayError {
    fn from(e: Error) -> Self {
        match e {
            Error::Http(e) if e.is_timeout() => GatewayError::Timeout,
            Error::Http(e) if e.is_decode() => GatewayError::Decode(e.to_string()),
            Error::Http(e) => GatewayError::Transport(e.to_string()),
            Error::Status { status, message } => GatewayError::Rejected { status, message },
            Error::Decode(msg) => GatewayError::Decode(msg),
            Error::Config(msg) => GatewayError::Transport(msg),
            Error::InvalidReference(reference) => GatewayError::Rejected {
                status: 400,
                message: format!("invalid transaction reference {reference:?}"),
            },
        }
    }
}

impl From<Error> for hostel_core::Error {
    fn from(e: Error) -> Self {
        hostel_core::Error::Gateway(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_maps_to_rejected() {
        let e = Error::Status {
            status: 400,
            message: "Invalid key".into(),
        };
        assert_eq!(
            GatewayError::from(e),
            GatewayError::Rejected {
                status: 400,
                message: "Invalid key".into()
            }
        );
    }

    #[test]
    fn test_core_error_is_gateway_kind() {
        let e: hostel_core::Error = Error::Decode("bad json".into()).into();
        assert_eq!(e.kind(), hostel_core::ErrorKind::Gateway);
        assert!(!e.is_retryable());
    }
}
