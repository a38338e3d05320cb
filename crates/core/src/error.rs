//! Error types for Hostel Core

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Gender, RoomGender};

/// Failure talking to the external payment provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("provider responded {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("unreadable provider response: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payment record not found for reference {0}")]
    PaymentNotFound(String),

    #[error("A resident with email {0} already exists")]
    DuplicateEmail(String),

    #[error("Room gender policy {room:?} does not admit a {resident:?} resident")]
    GenderMismatch { room: RoomGender, resident: Gender },

    #[error("Room {room_id} has reached its maximum capacity of {max_cap}")]
    RoomFull { room_id: Uuid, max_cap: u32 },

    #[error("Initial payment must be at least {required} (offered {offered})")]
    BelowMinimumDeposit { required: Decimal, offered: Decimal },

    #[error("Amount {offered} exceeds the outstanding balance of {outstanding}")]
    OverpaymentRejected {
        outstanding: Decimal,
        offered: Decimal,
    },

    #[error("Resident {resident_id} already has {paid} paid and {pending} pending; use a top-up")]
    AlreadyBilled {
        resident_id: Uuid,
        paid: Decimal,
        pending: Decimal,
    },

    #[error("Resident {0} has no confirmed deposit to top up")]
    DepositRequired(Uuid),

    #[error("Hostel {0} has no active calendar year")]
    NoActiveCalendarYear(Uuid),

    #[error("Cannot delete an active calendar year")]
    ActiveCalendarYear,

    #[error("Payment verification failed: {0}")]
    VerificationFailed(String),

    #[error("Payment {0} was invalidated and cannot be confirmed")]
    PaymentInvalidated(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification used by the HTTP boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    NotFound,
    Conflict,
    BusinessRule,
    Gateway,
    Internal,
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation | ErrorKind::BusinessRule => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Gateway => 502,
            ErrorKind::Internal => 500,
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::Serialization(_) => ErrorKind::Validation,
            Error::VerificationFailed(_) => ErrorKind::Validation,
            Error::InvalidSignature => ErrorKind::Unauthorized,
            Error::NotFound(_) | Error::PaymentNotFound(_) => ErrorKind::NotFound,
            Error::DuplicateEmail(_)
            | Error::GenderMismatch { .. }
            | Error::RoomFull { .. }
            | Error::PaymentInvalidated(_) => ErrorKind::Conflict,
            Error::BelowMinimumDeposit { .. }
            | Error::OverpaymentRejected { .. }
            | Error::AlreadyBilled { .. }
            | Error::DepositRequired(_)
            | Error::NoActiveCalendarYear(_)
            | Error::ActiveCalendarYear => ErrorKind::BusinessRule,
            Error::Gateway(_) => ErrorKind::Gateway,
            Error::Database(e) if is_unique_violation(e) => ErrorKind::Conflict,
            Error::Database(_) | Error::Io(_) | Error::Notification(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Gateway(GatewayError::Transport(_) | GatewayError::Timeout)
        ) || matches!(
            self,
            Error::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::DatabaseBusy
        )
    }

    /// Message safe to show to API callers; driver details stay in the logs
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal server error".to_string(),
            ErrorKind::Conflict if matches!(self, Error::Database(_)) => {
                "Duplicate entry: the record already exists".to_string()
            }
            _ => self.to_string(),
        }
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation
                && (f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_status_codes() {
        assert_eq!(Error::Validation("x".into()).kind().status_code(), 400);
        assert_eq!(Error::PaymentNotFound("ref".into()).kind().status_code(), 404);
        assert_eq!(
            Error::RoomFull {
                room_id: Uuid::nil(),
                max_cap: 2
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            Error::NoActiveCalendarYear(Uuid::nil()).kind(),
            ErrorKind::BusinessRule
        );
        assert_eq!(Error::InvalidSignature.kind().status_code(), 401);
        assert_eq!(
            Error::Gateway(GatewayError::Timeout).kind().status_code(),
            502
        );
    }

    #[test]
    fn test_gateway_transport_is_retryable() {
        assert!(Error::Gateway(GatewayError::Timeout).is_retryable());
        assert!(Error::Gateway(GatewayError::Transport("reset".into())).is_retryable());
        assert!(!Error::Gateway(GatewayError::Rejected {
            status: 400,
            message: "bad key".into()
        })
        .is_retryable());
        assert!(!Error::ActiveCalendarYear.is_retryable());
    }

    #[test]
    fn test_unique_violation_is_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (email TEXT UNIQUE); INSERT INTO t VALUES ('a@b.c');")
            .unwrap();
        let err: Error = conn
            .execute("INSERT INTO t VALUES ('a@b.c')", [])
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(!err.public_message().contains("UNIQUE"));
    }
}
