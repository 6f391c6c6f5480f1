use crate::domain::booking::{BookingId, BookingStatus, PaymentStatus};
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Failures reported by a gateway port.
///
/// Adapters map transport and provider responses onto these variants so the
/// application layer can tell a retryable outage from a hard refusal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Coarse classification of a [`CheckoutError`], used to decide what the
/// buyer can do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network trouble, 5xx, timeouts or unreadable payloads. The same step may be retried.
    Transient,
    /// Local input problem. Needs different input, never a gateway fault.
    Validation,
    /// The provider refused. The attempt must be abandoned.
    Terminal,
    /// The API was driven out of order (wrong step, no attempt, unpayable booking).
    Conflict,
}

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("{gateway} gateway error during {operation}: {source}")]
    Gateway {
        gateway: &'static str,
        operation: &'static str,
        #[source]
        source: GatewayError,
    },
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Booking {0} not found")]
    BookingNotFound(BookingId),
    #[error("Booking {id} cannot take a payment (status {status:?}, payment {payment_status:?})")]
    BookingNotPayable {
        id: BookingId,
        status: BookingStatus,
        payment_status: PaymentStatus,
    },
    #[error("Invalid payment reference: {0}")]
    InvalidReference(String),
    #[error("No payment attempt is open")]
    NoActiveAttempt,
    #[error("Reference {0} does not belong to the open payment attempt")]
    ReferenceMismatch(String),
    #[error("Cannot {action} while checkout is in step {step}")]
    InvalidStep {
        action: &'static str,
        step: &'static str,
    },
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl CheckoutError {
    pub fn gateway(gateway: &'static str, operation: &'static str, source: GatewayError) -> Self {
        Self::Gateway {
            gateway,
            operation,
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::Gateway { source, .. } => match source {
                GatewayError::Unavailable(_)
                | GatewayError::Timeout(_)
                | GatewayError::Malformed(_) => ErrorKind::Transient,
                GatewayError::Rejected(_) | GatewayError::Unsupported(_) => ErrorKind::Terminal,
            },
            CheckoutError::ValidationError(_) => ErrorKind::Validation,
            CheckoutError::BookingNotFound(_)
            | CheckoutError::BookingNotPayable { .. }
            | CheckoutError::InvalidReference(_)
            | CheckoutError::NoActiveAttempt
            | CheckoutError::ReferenceMismatch(_)
            | CheckoutError::InvalidStep { .. } => ErrorKind::Conflict,
            CheckoutError::CsvError(_)
            | CheckoutError::IoError(_)
            | CheckoutError::InternalError(_) => ErrorKind::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for CheckoutError {
    fn from(err: rocksdb::Error) -> Self {
        CheckoutError::InternalError(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_classification() {
        let outage = CheckoutError::gateway(
            "crypto",
            "status",
            GatewayError::Unavailable("503".into()),
        );
        assert_eq!(outage.kind(), ErrorKind::Transient);
        assert!(outage.is_retryable());

        let timeout = CheckoutError::gateway(
            "crypto",
            "estimate",
            GatewayError::Timeout(Duration::from_secs(1)),
        );
        assert!(timeout.is_retryable());

        let refused = CheckoutError::gateway(
            "fiat",
            "initialize",
            GatewayError::Rejected("card declined".into()),
        );
        assert_eq!(refused.kind(), ErrorKind::Terminal);
        assert!(!refused.is_retryable());
    }

    #[test]
    fn test_validation_is_not_retryable() {
        let err = CheckoutError::ValidationError("email is required".into());
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retryable());
    }
}
