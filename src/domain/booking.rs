use super::money::{Amount, CurrencyCode};
use crate::error::CheckoutError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a reservation in the booking subsystem.
///
/// Restricted to ASCII alphanumerics and `-` so it can be embedded in a
/// payment reference (`PREFIX_<bookingId>_<timestamp>`) without ambiguity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BookingId(String);

impl BookingId {
    pub fn new(id: &str) -> Result<Self, CheckoutError> {
        let id = id.trim();
        if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            Ok(Self(id.to_string()))
        } else {
            Err(CheckoutError::ValidationError(format!(
                "Invalid booking id '{id}'"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for BookingId {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BookingId {
    type Error = CheckoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<BookingId> for String {
    fn from(id: BookingId) -> Self {
        id.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

/// A reservation as seen by the checkout core.
///
/// The booking subsystem owns the record; checkout only reads it and writes
/// the payment status, the payment reference and, on success, the
/// confirmation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Booking {
    pub id: BookingId,
    /// Total price in the booking's own currency.
    pub amount: Amount,
    pub currency: CurrencyCode,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    /// Reference of the last payment attempt written back by reconciliation.
    #[serde(default)]
    pub reference: Option<String>,
}

impl Booking {
    pub fn new(id: BookingId, amount: Amount, currency: CurrencyCode) -> Self {
        Self {
            id,
            amount,
            currency,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            reference: None,
        }
    }

    /// Whether a new payment attempt may be started for this booking.
    ///
    /// A failed payment may be retried; completed or cancelled bookings may not.
    pub fn accepts_payment(&self) -> bool {
        self.status != BookingStatus::Cancelled && self.payment_status != PaymentStatus::Completed
    }

    /// Applies a conditional payment update in place.
    ///
    /// Returns `false` and leaves the booking untouched when its payment status
    /// is not one of `transition.expected`.
    pub fn apply(&mut self, transition: &PaymentTransition) -> bool {
        if !transition.expected.contains(&self.payment_status) {
            return false;
        }
        self.payment_status = transition.payment_status;
        if let Some(status) = transition.booking_status {
            self.status = status;
        }
        if let Some(reference) = &transition.reference {
            self.reference = Some(reference.clone());
        }
        true
    }
}

/// A compare-and-set style update of a booking's payment fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentTransition {
    /// Payment statuses the booking may currently have.
    pub expected: &'static [PaymentStatus],
    pub payment_status: PaymentStatus,
    pub booking_status: Option<BookingStatus>,
    pub reference: Option<String>,
}

impl PaymentTransition {
    /// `pending | failed -> completed` and `status -> confirmed`.
    ///
    /// A verified payment outranks a failure recorded by an earlier attempt.
    pub fn settle(reference: &str) -> Self {
        Self {
            expected: &[PaymentStatus::Pending, PaymentStatus::Failed],
            payment_status: PaymentStatus::Completed,
            booking_status: Some(BookingStatus::Confirmed),
            reference: Some(reference.to_string()),
        }
    }

    /// `pending -> failed`.
    pub fn fail(reference: &str) -> Self {
        Self {
            expected: &[PaymentStatus::Pending],
            payment_status: PaymentStatus::Failed,
            booking_status: None,
            reference: Some(reference.to_string()),
        }
    }

    /// `failed -> pending`, so a fresh attempt can settle later.
    pub fn reopen() -> Self {
        Self {
            expected: &[PaymentStatus::Failed],
            payment_status: PaymentStatus::Pending,
            booking_status: None,
            reference: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn booking() -> Booking {
        Booking::new(
            BookingId::new("bk-1").unwrap(),
            Amount::new(dec!(50000)).unwrap(),
            CurrencyCode::new("NGN").unwrap(),
        )
    }

    #[test]
    fn test_booking_id_rejects_underscores() {
        assert!(BookingId::new("bk-42").is_ok());
        assert!(BookingId::new("bk_42").is_err());
        assert!(BookingId::new("  ").is_err());
    }

    #[test]
    fn test_settle_only_from_pending() {
        let mut booking = booking();
        assert!(booking.apply(&PaymentTransition::settle("FIAT_bk-1_1")));
        assert_eq!(booking.payment_status, PaymentStatus::Completed);
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.reference.as_deref(), Some("FIAT_bk-1_1"));

        // A second settlement is refused and changes nothing.
        assert!(!booking.apply(&PaymentTransition::settle("FIAT_bk-1_2")));
        assert_eq!(booking.reference.as_deref(), Some("FIAT_bk-1_1"));
    }

    #[test]
    fn test_failed_booking_can_be_reopened() {
        let mut booking = booking();
        assert!(booking.apply(&PaymentTransition::fail("CRYPTO_bk-1_1")));
        assert_eq!(booking.payment_status, PaymentStatus::Failed);
        assert!(booking.accepts_payment());

        assert!(booking.apply(&PaymentTransition::reopen()));
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[test]
    fn test_verified_payment_settles_failed_booking() {
        let mut booking = booking();
        assert!(booking.apply(&PaymentTransition::fail("FIAT_bk-1_1")));
        assert!(booking.apply(&PaymentTransition::settle("FIAT_bk-1_2")));
        assert_eq!(booking.payment_status, PaymentStatus::Completed);
        assert_eq!(booking.reference.as_deref(), Some("FIAT_bk-1_2"));

        // Completed is final: neither a late failure nor a reopen applies.
        assert!(!booking.apply(&PaymentTransition::fail("FIAT_bk-1_1")));
        assert!(!booking.apply(&PaymentTransition::reopen()));
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_cancelled_booking_refuses_payment() {
        let mut booking = booking();
        booking.status = BookingStatus::Cancelled;
        assert!(!booking.accepts_payment());
    }
}
