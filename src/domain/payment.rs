use super::booking::BookingId;
use super::money::{Amount, CurrencyCode};
use crate::error::CheckoutError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Fiat,
    Crypto,
}

impl PaymentMethod {
    /// Prefix used in references created for this method.
    pub fn reference_prefix(self) -> &'static str {
        match self {
            PaymentMethod::Fiat => "FIAT",
            PaymentMethod::Crypto => "CRYPTO",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Fiat => f.write_str("fiat"),
            PaymentMethod::Crypto => f.write_str("crypto"),
        }
    }
}

/// Card/bank provider behind the fiat gateway, selected by configuration.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FiatProvider {
    #[default]
    Paystack,
    Flutterwave,
}

impl FiatProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            FiatProvider::Paystack => "paystack",
            FiatProvider::Flutterwave => "flutterwave",
        }
    }
}

impl fmt::Display for FiatProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-generated tracking key shared by both ends of a payment attempt.
///
/// Rendered as `PREFIX_<bookingId>_<timestamp>` where the prefix names the
/// method (`FIAT` or `CRYPTO`) and the timestamp is Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaymentReference {
    method: PaymentMethod,
    booking_id: BookingId,
    timestamp_ms: i64,
}

impl PaymentReference {
    pub fn new(method: PaymentMethod, booking_id: BookingId, timestamp_ms: i64) -> Self {
        Self {
            method,
            booking_id,
            timestamp_ms,
        }
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn booking_id(&self) -> &BookingId {
        &self.booking_id
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.method.reference_prefix(),
            self.booking_id,
            self.timestamp_ms
        )
    }
}

impl FromStr for PaymentReference {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CheckoutError::InvalidReference(s.to_string());
        let (prefix, rest) = s.split_once('_').ok_or_else(invalid)?;
        let (booking_id, timestamp) = rest.rsplit_once('_').ok_or_else(invalid)?;
        let method = match prefix {
            "FIAT" => PaymentMethod::Fiat,
            "CRYPTO" => PaymentMethod::Crypto,
            _ => return Err(invalid()),
        };
        let booking_id = BookingId::new(booking_id).map_err(|_| invalid())?;
        let timestamp_ms = timestamp.parse::<i64>().map_err(|_| invalid())?;
        if timestamp_ms < 0 {
            return Err(invalid());
        }
        Ok(Self {
            method,
            booking_id,
            timestamp_ms,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AttemptStatus {
    Open,
    Succeeded,
    Failed,
    Abandoned,
}

impl AttemptStatus {
    pub fn is_terminal(self) -> bool {
        self != AttemptStatus::Open
    }
}

/// One user-driven try at paying for a booking. Lives only as long as the
/// checkout session; its outcome is folded into the booking record.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentAttempt {
    pub method: PaymentMethod,
    pub reference: PaymentReference,
    /// Gateway handling the attempt (`paystack`, `flutterwave`, `crypto`).
    pub gateway: String,
    pub status: AttemptStatus,
}

impl PaymentAttempt {
    pub fn open(reference: PaymentReference, gateway: impl Into<String>) -> Self {
        Self {
            method: reference.method(),
            reference,
            gateway: gateway.into(),
            status: AttemptStatus::Open,
        }
    }
}

/// Contact details of the buyer, required by card/bank providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayerContact {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl PayerContact {
    /// Local field validation. Never calls a gateway.
    pub fn validate(&self) -> Result<(), CheckoutError> {
        let email = self.email.trim();
        let valid_email = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        };
        if !valid_email {
            return Err(CheckoutError::ValidationError(format!(
                "'{email}' is not a valid email address"
            )));
        }
        if self.name.trim().is_empty() {
            return Err(CheckoutError::ValidationError(
                "Payer name is required".to_string(),
            ));
        }
        if let Some(phone) = &self.phone {
            let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
            let allowed = phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'));
            if !allowed || digits < 7 {
                return Err(CheckoutError::ValidationError(format!(
                    "'{phone}' is not a valid phone number"
                )));
            }
        }
        Ok(())
    }
}

/// Everything a fiat provider needs to charge the buyer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiatPaymentData {
    pub reference: String,
    pub booking_id: BookingId,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: rust_decimal::Decimal,
    pub currency: CurrencyCode,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub callback_url: Option<String>,
}

impl FiatPaymentData {
    pub fn new(
        reference: &PaymentReference,
        amount: Amount,
        currency: CurrencyCode,
        contact: &PayerContact,
        callback_url: Option<String>,
    ) -> Self {
        Self {
            reference: reference.to_string(),
            booking_id: reference.booking_id().clone(),
            amount: amount.value(),
            currency,
            email: contact.email.trim().to_string(),
            name: contact.name.trim().to_string(),
            phone: contact.phone.clone(),
            callback_url,
        }
    }
}

/// Canonical result of asking a gateway about a payment.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum VerificationOutcome {
    Success,
    Pending,
    Failed,
}

const SUCCESS_TOKENS: &[&str] = &["success", "successful", "finished", "completed"];
const PENDING_TOKENS: &[&str] = &[
    "pending",
    "waiting",
    "confirming",
    "confirmed",
    "sending",
    "processing",
    "ongoing",
];

impl VerificationOutcome {
    /// Maps a gateway status token onto the canonical outcome.
    ///
    /// Only known success tokens are success. Unknown or empty tokens are
    /// failures.
    pub fn from_status(status: &str) -> Self {
        let status = status.trim().to_ascii_lowercase();
        if SUCCESS_TOKENS.contains(&status.as_str()) {
            VerificationOutcome::Success
        } else if PENDING_TOKENS.contains(&status.as_str()) {
            VerificationOutcome::Pending
        } else {
            VerificationOutcome::Failed
        }
    }
}
