use super::booking::{Booking, BookingId, PaymentTransition};
use super::crypto::{CryptoInvoice, CurrencyDetails, InvoiceRequest};
use super::money::{CurrencyCode, Ticker};
use super::payment::{FiatPaymentData, FiatProvider, PaymentMethod};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Read/write access to the booking subsystem.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn store(&self, booking: Booking) -> Result<()>;
    async fn get_booking(&self, id: &BookingId) -> Result<Option<Booking>>;
    /// Atomically applies `transition` if the booking's payment status
    /// is still one of `transition.expected`. Returns whether the update happened.
    async fn update_payment_status(
        &self,
        id: &BookingId,
        transition: &PaymentTransition,
    ) -> Result<bool>;
    /// `failed -> pending`, so a new attempt can settle the booking.
    async fn reopen_payment(&self, id: &BookingId) -> Result<bool> {
        self.update_payment_status(id, &PaymentTransition::reopen())
            .await
    }
    async fn all_bookings(&self) -> Result<Vec<Booking>>;
}

/// What the client-side charge channel reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPaymentResult {
    pub status: String,
    pub reference: String,
}

/// Card/bank transfer gateway.
#[async_trait]
pub trait FiatGateway: Send + Sync {
    /// In-browser style charge. Its answer is never trusted without `verify`.
    async fn check_client_payment(
        &self,
        payment: &FiatPaymentData,
        provider: FiatProvider,
    ) -> std::result::Result<ClientPaymentResult, GatewayError>;

    /// Server-initiated charge returning an authorization URL for redirect.
    async fn initialize_payment(
        &self,
        provider: FiatProvider,
        payment: &FiatPaymentData,
    ) -> std::result::Result<url::Url, GatewayError>;

    /// Raw status token for a reference.
    async fn verify(&self, reference: &str) -> std::result::Result<String, GatewayError>;
}

/// Cryptocurrency payment gateway.
#[async_trait]
pub trait CryptoGateway: Send + Sync {
    async fn check_status(&self) -> std::result::Result<(), GatewayError>;
    async fn search_currencies(&self, query: &str)
    -> std::result::Result<Vec<Ticker>, GatewayError>;
    async fn get_currency_details(
        &self,
        ticker: &Ticker,
    ) -> std::result::Result<CurrencyDetails, GatewayError>;
    /// Minimum payable amount expressed in `base`. `None` when the gateway
    /// defines no minimum for the currency.
    async fn get_minimum_amount(
        &self,
        base: &CurrencyCode,
        ticker: &Ticker,
    ) -> std::result::Result<Option<Decimal>, GatewayError>;
    async fn get_estimate(
        &self,
        amount: Decimal,
        base: &CurrencyCode,
        ticker: &Ticker,
    ) -> std::result::Result<Decimal, GatewayError>;
    async fn create_invoice(
        &self,
        request: &InvoiceRequest,
    ) -> std::result::Result<CryptoInvoice, GatewayError>;
    async fn verify(&self, reference: &str) -> std::result::Result<String, GatewayError>;
}

/// Live exchange-rate lookup.
#[async_trait]
pub trait ExchangeRateSource: Send + Sync {
    /// Converts `amount` from `from` into `to`, returning the converted amount.
    async fn get_rate(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> std::result::Result<Decimal, GatewayError>;
}

/// Emitted once per booking when a payment is reconciled as successful.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingConfirmed {
    pub booking_id: BookingId,
    pub reference: String,
    pub method: PaymentMethod,
    pub confirmed_at: DateTime<Utc>,
}

/// Downstream consumer of confirmations (email, tickets). Fire-and-forget.
#[async_trait]
pub trait BookingNotifier: Send + Sync {
    async fn booking_confirmed(&self, event: &BookingConfirmed) -> Result<()>;
}

pub type BookingStoreRef = Arc<dyn BookingStore>;
pub type FiatGatewayRef = Arc<dyn FiatGateway>;
pub type CryptoGatewayRef = Arc<dyn CryptoGateway>;
pub type ExchangeRateSourceRef = Arc<dyn ExchangeRateSource>;
pub type BookingNotifierRef = Arc<dyn BookingNotifier>;
