use super::money::{CurrencyCode, Ticker};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A cryptocurrency the gateway accepts, with the minimum it will take for
/// this selection. Fetched per selection and never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoCurrency {
    pub ticker: Ticker,
    pub name: String,
    /// Minimum payable amount in the reference fiat currency. Zero when the
    /// gateway defines none.
    pub minimum_amount: Decimal,
}

/// Catalog entry returned by the gateway for a ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyDetails {
    pub ticker: Ticker,
    pub name: String,
    #[serde(default)]
    pub network: Option<String>,
}

/// A single live conversion between two currencies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeRateQuote {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub rate: Decimal,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
}

/// Estimated crypto amount for a reference-currency amount at market rates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CryptoEstimate {
    pub ticker: Ticker,
    /// Amount in the reference currency the estimate was computed for.
    pub fiat_amount: Decimal,
    pub crypto_amount: Decimal,
}

/// Parameters for a gateway invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub price_amount: Decimal,
    /// Reference fiat currency, lower-case (`usd`).
    pub price_currency: String,
    pub pay_currency: Ticker,
    /// The attempt's payment reference.
    pub order_id: String,
    pub order_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_url: Option<String>,
}

/// A gateway-issued payable request. Immutable once created; a new attempt
/// needs a new invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoInvoice {
    pub id: String,
    pub order_id: String,
    pub pay_amount: Option<Decimal>,
    pub pay_currency: Ticker,
    pub price_amount: Decimal,
    pub invoice_url: url::Url,
    pub created_at: DateTime<Utc>,
}
