//! Runtime configuration for the checkout core and its gateway adapters.

use crate::domain::money::{CurrencyCode, Ticker};
use crate::domain::payment::FiatProvider;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Tunables of the checkout flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Fiat currency that minimums, estimates and invoices are priced in.
    pub reference_currency: CurrencyCode,

    /// Upper bound on any single gateway call.
    pub gateway_timeout: Duration,

    /// Upper bound on the client-side fiat charge before falling back to redirect.
    pub client_payment_timeout: Duration,

    /// Quiet window before a currency search is sent.
    pub search_debounce: Duration,

    /// Shortest query that reaches the gateway.
    pub min_query_len: usize,

    /// Pause between showing the created invoice and redirecting to it.
    pub redirect_delay: Duration,

    /// Gateway-wide floor in the reference currency. Bookings converting below
    /// it cannot be paid in any cryptocurrency.
    pub gateway_floor: Option<Decimal>,

    /// Currencies offered when the selected one has too high a minimum.
    pub low_minimum_suggestions: Vec<Ticker>,

    /// Card/bank provider used for fiat payments.
    pub fiat_provider: FiatProvider,

    /// Where gateways send the buyer back, carrying the reference.
    pub callback_url: Option<String>,

    /// Where the crypto gateway sends a buyer who cancels the invoice.
    pub cancel_url: Option<String>,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            reference_currency: CurrencyCode(String::from("USD")),
            gateway_timeout: Duration::from_secs(15),
            client_payment_timeout: Duration::from_secs(10),
            search_debounce: Duration::from_millis(500),
            min_query_len: 2,
            redirect_delay: Duration::from_secs(2),
            gateway_floor: None,
            low_minimum_suggestions: vec![
                Ticker(String::from("usdt")),
                Ticker(String::from("usdc")),
            ],
            fiat_provider: FiatProvider::default(),
            callback_url: None,
            cancel_url: None,
        }
    }
}

impl CheckoutConfig {
    pub fn builder() -> CheckoutConfigBuilder {
        CheckoutConfigBuilder::new()
    }
}

/// Builder for CheckoutConfig
pub struct CheckoutConfigBuilder {
    config: CheckoutConfig,
}

impl CheckoutConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CheckoutConfig::default(),
        }
    }

    pub fn reference_currency(mut self, currency: CurrencyCode) -> Self {
        self.config.reference_currency = currency;
        self
    }

    pub fn gateway_timeout(mut self, timeout: Duration) -> Self {
        self.config.gateway_timeout = timeout;
        self
    }

    pub fn client_payment_timeout(mut self, timeout: Duration) -> Self {
        self.config.client_payment_timeout = timeout;
        self
    }

    pub fn search_debounce(mut self, window: Duration) -> Self {
        self.config.search_debounce = window;
        self
    }

    pub fn min_query_len(mut self, len: usize) -> Self {
        self.config.min_query_len = len;
        self
    }

    pub fn redirect_delay(mut self, delay: Duration) -> Self {
        self.config.redirect_delay = delay;
        self
    }

    pub fn gateway_floor(mut self, floor: Decimal) -> Self {
        self.config.gateway_floor = Some(floor);
        self
    }

    pub fn low_minimum_suggestions(mut self, tickers: Vec<Ticker>) -> Self {
        self.config.low_minimum_suggestions = tickers;
        self
    }

    pub fn fiat_provider(mut self, provider: FiatProvider) -> Self {
        self.config.fiat_provider = provider;
        self
    }

    pub fn callback_url(mut self, url: impl Into<String>) -> Self {
        self.config.callback_url = Some(url.into());
        self
    }

    pub fn cancel_url(mut self, url: impl Into<String>) -> Self {
        self.config.cancel_url = Some(url.into());
        self
    }

    pub fn build(self) -> CheckoutConfig {
        self.config
    }
}

impl Default for CheckoutConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Base URLs of the remote APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEndpoints {
    pub fiat_api: Url,
    pub crypto_api: Url,
    pub exchange_api: Url,
    #[serde(default, skip_serializing)]
    pub crypto_api_key: Option<String>,
}
