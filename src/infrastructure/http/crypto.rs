use super::client::JsonClient;
use crate::domain::crypto::{CryptoInvoice, CurrencyDetails, InvoiceRequest};
use crate::domain::money::{CurrencyCode, Ticker};
use crate::domain::ports::CryptoGateway;
use crate::error::GatewayError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

#[derive(Deserialize)]
struct CurrencyList {
    currencies: Vec<String>,
}

#[derive(Deserialize)]
struct MinimumAmount {
    #[serde(default)]
    fiat_equivalent: Option<Decimal>,
}

#[derive(Deserialize)]
struct Estimate {
    estimated_amount: Decimal,
}

#[derive(Deserialize)]
struct PaymentStatusBody {
    #[serde(default)]
    payment_status: String,
}

/// HTTP adapter for the crypto payment gateway.
#[derive(Clone, Debug)]
pub struct HttpCryptoGateway {
    http: JsonClient,
}

impl HttpCryptoGateway {
    pub fn new(base_url: Url, api_key: Option<&str>) -> Self {
        let http = JsonClient::new(base_url);
        let http = match api_key {
            Some(key) => http.with_header("x-api-key", key),
            None => http,
        };
        Self { http }
    }

    /// Bounds every request to this gateway by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }
}

#[async_trait]
impl CryptoGateway for HttpCryptoGateway {
    #[instrument(skip(self), err)]
    async fn check_status(&self) -> Result<(), GatewayError> {
        let url = self.http.endpoint("status")?;
        let _: serde_json::Value = self.http.get_json(url, "GET /status").await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn search_currencies(&self, query: &str) -> Result<Vec<Ticker>, GatewayError> {
        let mut url = self.http.endpoint("currencies")?;
        url.query_pairs_mut().append_pair("search", query);
        let list: CurrencyList = self.http.get_json(url, "GET /currencies").await?;
        Ok(list
            .currencies
            .iter()
            .filter_map(|raw| match Ticker::new(raw) {
                Ok(ticker) => Some(ticker),
                Err(_) => {
                    debug!(ticker = %raw, "Ignoring unlisted ticker");
                    None
                }
            })
            .collect())
    }

    #[instrument(skip(self), err)]
    async fn get_currency_details(&self, ticker: &Ticker) -> Result<CurrencyDetails, GatewayError> {
        let url = self.http.endpoint(&format!("currencies/{}", ticker.as_str()))?;
        self.http.get_json(url, "GET /currencies/{ticker}").await
    }

    #[instrument(skip(self), err)]
    async fn get_minimum_amount(
        &self,
        base: &CurrencyCode,
        ticker: &Ticker,
    ) -> Result<Option<Decimal>, GatewayError> {
        let mut url = self.http.endpoint("min-amount")?;
        url.query_pairs_mut()
            .append_pair("currency_from", ticker.as_str())
            .append_pair("fiat_equivalent", &base.to_lowercase());
        let minimum: MinimumAmount = self.http.get_json(url, "GET /min-amount").await?;
        Ok(minimum.fiat_equivalent)
    }

    #[instrument(skip(self), err)]
    async fn get_estimate(
        &self,
        amount: Decimal,
        base: &CurrencyCode,
        ticker: &Ticker,
    ) -> Result<Decimal, GatewayError> {
        let mut url = self.http.endpoint("estimate")?;
        url.query_pairs_mut()
            .append_pair("amount", &amount.to_string())
            .append_pair("currency_from", &base.to_lowercase())
            .append_pair("currency_to", ticker.as_str());
        let estimate: Estimate = self.http.get_json(url, "GET /estimate").await?;
        Ok(estimate.estimated_amount)
    }

    #[instrument(skip(self, request), fields(order_id = %request.order_id), err)]
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<CryptoInvoice, GatewayError> {
        let url = self.http.endpoint("invoice")?;
        self.http.post_json(url, "POST /invoice", request).await
    }

    #[instrument(skip(self), err)]
    async fn verify(&self, reference: &str) -> Result<String, GatewayError> {
        let url = self.http.endpoint(&format!("payment/{reference}"))?;
        let body: PaymentStatusBody = self.http.get_json(url, "GET /payment/{reference}").await?;
        Ok(body.payment_status)
    }
}
