use super::client::JsonClient;
use crate::domain::money::CurrencyCode;
use crate::domain::ports::ExchangeRateSource;
use crate::error::GatewayError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;
use url::Url;

#[derive(Deserialize)]
struct Conversion {
    #[serde(default)]
    result: Option<Decimal>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP adapter for the live exchange-rate service.
#[derive(Clone, Debug)]
pub struct HttpExchangeRateSource {
    http: JsonClient,
}

impl HttpExchangeRateSource {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: JsonClient::new(base_url),
        }
    }

    /// Bounds every request to this gateway by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }
}

#[async_trait]
impl ExchangeRateSource for HttpExchangeRateSource {
    #[instrument(skip(self), err)]
    async fn get_rate(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Result<Decimal, GatewayError> {
        let mut url = self.http.endpoint("convert")?;
        url.query_pairs_mut()
            .append_pair("from", from.as_str())
            .append_pair("to", to.as_str())
            .append_pair("amount", &amount.to_string());
        let conversion: Conversion = self.http.get_json(url, "GET /convert").await?;
        match conversion {
            Conversion {
                error: Some(error), ..
            } => Err(GatewayError::Unsupported(error)),
            Conversion {
                result: Some(result),
                ..
            } => Ok(result),
            _ => Err(GatewayError::Malformed(
                "conversion response carried neither result nor error".to_string(),
            )),
        }
    }
}
