use super::client::JsonClient;
use crate::domain::payment::{FiatPaymentData, FiatProvider};
use crate::domain::ports::{ClientPaymentResult, FiatGateway};
use crate::error::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;
use url::Url;

#[derive(Serialize)]
struct ProviderRequest<'a> {
    provider: FiatProvider,
    #[serde(flatten)]
    payment: &'a FiatPaymentData,
}

#[derive(Deserialize)]
struct Initialized {
    #[serde(default)]
    authorization_url: Option<Url>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct Verification {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
}

/// HTTP adapter for the card/bank payment backend.
///
/// One implementation serves every provider; the provider travels in the
/// request body.
#[derive(Clone, Debug)]
pub struct HttpFiatGateway {
    http: JsonClient,
}

impl HttpFiatGateway {
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
impl FiatGateway for HttpFiatGateway {
    #[instrument(skip(self, payment), fields(reference = %payment.reference), err)]
    async fn check_client_payment(
        &self,
        payment: &FiatPaymentData,
        provider: FiatProvider,
    ) -> Result<ClientPaymentResult, GatewayError> {
        let url = self.http.endpoint("payments/client-check")?;
        let request = ProviderRequest { provider, payment };
        self.http
            .post_json(url, "POST /payments/client-check", &request)
            .await
    }

    #[instrument(skip(self, payment), fields(reference = %payment.reference), err)]
    async fn initialize_payment(
        &self,
        provider: FiatProvider,
        payment: &FiatPaymentData,
    ) -> Result<Url, GatewayError> {
        let url = self.http.endpoint("payments/initialize")?;
        let request = ProviderRequest { provider, payment };
        let initialized: Initialized = self
            .http
            .post_json(url, "POST /payments/initialize", &request)
            .await?;
        match initialized {
            Initialized {
                error: Some(error), ..
            } => Err(GatewayError::Rejected(error)),
            Initialized {
                authorization_url: Some(url),
                ..
            } => Ok(url),
            _ => Err(GatewayError::Malformed(
                "initialize response carried no authorization_url".to_string(),
            )),
        }
    }

    /// An absent status is reported as empty, which verification treats as failed.
    #[instrument(skip(self), err)]
    async fn verify(&self, reference: &str) -> Result<String, GatewayError> {
        let url = self.http.endpoint(&format!("payments/verify/{reference}"))?;
        let verification: Verification = self
            .http
            .get_json(url, "GET /payments/verify/{reference}")
            .await?;
        Ok(verification
            .status
            .or(verification.payment_status)
            .unwrap_or_default())
    }
}
