use super::bounded;
use super::verification::PaymentVerificationService;
use crate::domain::payment::{FiatPaymentData, FiatProvider, PaymentReference, VerificationOutcome};
use crate::domain::ports::FiatGatewayRef;
use crate::error::{CheckoutError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How a fiat payment initialization ended.
#[derive(Debug, Clone, PartialEq)]
pub enum FiatInitOutcome {
    /// The client channel reported success and the server confirmed it.
    Verified { reference: PaymentReference },
    /// The server has not settled yet; reconcile later via the reference.
    StillProcessing { reference: PaymentReference },
    /// The buyer must complete the payment at the provider.
    Redirect {
        reference: PaymentReference,
        authorization_url: url::Url,
    },
}

/// Initializes card/bank payments for the configured provider.
///
/// The client channel is tried first. Its answer is only trusted after the
/// server confirms it under the same reference; otherwise the adapter falls
/// back to a server-initiated payment and a redirect.
pub struct FiatPaymentAdapter {
    gateway: FiatGatewayRef,
    verifier: Arc<PaymentVerificationService>,
    provider: FiatProvider,
    client_timeout: Duration,
    gateway_timeout: Duration,
}

impl FiatPaymentAdapter {
    pub fn new(
        gateway: FiatGatewayRef,
        verifier: Arc<PaymentVerificationService>,
        provider: FiatProvider,
        client_timeout: Duration,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            verifier,
            provider,
            client_timeout,
            gateway_timeout,
        }
    }

    pub fn provider(&self) -> FiatProvider {
        self.provider
    }

    pub async fn initialize(&self, payment: &FiatPaymentData) -> Result<FiatInitOutcome> {
        let reference: PaymentReference = payment.reference.parse()?;

        match bounded(
            self.client_timeout,
            self.gateway.check_client_payment(payment, self.provider),
        )
        .await
        {
            Ok(client)
                if VerificationOutcome::from_status(&client.status)
                    == VerificationOutcome::Success =>
            {
                if client.reference != payment.reference {
                    warn!(
                        expected = %payment.reference,
                        reported = %client.reference,
                        "Client channel reported a different reference; verifying ours"
                    );
                }
                match self.verifier.verify(&reference).await {
                    Ok(VerificationOutcome::Success) => {
                        info!(%reference, provider = %self.provider, "Client payment verified");
                        return Ok(FiatInitOutcome::Verified { reference });
                    }
                    Ok(VerificationOutcome::Pending) => {
                        info!(%reference, "Client reported success but server is still pending");
                        return Ok(FiatInitOutcome::StillProcessing { reference });
                    }
                    Ok(VerificationOutcome::Failed) => {
                        warn!(%reference, "Client reported success but server disagrees; falling back");
                    }
                    // Money may have moved; only the reference can settle this now.
                    Err(e) => {
                        warn!(%reference, error = %e, "Could not verify client payment");
                        return Ok(FiatInitOutcome::StillProcessing { reference });
                    }
                }
            }
            Ok(client) => {
                debug!(%reference, status = %client.status, "Client payment not completed; falling back");
            }
            Err(e) => {
                warn!(%reference, error = %e, "Client payment channel failed; falling back");
            }
        }

        let authorization_url = bounded(
            self.gateway_timeout,
            self.gateway.initialize_payment(self.provider, payment),
        )
        .await
        .map_err(|e| CheckoutError::gateway("fiat", "initialize", e))?;

        info!(%reference, provider = %self.provider, "Fiat payment initialized for redirect");
        Ok(FiatInitOutcome::Redirect {
            reference,
            authorization_url,
        })
    }
}
