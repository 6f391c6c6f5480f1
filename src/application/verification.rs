use super::bounded;
use crate::domain::payment::{PaymentMethod, PaymentReference, VerificationOutcome};
use crate::domain::ports::{CryptoGatewayRef, FiatGatewayRef};
use crate::error::{CheckoutError, Result};
use std::time::Duration;
use tracing::info;

/// Asks the gateway that owns a reference for its final status.
pub struct PaymentVerificationService {
    fiat: FiatGatewayRef,
    crypto: CryptoGatewayRef,
    timeout: Duration,
}

impl PaymentVerificationService {
    pub fn new(fiat: FiatGatewayRef, crypto: CryptoGatewayRef, timeout: Duration) -> Self {
        Self {
            fiat,
            crypto,
            timeout,
        }
    }

    /// Maps the gateway's status vocabulary onto a canonical outcome. Unknown
    /// statuses are reported as `Failed`, never as success.
    pub async fn verify(&self, reference: &PaymentReference) -> Result<VerificationOutcome> {
        let key = reference.to_string();
        let status = match reference.method() {
            PaymentMethod::Fiat => bounded(self.timeout, self.fiat.verify(&key))
                .await
                .map_err(|e| CheckoutError::gateway("fiat", "verify", e))?,
            PaymentMethod::Crypto => bounded(self.timeout, self.crypto.verify(&key))
                .await
                .map_err(|e| CheckoutError::gateway("crypto", "verify", e))?,
        };
        let outcome = VerificationOutcome::from_status(&status);
        info!(reference = %key, %status, ?outcome, "Verified payment");
        Ok(outcome)
    }
}
