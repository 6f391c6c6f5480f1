//! Application layer containing the checkout orchestration.
//!
//! Leaf services wrap a single gateway capability each and return structured
//! outcomes. `CryptoCheckout` drives them through the crypto flow, and
//! `PaymentOrchestrator` picks the payment path and reconciles the booking.

pub mod crypto_checkout;
pub mod estimate;
pub mod exchange;
pub mod fiat;
pub mod invoice;
pub mod minimum;
pub mod orchestrator;
pub mod search;
pub mod verification;

use crate::error::GatewayError;
use std::future::Future;
use std::time::Duration;

/// Awaits a gateway call for at most `limit`.
pub(crate) async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout(limit)),
    }
}

/// Appends `reference=<reference>` to a return URL.
pub(crate) fn with_reference(url: &str, reference: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.query_pairs_mut().append_pair("reference", reference);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}
