use super::bounded;
use crate::domain::crypto::CryptoEstimate;
use crate::domain::money::{CurrencyCode, Ticker};
use crate::domain::ports::CryptoGatewayRef;
use crate::error::{CheckoutError, GatewayError, Result};
use rust_decimal::Decimal;
use std::time::Duration;

/// Quotes how much of a cryptocurrency a reference-currency amount buys.
pub struct CryptoEstimateService {
    gateway: CryptoGatewayRef,
    timeout: Duration,
}

impl CryptoEstimateService {
    pub fn new(gateway: CryptoGatewayRef, timeout: Duration) -> Self {
        Self { gateway, timeout }
    }

    pub async fn estimate(
        &self,
        fiat_amount: Decimal,
        base: &CurrencyCode,
        ticker: &Ticker,
    ) -> Result<CryptoEstimate> {
        // Nothing to price: a zero minimum estimates to zero.
        if fiat_amount.is_zero() {
            return Ok(CryptoEstimate {
                ticker: ticker.clone(),
                fiat_amount,
                crypto_amount: Decimal::ZERO,
            });
        }

        let crypto_amount = bounded(
            self.timeout,
            self.gateway.get_estimate(fiat_amount, base, ticker),
        )
        .await
        .and_then(|estimate| {
            if estimate > Decimal::ZERO {
                Ok(estimate)
            } else {
                Err(GatewayError::Malformed(format!(
                    "estimate of {fiat_amount} {base} in {ticker} was {estimate}"
                )))
            }
        })
        .map_err(|e| CheckoutError::gateway("crypto", "estimate", e))?;

        Ok(CryptoEstimate {
            ticker: ticker.clone(),
            fiat_amount,
            crypto_amount,
        })
    }
}
