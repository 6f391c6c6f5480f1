use super::bounded;
use crate::domain::crypto::ExchangeRateQuote;
use crate::domain::money::CurrencyCode;
use crate::domain::ports::ExchangeRateSourceRef;
use crate::error::{CheckoutError, GatewayError, Result};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::debug;

/// Converts amounts between fiat currencies at the live rate.
///
/// Every call hits the rate source; quotes are never cached because minimum
/// checks must run against current prices.
pub struct ExchangeRateConverter {
    source: ExchangeRateSourceRef,
    timeout: Duration,
}

impl ExchangeRateConverter {
    pub fn new(source: ExchangeRateSourceRef, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    pub async fn convert(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Result<ExchangeRateQuote> {
        if amount <= Decimal::ZERO {
            return Err(CheckoutError::ValidationError(format!(
                "Cannot convert non-positive amount {amount}"
            )));
        }
        if from == to {
            return Ok(ExchangeRateQuote {
                from: from.clone(),
                to: to.clone(),
                rate: Decimal::ONE,
                amount_in: amount,
                amount_out: amount,
            });
        }

        let amount_out = bounded(self.timeout, self.source.get_rate(amount, from, to))
            .await
            .and_then(|out| {
                if out > Decimal::ZERO {
                    Ok(out)
                } else {
                    Err(GatewayError::Malformed(format!(
                        "conversion of {amount} {from} to {to} returned {out}"
                    )))
                }
            })
            .map_err(|e| CheckoutError::gateway("exchange", "convert", e))?;

        let rate = amount_out / amount;
        debug!(%from, %to, %amount, %amount_out, %rate, "Converted amount");
        Ok(ExchangeRateQuote {
            from: from.clone(),
            to: to.clone(),
            rate,
            amount_in: amount,
            amount_out,
        })
    }
}
