use super::bounded;
use crate::domain::money::{CurrencyCode, Ticker};
use crate::domain::ports::CryptoGatewayRef;
use crate::error::{CheckoutError, GatewayError, Result};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::debug;

/// Result of comparing a converted booking amount with a currency minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MinimumCheck {
    Satisfied { minimum: Decimal },
    Shortfall { minimum: Decimal, shortfall: Decimal },
}

/// Fetches per-currency minimum payment amounts and checks bookings against them.
pub struct MinimumAmountValidator {
    gateway: CryptoGatewayRef,
    timeout: Duration,
}

impl MinimumAmountValidator {
    pub fn new(gateway: CryptoGatewayRef, timeout: Duration) -> Self {
        Self { gateway, timeout }
    }

    /// Minimum for `ticker` expressed in `base`. A currency without a minimum
    /// yields zero.
    pub async fn fetch_minimum(&self, base: &CurrencyCode, ticker: &Ticker) -> Result<Decimal> {
        let minimum = bounded(self.timeout, self.gateway.get_minimum_amount(base, ticker))
            .await
            .and_then(|minimum| match minimum {
                Some(value) if value < Decimal::ZERO => Err(GatewayError::Malformed(format!(
                    "negative minimum {value} for {ticker}"
                ))),
                Some(value) => Ok(value),
                None => Ok(Decimal::ZERO),
            })
            .map_err(|e| CheckoutError::gateway("crypto", "minimum amount", e))?;
        debug!(%ticker, %base, %minimum, "Fetched minimum amount");
        Ok(minimum)
    }

    /// Compares two amounts already expressed in the same currency.
    pub fn check(converted: Decimal, minimum: Decimal) -> MinimumCheck {
        if converted < minimum {
            MinimumCheck::Shortfall {
                minimum,
                shortfall: minimum - converted,
            }
        } else {
            MinimumCheck::Satisfied { minimum }
        }
    }

    /// Fetches the current minimum and compares `converted` against that
    /// freshly fetched value.
    pub async fn validate(
        &self,
        converted: Decimal,
        base: &CurrencyCode,
        ticker: &Ticker,
    ) -> Result<MinimumCheck> {
        let minimum = self.fetch_minimum(base, ticker).await?;
        Ok(Self::check(converted, minimum))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_check_shortfall() {
        assert_eq!(
            MinimumAmountValidator::check(dec!(0.32), dec!(5)),
            MinimumCheck::Shortfall {
                minimum: dec!(5),
                shortfall: dec!(4.68)
            }
        );
    }

    #[test]
    fn test_check_boundary_is_satisfied() {
        assert_eq!(
            MinimumAmountValidator::check(dec!(5), dec!(5)),
            MinimumCheck::Satisfied { minimum: dec!(5) }
        );
        assert_eq!(
            MinimumAmountValidator::check(dec!(32), Decimal::ZERO),
            MinimumCheck::Satisfied {
                minimum: Decimal::ZERO
            }
        );
    }
}
