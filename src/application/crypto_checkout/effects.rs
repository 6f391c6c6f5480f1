use super::machine::{AmountDetails, CheckoutEvent, Notice, Step};
use super::{Completion, InvoiceDraft, Ticket, ValidationRequest};
use crate::application::{bounded, with_reference};
use crate::application::estimate::CryptoEstimateService;
use crate::application::exchange::ExchangeRateConverter;
use crate::application::invoice::InvoiceLifecycleManager;
use crate::application::minimum::{MinimumAmountValidator, MinimumCheck};
use crate::application::search::CurrencySearchIndex;
use crate::config::CheckoutConfig;
use crate::domain::crypto::{CryptoCurrency, InvoiceRequest};
use crate::domain::ports::{CryptoGatewayRef, ExchangeRateSourceRef};
use crate::error::{CheckoutError, ErrorKind, GatewayError};
use std::sync::Arc;
use tracing::{info, warn};

/// Performs the gateway calls behind each crypto checkout step.
///
/// Effects never touch a `CryptoCheckout`: they take a ticket and produce a
/// completion, which the checkout applies only if the ticket is still
/// current.
pub struct CheckoutEffects {
    gateway: CryptoGatewayRef,
    converter: ExchangeRateConverter,
    minimums: MinimumAmountValidator,
    estimates: CryptoEstimateService,
    invoices: InvoiceLifecycleManager,
    search: Arc<CurrencySearchIndex>,
    config: CheckoutConfig,
}

impl CheckoutEffects {
    pub fn new(
        gateway: CryptoGatewayRef,
        rates: ExchangeRateSourceRef,
        config: &CheckoutConfig,
    ) -> Self {
        let timeout = config.gateway_timeout;
        Self {
            converter: ExchangeRateConverter::new(rates, timeout),
            minimums: MinimumAmountValidator::new(gateway.clone(), timeout),
            estimates: CryptoEstimateService::new(gateway.clone(), timeout),
            invoices: InvoiceLifecycleManager::new(gateway.clone(), timeout),
            search: Arc::new(CurrencySearchIndex::new(
                gateway.clone(),
                config.search_debounce,
                config.min_query_len,
                timeout,
            )),
            gateway,
            config: config.clone(),
        }
    }

    pub fn search_index(&self) -> &Arc<CurrencySearchIndex> {
        &self.search
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    pub async fn check_capability(&self, ticket: Ticket<()>) -> Completion {
        let event = match bounded(self.config.gateway_timeout, self.gateway.check_status()).await {
            Ok(()) => CheckoutEvent::CapabilityConfirmed,
            Err(e) => {
                warn!(error = %e, "Crypto gateway capability check failed");
                CheckoutEvent::CapabilityFailed(e.to_string())
            }
        };
        ticket.complete(event)
    }

    pub async fn validate_amount(&self, ticket: Ticket<ValidationRequest>) -> Completion {
        let event = match self.evaluate(&ticket.request).await {
            Ok(details) => CheckoutEvent::AmountValidated(details),
            Err(notice) => CheckoutEvent::AmountRejected(notice),
        };
        ticket.complete(event)
    }

    pub async fn create_invoice(&self, ticket: Ticket<InvoiceDraft>) -> Completion {
        let request = self.invoice_request(&ticket.request);
        let event = match self.invoices.create(&request).await {
            Ok(invoice) => CheckoutEvent::InvoiceIssued(invoice),
            Err(e) => CheckoutEvent::InvoiceFailed(notice_for(Step::CreatingInvoice, &e)),
        };
        ticket.complete(event)
    }

    /// Amount validation, strictly in order: details, conversion, floor,
    /// minimum, estimates. Each step uses the value the previous one just
    /// produced.
    async fn evaluate(&self, request: &ValidationRequest) -> Result<AmountDetails, Notice> {
        let step = Step::ValidatingAmount;
        let base = &self.config.reference_currency;
        let ticker = &request.ticker;

        let currency = bounded(
            self.config.gateway_timeout,
            self.gateway.get_currency_details(ticker),
        )
        .await
        .map_err(|e| match e {
            GatewayError::Unsupported(_) => Notice::UnsupportedCurrency {
                ticker: ticker.clone(),
            },
            other => notice_for(
                step,
                &CheckoutError::gateway("crypto", "currency details", other),
            ),
        })?;

        let conversion = self
            .converter
            .convert(request.amount.value(), &request.currency, base)
            .await
            .map_err(|e| notice_for(step, &e))?;
        let converted = conversion.amount_out;

        if let Some(floor) = self.config.gateway_floor
            && converted < floor
        {
            info!(%converted, %floor, "Booking is below the crypto gateway floor");
            return Err(Notice::BelowGatewayFloor {
                amount: converted,
                floor,
                currency: base.clone(),
            });
        }

        let check = self
            .minimums
            .validate(converted, base, ticker)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::Terminal => Notice::UnsupportedCurrency {
                    ticker: ticker.clone(),
                },
                _ => notice_for(step, &e),
            })?;
        let minimum = match check {
            MinimumCheck::Satisfied { minimum } => minimum,
            MinimumCheck::Shortfall { minimum, shortfall } => {
                info!(%ticker, %converted, %minimum, "Booking is below the currency minimum");
                return Err(Notice::BelowMinimum {
                    ticker: ticker.clone(),
                    minimum,
                    amount: converted,
                    shortfall,
                    currency: base.clone(),
                    suggestions: self
                        .config
                        .low_minimum_suggestions
                        .iter()
                        .filter(|suggested| *suggested != ticker)
                        .cloned()
                        .collect(),
                });
            }
        };

        let pay_estimate = self
            .estimates
            .estimate(converted, base, ticker)
            .await
            .map_err(|e| notice_for(step, &e))?;
        let minimum_estimate = self
            .estimates
            .estimate(minimum, base, ticker)
            .await
            .map_err(|e| notice_for(step, &e))?;

        Ok(AmountDetails {
            currency: CryptoCurrency {
                ticker: ticker.clone(),
                name: currency.name,
                minimum_amount: minimum,
            },
            conversion,
            pay_estimate,
            minimum_estimate,
        })
    }

    fn invoice_request(&self, draft: &InvoiceDraft) -> InvoiceRequest {
        let reference = draft.reference.to_string();
        InvoiceRequest {
            price_amount: draft.details.conversion.amount_out,
            price_currency: self.config.reference_currency.to_lowercase(),
            pay_currency: draft.details.currency.ticker.clone(),
            order_description: format!("Booking {}", draft.reference.booking_id()),
            success_url: self
                .config
                .callback_url
                .as_deref()
                .map(|url| with_reference(url, &reference)),
            cancel_url: self.config.cancel_url.clone(),
            order_id: reference,
        }
    }
}

fn notice_for(step: Step, error: &CheckoutError) -> Notice {
    let message = match error {
        CheckoutError::Gateway { source, .. } => source.to_string(),
        other => other.to_string(),
    };
    match error.kind() {
        ErrorKind::Terminal => Notice::Rejected { step, message },
        _ => Notice::ServiceUnavailable { step, message },
    }
}
