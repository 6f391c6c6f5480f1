//! Cryptocurrency checkout as an explicit state machine.
//!
//! [`machine`] holds the states and the pure `transition` function.
//! [`CheckoutEffects`] performs the gateway calls. [`CryptoCheckout`] is the
//! session object tying them together: it hands out tickets stamped with its
//! current epoch and drops any completion whose epoch has moved on, so a reset
//! or a currency change can never be overwritten by a late response.

mod effects;
pub mod machine;

pub use effects::CheckoutEffects;
pub use machine::{AmountDetails, CheckoutEvent, CheckoutState, Notice, Step, transition};

use crate::application::search::{SearchCompletion, SearchOutcome, normalize_query};
use crate::domain::crypto::CryptoInvoice;
use crate::domain::money::{Amount, CurrencyCode, Ticker};
use crate::domain::payment::PaymentReference;
use crate::error::{CheckoutError, Result};
use std::time::Duration;
use tracing::{debug, info};

/// Booking data a crypto checkout needs, captured when the attempt starts.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutContext {
    pub reference: PaymentReference,
    pub amount: Amount,
    pub currency: CurrencyCode,
}

/// Input for amount validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRequest {
    pub ticker: Ticker,
    pub amount: Amount,
    pub currency: CurrencyCode,
}

/// Input for invoice creation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDraft {
    pub reference: PaymentReference,
    pub details: AmountDetails,
}

/// Permission to run one effect, valid while the checkout's epoch is unchanged.
#[derive(Debug, Clone)]
pub struct Ticket<T> {
    epoch: u64,
    pub request: T,
}

impl<T> Ticket<T> {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn complete(self, event: CheckoutEvent) -> Completion {
        Completion {
            epoch: self.epoch,
            event,
        }
    }
}

/// The event an effect produced, tagged with the epoch it was started in.
#[derive(Debug, Clone)]
pub struct Completion {
    epoch: u64,
    pub event: CheckoutEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    Discarded,
}

/// Navigation to the invoice page, due after a fixed delay.
#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    pub url: url::Url,
    pub delay: Duration,
}

impl Redirect {
    /// Waits out the delay and yields the URL to navigate to.
    pub async fn wait(self) -> url::Url {
        tokio::time::sleep(self.delay).await;
        self.url
    }
}

/// One crypto checkout session for one payment attempt.
#[derive(Debug)]
pub struct CryptoCheckout {
    context: CheckoutContext,
    state: CheckoutState,
    epoch: u64,
}

impl CryptoCheckout {
    pub fn new(context: CheckoutContext) -> Self {
        Self {
            context,
            state: CheckoutState::Idle,
            epoch: 0,
        }
    }

    pub fn context(&self) -> &CheckoutContext {
        &self.context
    }

    pub fn state(&self) -> &CheckoutState {
        &self.state
    }

    pub fn step(&self) -> Step {
        self.state.step()
    }

    pub fn invoice(&self) -> Option<&CryptoInvoice> {
        match &self.state {
            CheckoutState::InvoiceCreated { invoice, .. } => Some(invoice),
            _ => None,
        }
    }

    /// The redirect to schedule once the invoice exists.
    pub fn redirect(&self, delay: Duration) -> Option<Redirect> {
        self.invoice().map(|invoice| Redirect {
            url: invoice.invoice_url.clone(),
            delay,
        })
    }

    fn dispatch(&mut self, event: CheckoutEvent) {
        let from = self.state.step();
        self.state = transition(std::mem::take(&mut self.state), event);
        let to = self.state.step();
        if from != to {
            info!(reference = %self.context.reference, %from, %to, "Crypto checkout step changed");
        }
    }

    fn require(&self, action: &'static str, allowed: &[Step]) -> Result<()> {
        let step = self.state.step();
        if allowed.contains(&step) {
            Ok(())
        } else {
            Err(CheckoutError::InvalidStep {
                action,
                step: step.as_str(),
            })
        }
    }

    fn next_ticket<T>(&mut self, request: T) -> Ticket<T> {
        self.epoch += 1;
        Ticket {
            epoch: self.epoch,
            request,
        }
    }

    /// `Idle -> CheckingCapability`.
    pub fn begin_capability_check(&mut self) -> Result<Ticket<()>> {
        self.require("request crypto payment", &[Step::Idle])?;
        self.dispatch(CheckoutEvent::CryptoRequested);
        Ok(self.next_ticket(()))
    }

    /// Records what the buyer typed. Results for older queries will no longer apply.
    pub fn set_query(&mut self, query: &str) -> Result<()> {
        self.require("search currencies", &[Step::SearchingCurrency])?;
        self.dispatch(CheckoutEvent::QueryChanged(normalize_query(query)));
        Ok(())
    }

    /// Applies a search outcome if it answers the current query.
    pub fn apply_search(&mut self, outcome: SearchOutcome) -> Applied {
        match outcome {
            SearchOutcome::Results { query, tickers } => match &self.state {
                CheckoutState::SearchingCurrency { query: current, .. } if *current == query => {
                    self.dispatch(CheckoutEvent::SearchCompleted { query, tickers });
                    Applied::Applied
                }
                _ => {
                    debug!(%query, "Discarding search results for a query no longer shown");
                    Applied::Discarded
                }
            },
            SearchOutcome::TooShort | SearchOutcome::Superseded => Applied::Discarded,
        }
    }

    /// Applies a finished lookup. A gateway failure for the current query
    /// becomes a notice; anything for an older query is dropped.
    pub fn finish_search(&mut self, completion: SearchCompletion) -> Applied {
        match completion.outcome {
            Ok(outcome) => self.apply_search(outcome),
            Err(e) => match &self.state {
                CheckoutState::SearchingCurrency { query, .. } if *query == completion.query => {
                    let notice = Notice::ServiceUnavailable {
                        step: Step::SearchingCurrency,
                        message: e.to_string(),
                    };
                    self.dispatch(CheckoutEvent::SearchFailed {
                        query: completion.query,
                        notice,
                    });
                    Applied::Applied
                }
                _ => Applied::Discarded,
            },
        }
    }

    /// Results currently listed for the search box.
    pub fn search_results(&self) -> &[Ticker] {
        match &self.state {
            CheckoutState::SearchingCurrency { results, .. } => results,
            _ => &[],
        }
    }

    /// `SearchingCurrency | ValidatingAmount -> ValidatingAmount`.
    ///
    /// Any validation already in flight becomes stale.
    pub fn begin_validation(&mut self, ticker: Ticker) -> Result<Ticket<ValidationRequest>> {
        self.require(
            "select a currency",
            &[Step::SearchingCurrency, Step::ValidatingAmount],
        )?;
        self.dispatch(CheckoutEvent::CurrencySelected(ticker.clone()));
        Ok(self.next_ticket(ValidationRequest {
            ticker,
            amount: self.context.amount,
            currency: self.context.currency.clone(),
        }))
    }

    /// `DetailsReady -> CreatingInvoice`.
    pub fn begin_invoice(&mut self) -> Result<Ticket<InvoiceDraft>> {
        self.require("confirm the payment", &[Step::DetailsReady])?;
        let details = match self.state.details() {
            Some(details) => details.clone(),
            None => {
                return Err(CheckoutError::InvalidStep {
                    action: "confirm the payment",
                    step: self.state.step().as_str(),
                });
            }
        };
        self.dispatch(CheckoutEvent::Confirmed);
        Ok(self.next_ticket(InvoiceDraft {
            reference: self.context.reference.clone(),
            details,
        }))
    }

    /// Back to currency search, discarding every amount computed so far.
    pub fn change_currency(&mut self) -> Result<()> {
        self.require(
            "change currency",
            &[Step::ValidatingAmount, Step::DetailsReady],
        )?;
        self.epoch += 1;
        self.dispatch(CheckoutEvent::ChangeCurrency);
        Ok(())
    }

    /// Returns to `Idle` from any non-terminal step and cancels in-flight work.
    pub fn reset(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(CheckoutError::InvalidStep {
                action: "reset the crypto flow",
                step: self.state.step().as_str(),
            });
        }
        self.epoch += 1;
        self.dispatch(CheckoutEvent::Reset);
        Ok(())
    }

    /// Applies an effect's result unless the checkout has moved on since the
    /// ticket was issued.
    pub fn apply(&mut self, completion: Completion) -> Applied {
        if completion.epoch != self.epoch {
            debug!(
                reference = %self.context.reference,
                ticket = completion.epoch,
                current = self.epoch,
                "Discarding stale gateway result"
            );
            return Applied::Discarded;
        }
        self.dispatch(completion.event);
        Applied::Applied
    }

    /// Runs the capability check to completion.
    pub async fn request_crypto(&mut self, effects: &CheckoutEffects) -> Result<Step> {
        let ticket = self.begin_capability_check()?;
        let completion = effects.check_capability(ticket).await;
        self.apply(completion);
        Ok(self.step())
    }

    /// Types `query` as a single keystroke and applies its debounced result.
    pub async fn search(&mut self, effects: &CheckoutEffects, query: &str) -> Result<Vec<Ticker>> {
        self.set_query(query)?;
        let completion = effects.search_index().begin(query).run().await;
        self.finish_search(completion);
        Ok(self.search_results().to_vec())
    }

    /// Selects `ticker` and runs amount validation to completion.
    pub async fn select_currency(&mut self, effects: &CheckoutEffects, ticker: Ticker) -> Result<Step> {
        let ticket = self.begin_validation(ticker)?;
        let completion = effects.validate_amount(ticket).await;
        self.apply(completion);
        Ok(self.step())
    }

    /// Confirms the displayed details and creates the invoice.
    pub async fn confirm(&mut self, effects: &CheckoutEffects) -> Result<Step> {
        let ticket = self.begin_invoice()?;
        let completion = effects.create_invoice(ticket).await;
        self.apply(completion);
        Ok(self.step())
    }
}
