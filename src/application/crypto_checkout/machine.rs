use crate::domain::crypto::{
    CryptoCurrency, CryptoEstimate, CryptoInvoice, ExchangeRateQuote,
};
use crate::domain::money::{CurrencyCode, Ticker};
use rust_decimal::Decimal;
use std::fmt;
use tracing::debug;

/// Name of a checkout state, without its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Idle,
    CheckingCapability,
    Unavailable,
    SearchingCurrency,
    ValidatingAmount,
    DetailsReady,
    CreatingInvoice,
    InvoiceCreated,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Idle => "idle",
            Step::CheckingCapability => "checking capability",
            Step::Unavailable => "unavailable",
            Step::SearchingCurrency => "searching currency",
            Step::ValidatingAmount => "validating amount",
            Step::DetailsReady => "details ready",
            Step::CreatingInvoice => "creating invoice",
            Step::InvoiceCreated => "invoice created",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything computed for one selected currency. Never reused for another.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountDetails {
    pub currency: CryptoCurrency,
    /// Booking total converted into the reference currency.
    pub conversion: ExchangeRateQuote,
    pub pay_estimate: CryptoEstimate,
    pub minimum_estimate: CryptoEstimate,
}

/// A user-facing message attached to a step.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    BelowMinimum {
        ticker: Ticker,
        minimum: Decimal,
        amount: Decimal,
        shortfall: Decimal,
        currency: CurrencyCode,
        suggestions: Vec<Ticker>,
    },
    BelowGatewayFloor {
        amount: Decimal,
        floor: Decimal,
        currency: CurrencyCode,
    },
    UnsupportedCurrency {
        ticker: Ticker,
    },
    Rejected {
        step: Step,
        message: String,
    },
    ServiceUnavailable {
        step: Step,
        message: String,
    },
}

impl Notice {
    /// Whether retrying the same input might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Notice::ServiceUnavailable { .. })
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::BelowMinimum {
                ticker,
                minimum,
                amount,
                shortfall,
                currency,
                suggestions,
            } => {
                write!(
                    f,
                    "{ticker} requires at least {} {currency}; this booking is {} {currency} ({} short).",
                    minimum.round_dp(2),
                    amount.round_dp(2),
                    shortfall.round_dp(2)
                )?;
                if !suggestions.is_empty() {
                    let names: Vec<String> = suggestions.iter().map(Ticker::to_string).collect();
                    write!(f, " Try a currency with a lower minimum such as {}.", names.join(" or "))?;
                }
                Ok(())
            }
            Notice::BelowGatewayFloor {
                amount,
                floor,
                currency,
            } => write!(
                f,
                "This booking ({} {currency}) is below the {} {currency} crypto payment floor. Please pay by card or bank transfer.",
                amount.round_dp(2),
                floor.round_dp(2)
            ),
            Notice::UnsupportedCurrency { ticker } => {
                write!(f, "{ticker} is not supported. Please pick a different currency.")
            }
            Notice::Rejected { step, message } => {
                write!(f, "The payment provider refused the request while {step}: {message}")
            }
            Notice::ServiceUnavailable { step, message } => write!(
                f,
                "The payment service is unavailable while {step} ({message}). Please try again."
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CheckoutState {
    #[default]
    Idle,
    CheckingCapability,
    Unavailable {
        reason: String,
    },
    SearchingCurrency {
        query: String,
        results: Vec<Ticker>,
        notice: Option<Notice>,
    },
    ValidatingAmount {
        ticker: Ticker,
    },
    DetailsReady {
        details: AmountDetails,
        notice: Option<Notice>,
    },
    CreatingInvoice {
        details: AmountDetails,
    },
    InvoiceCreated {
        details: AmountDetails,
        invoice: CryptoInvoice,
    },
}

impl CheckoutState {
    fn searching(notice: Option<Notice>) -> Self {
        CheckoutState::SearchingCurrency {
            query: String::new(),
            results: Vec::new(),
            notice,
        }
    }

    pub fn step(&self) -> Step {
        match self {
            CheckoutState::Idle => Step::Idle,
            CheckoutState::CheckingCapability => Step::CheckingCapability,
            CheckoutState::Unavailable { .. } => Step::Unavailable,
            CheckoutState::SearchingCurrency { .. } => Step::SearchingCurrency,
            CheckoutState::ValidatingAmount { .. } => Step::ValidatingAmount,
            CheckoutState::DetailsReady { .. } => Step::DetailsReady,
            CheckoutState::CreatingInvoice { .. } => Step::CreatingInvoice,
            CheckoutState::InvoiceCreated { .. } => Step::InvoiceCreated,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutState::Unavailable { .. } | CheckoutState::InvoiceCreated { .. }
        )
    }

    pub fn notice(&self) -> Option<&Notice> {
        match self {
            CheckoutState::SearchingCurrency { notice, .. }
            | CheckoutState::DetailsReady { notice, .. } => notice.as_ref(),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&AmountDetails> {
        match self {
            CheckoutState::DetailsReady { details, .. }
            | CheckoutState::CreatingInvoice { details }
            | CheckoutState::InvoiceCreated { details, .. } => Some(details),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutEvent {
    CryptoRequested,
    CapabilityConfirmed,
    CapabilityFailed(String),
    QueryChanged(String),
    SearchCompleted { query: String, tickers: Vec<Ticker> },
    SearchFailed { query: String, notice: Notice },
    CurrencySelected(Ticker),
    AmountValidated(AmountDetails),
    AmountRejected(Notice),
    Confirmed,
    ChangeCurrency,
    InvoiceIssued(CryptoInvoice),
    InvoiceFailed(Notice),
    Reset,
}

/// Pure transition function of the crypto checkout.
///
/// Events that do not apply to the current state leave it unchanged.
pub fn transition(state: CheckoutState, event: CheckoutEvent) -> CheckoutState {
    use CheckoutEvent as E;
    use CheckoutState as S;

    match (state, event) {
        (state, E::Reset) if !state.is_terminal() => S::Idle,

        (S::Idle, E::CryptoRequested) => S::CheckingCapability,
        (S::CheckingCapability, E::CapabilityConfirmed) => S::searching(None),
        (S::CheckingCapability, E::CapabilityFailed(reason)) => S::Unavailable { reason },

        (S::SearchingCurrency { notice, .. }, E::QueryChanged(query)) => S::SearchingCurrency {
            query,
            results: Vec::new(),
            notice,
        },
        (S::SearchingCurrency { query, notice, .. }, E::SearchCompleted { query: q, tickers })
            if q == query =>
        {
            S::SearchingCurrency {
                query,
                results: tickers,
                notice,
            }
        }
        (S::SearchingCurrency { query, results, .. }, E::SearchFailed { query: q, notice })
            if q == query =>
        {
            S::SearchingCurrency {
                query,
                results,
                notice: Some(notice),
            }
        }

        // Selecting again while validating restarts validation for the new pick.
        (S::SearchingCurrency { .. } | S::ValidatingAmount { .. }, E::CurrencySelected(ticker)) => {
            S::ValidatingAmount { ticker }
        }
        (S::ValidatingAmount { ticker }, E::AmountValidated(details))
            if details.currency.ticker == ticker =>
        {
            S::DetailsReady {
                details,
                notice: None,
            }
        }
        (S::ValidatingAmount { .. }, E::AmountRejected(notice)) => S::searching(Some(notice)),

        (S::DetailsReady { details, .. }, E::Confirmed) => S::CreatingInvoice { details },
        (S::ValidatingAmount { .. } | S::DetailsReady { .. }, E::ChangeCurrency) => {
            S::searching(None)
        }

        (S::CreatingInvoice { details }, E::InvoiceIssued(invoice)) => {
            S::InvoiceCreated { details, invoice }
        }
        (S::CreatingInvoice { details }, E::InvoiceFailed(notice)) => S::DetailsReady {
            details,
            notice: Some(notice),
        },

        (state, event) => {
            debug!(step = %state.step(), ?event, "Ignoring event not applicable to step");
            state
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn ticker(t: &str) -> Ticker {
        Ticker::new(t).unwrap()
    }

    fn details(t: &str, usd: Decimal, crypto: Decimal) -> AmountDetails {
        let usd_code = CurrencyCode::new("USD").unwrap();
        AmountDetails {
            currency: CryptoCurrency {
                ticker: ticker(t),
                name: t.to_uppercase(),
                minimum_amount: dec!(1),
            },
            conversion: ExchangeRateQuote {
                from: CurrencyCode::new("NGN").unwrap(),
                to: usd_code,
                rate: dec!(0.00064),
                amount_in: dec!(50000),
                amount_out: usd,
            },
            pay_estimate: CryptoEstimate {
                ticker: ticker(t),
                fiat_amount: usd,
                crypto_amount: crypto,
            },
            minimum_estimate: CryptoEstimate {
                ticker: ticker(t),
                fiat_amount: dec!(1),
                crypto_amount: dec!(1),
            },
        }
    }

    fn invoice(t: &str) -> CryptoInvoice {
        CryptoInvoice {
            id: "inv-1".into(),
            order_id: "CRYPTO_bk-1_1".into(),
            pay_amount: Some(dec!(32)),
            pay_currency: ticker(t),
            price_amount: dec!(32),
            invoice_url: "https://pay.example/invoice/1".parse().unwrap(),
            created_at: Utc::now(),
        }
    }

    fn run(events: Vec<CheckoutEvent>) -> CheckoutState {
        events.into_iter().fold(CheckoutState::Idle, transition)
    }

    #[test]
    fn test_happy_path() {
        let state = run(vec![
            CheckoutEvent::CryptoRequested,
            CheckoutEvent::CapabilityConfirmed,
            CheckoutEvent::QueryChanged("us".into()),
            CheckoutEvent::SearchCompleted {
                query: "us".into(),
                tickers: vec![ticker("usdt"), ticker("usdc")],
            },
            CheckoutEvent::CurrencySelected(ticker("usdt")),
            CheckoutEvent::AmountValidated(details("usdt", dec!(32), dec!(32))),
        ]);
        assert_eq!(state.step(), Step::DetailsReady);

        let state = transition(state, CheckoutEvent::Confirmed);
        assert_eq!(state.step(), Step::CreatingInvoice);
        let state = transition(state, CheckoutEvent::InvoiceIssued(invoice("usdt")));
        assert_eq!(state.step(), Step::InvoiceCreated);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_capability_failure_is_terminal() {
        let state = run(vec![
            CheckoutEvent::CryptoRequested,
            CheckoutEvent::CapabilityFailed("503".into()),
        ]);
        assert_eq!(state.step(), Step::Unavailable);
        // Reset does not revive a terminal state.
        let state = transition(state, CheckoutEvent::Reset);
        assert_eq!(state.step(), Step::Unavailable);
    }

    #[test]
    fn test_rejection_returns_to_search_with_notice() {
        let notice = Notice::BelowMinimum {
            ticker: ticker("btc"),
            minimum: dec!(5),
            amount: dec!(0.32),
            shortfall: dec!(4.68),
            currency: CurrencyCode::new("USD").unwrap(),
            suggestions: vec![ticker("usdt"), ticker("usdc")],
        };
        let state = run(vec![
            CheckoutEvent::CryptoRequested,
            CheckoutEvent::CapabilityConfirmed,
            CheckoutEvent::CurrencySelected(ticker("btc")),
            CheckoutEvent::AmountRejected(notice.clone()),
        ]);
        assert_eq!(state.step(), Step::SearchingCurrency);
        assert_eq!(state.notice(), Some(&notice));
        assert_eq!(
            notice.to_string(),
            "BTC requires at least 5 USD; this booking is 0.32 USD (4.68 short). \
             Try a currency with a lower minimum such as USDT or USDC."
        );
    }

    #[test]
    fn test_change_currency_discards_details() {
        let state = run(vec![
            CheckoutEvent::CryptoRequested,
            CheckoutEvent::CapabilityConfirmed,
            CheckoutEvent::CurrencySelected(ticker("usdt")),
            CheckoutEvent::AmountValidated(details("usdt", dec!(32), dec!(32))),
            CheckoutEvent::ChangeCurrency,
        ]);
        assert_eq!(state.step(), Step::SearchingCurrency);
        assert!(state.details().is_none());
        assert!(state.notice().is_none());
    }

    #[test]
    fn test_details_for_other_currency_are_ignored() {
        let state = run(vec![
            CheckoutEvent::CryptoRequested,
            CheckoutEvent::CapabilityConfirmed,
            CheckoutEvent::CurrencySelected(ticker("usdt")),
            CheckoutEvent::CurrencySelected(ticker("btc")),
            CheckoutEvent::AmountValidated(details("usdt", dec!(32), dec!(32))),
        ]);
        assert_eq!(
            state,
            CheckoutState::ValidatingAmount {
                ticker: ticker("btc")
            }
        );
    }

    #[test]
    fn test_stale_search_results_are_ignored() {
        let state = run(vec![
            CheckoutEvent::CryptoRequested,
            CheckoutEvent::CapabilityConfirmed,
            CheckoutEvent::QueryChanged("bt".into()),
            CheckoutEvent::QueryChanged("us".into()),
            CheckoutEvent::SearchCompleted {
                query: "bt".into(),
                tickers: vec![ticker("btc")],
            },
        ]);
        match state {
            CheckoutState::SearchingCurrency { query, results, .. } => {
                assert_eq!(query, "us");
                assert!(results.is_empty());
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn test_invoice_failure_keeps_details() {
        let ready = details("usdt", dec!(32), dec!(32));
        let state = run(vec![
            CheckoutEvent::CryptoRequested,
            CheckoutEvent::CapabilityConfirmed,
            CheckoutEvent::CurrencySelected(ticker("usdt")),
            CheckoutEvent::AmountValidated(ready.clone()),
            CheckoutEvent::Confirmed,
            CheckoutEvent::InvoiceFailed(Notice::ServiceUnavailable {
                step: Step::CreatingInvoice,
                message: "timeout".into(),
            }),
        ]);
        assert_eq!(state.step(), Step::DetailsReady);
        assert_eq!(state.details(), Some(&ready));
        assert!(state.notice().unwrap().is_retryable());
    }

    #[test]
    fn test_reset_from_any_non_terminal_step() {
        for events in [
            vec![CheckoutEvent::CryptoRequested],
            vec![
                CheckoutEvent::CryptoRequested,
                CheckoutEvent::CapabilityConfirmed,
            ],
            vec![
                CheckoutEvent::CryptoRequested,
                CheckoutEvent::CapabilityConfirmed,
                CheckoutEvent::CurrencySelected(ticker("usdt")),
                CheckoutEvent::AmountValidated(details("usdt", dec!(32), dec!(32))),
                CheckoutEvent::Confirmed,
            ],
        ] {
            let state = transition(run(events), CheckoutEvent::Reset);
            assert_eq!(state, CheckoutState::Idle);
        }
    }

    #[test]
    fn test_confirm_outside_details_is_ignored() {
        let state = run(vec![
            CheckoutEvent::CryptoRequested,
            CheckoutEvent::CapabilityConfirmed,
            CheckoutEvent::Confirmed,
        ]);
        assert_eq!(state.step(), Step::SearchingCurrency);
    }
}
