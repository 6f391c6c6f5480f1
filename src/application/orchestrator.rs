use super::crypto_checkout::{
    Applied, CheckoutContext, CheckoutEffects, CryptoCheckout, Redirect, Step,
};
use super::fiat::{FiatInitOutcome, FiatPaymentAdapter};
use super::search::{PendingSearch, SearchCompletion};
use super::verification::PaymentVerificationService;
use super::with_reference;
use crate::config::CheckoutConfig;
use crate::domain::booking::{Booking, BookingId, PaymentStatus, PaymentTransition};
use crate::domain::money::Ticker;
use crate::domain::payment::{
    AttemptStatus, FiatPaymentData, PayerContact, PaymentAttempt, PaymentMethod,
    PaymentReference, VerificationOutcome,
};
use crate::domain::ports::{
    BookingConfirmed, BookingNotifierRef, BookingStoreRef, CryptoGatewayRef,
    ExchangeRateSourceRef, FiatGatewayRef,
};
use crate::error::{CheckoutError, ErrorKind, Result};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// The collaborators a checkout session talks to.
#[derive(Clone)]
pub struct CheckoutPorts {
    pub bookings: BookingStoreRef,
    pub fiat: FiatGatewayRef,
    pub crypto: CryptoGatewayRef,
    pub rates: ExchangeRateSourceRef,
    pub notifier: BookingNotifierRef,
}

/// How reconciling a returning buyer ended.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    /// The booking was settled by this call and a confirmation was emitted.
    Confirmed { reference: PaymentReference },
    /// The booking had already been settled. Nothing was changed or emitted.
    AlreadySettled { reference: PaymentReference },
    /// The gateway has not decided yet. The booking is untouched.
    StillProcessing { reference: PaymentReference },
    /// The gateway reported a failure. The booking may be paid with a new attempt.
    Failed { reference: PaymentReference },
}

impl fmt::Display for FinalizeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalizeOutcome::Confirmed { reference } => write!(f, "confirmed {reference}"),
            FinalizeOutcome::AlreadySettled { reference } => {
                write!(f, "already settled {reference}")
            }
            FinalizeOutcome::StillProcessing { reference } => {
                write!(f, "still processing {reference}")
            }
            FinalizeOutcome::Failed { reference } => write!(f, "failed {reference}"),
        }
    }
}

/// What the buyer sees after submitting contact details for a fiat payment.
#[derive(Debug, Clone, PartialEq)]
pub enum FiatCheckout {
    /// The client-side charge was verified and reconciled on the spot.
    Finalized(FinalizeOutcome),
    StillProcessing {
        reference: PaymentReference,
    },
    Redirect {
        reference: PaymentReference,
        authorization_url: url::Url,
    },
}

/// Coordinates one buyer's checkout of one booking.
///
/// Chooses the payment path, owns the active [`PaymentAttempt`] and its crypto
/// checkout, and is the only component that writes back to the booking store.
/// Every booking write is a conditional update, so a settled booking can never
/// be settled twice.
pub struct PaymentOrchestrator {
    bookings: BookingStoreRef,
    notifier: BookingNotifierRef,
    verifier: Arc<PaymentVerificationService>,
    fiat: FiatPaymentAdapter,
    effects: CheckoutEffects,
    config: CheckoutConfig,
    booking: Option<Booking>,
    attempt: Option<PaymentAttempt>,
    crypto: Option<CryptoCheckout>,
    last_reference_ms: i64,
}

impl PaymentOrchestrator {
    pub fn new(ports: CheckoutPorts, config: CheckoutConfig) -> Self {
        let verifier = Arc::new(PaymentVerificationService::new(
            ports.fiat.clone(),
            ports.crypto.clone(),
            config.gateway_timeout,
        ));
        let fiat = FiatPaymentAdapter::new(
            ports.fiat,
            verifier.clone(),
            config.fiat_provider,
            config.client_payment_timeout,
            config.gateway_timeout,
        );
        let effects = CheckoutEffects::new(ports.crypto, ports.rates, &config);
        Self {
            bookings: ports.bookings,
            notifier: ports.notifier,
            verifier,
            fiat,
            effects,
            config,
            booking: None,
            attempt: None,
            crypto: None,
            last_reference_ms: 0,
        }
    }

    pub fn attempt(&self) -> Option<&PaymentAttempt> {
        self.attempt.as_ref()
    }

    pub fn crypto_checkout(&self) -> Option<&CryptoCheckout> {
        self.crypto.as_ref()
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Starts a new payment attempt for `booking_id`.
    ///
    /// Any open attempt is abandoned first. A booking whose previous payment
    /// failed is reopened; completed or cancelled bookings are refused.
    #[instrument(skip(self), fields(booking = %booking_id))]
    pub async fn choose_payment_method(
        &mut self,
        booking_id: &BookingId,
        method: PaymentMethod,
    ) -> Result<PaymentReference> {
        let mut booking = self
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| CheckoutError::BookingNotFound(booking_id.clone()))?;
        if !booking.accepts_payment() {
            return Err(CheckoutError::BookingNotPayable {
                id: booking.id,
                status: booking.status,
                payment_status: booking.payment_status,
            });
        }

        self.abandon();

        if booking.payment_status == PaymentStatus::Failed {
            if self.bookings.reopen_payment(booking_id).await? {
                info!("Reopened booking after a failed payment");
            }
            booking.payment_status = PaymentStatus::Pending;
        }

        let reference = PaymentReference::new(method, booking.id.clone(), self.next_timestamp());
        let gateway = match method {
            PaymentMethod::Fiat => self.fiat.provider().as_str(),
            PaymentMethod::Crypto => "crypto",
        };
        if method == PaymentMethod::Crypto {
            self.crypto = Some(CryptoCheckout::new(CheckoutContext {
                reference: reference.clone(),
                amount: booking.amount,
                currency: booking.currency.clone(),
            }));
        }
        info!(%reference, gateway, "Payment attempt started");
        self.attempt = Some(PaymentAttempt::open(reference.clone(), gateway));
        self.booking = Some(booking);
        Ok(reference)
    }

    /// Marks the open attempt abandoned and drops any crypto checkout.
    ///
    /// Returns whether an open attempt existed.
    pub fn abandon(&mut self) -> bool {
        if let Some(checkout) = self.crypto.take() {
            self.effects.search_index().cancel();
            info!(reference = %checkout.context().reference, "Crypto checkout dropped");
        }
        match self.attempt.as_mut() {
            Some(attempt) if attempt.status == AttemptStatus::Open => {
                attempt.status = AttemptStatus::Abandoned;
                info!(reference = %attempt.reference, "Payment attempt abandoned");
                true
            }
            _ => false,
        }
    }

    /// Validates the buyer's contact details and starts the fiat payment for
    /// the open attempt.
    #[instrument(skip(self, contact))]
    pub async fn handle_fiat_payment(&mut self, contact: PayerContact) -> Result<FiatCheckout> {
        contact.validate()?;
        let (reference, booking) = self.open_attempt(PaymentMethod::Fiat, "pay by card or bank")?;
        let callback_url = self
            .config
            .callback_url
            .as_deref()
            .map(|url| with_reference(url, &reference.to_string()));
        let payment = FiatPaymentData::new(
            &reference,
            booking.amount,
            booking.currency.clone(),
            &contact,
            callback_url,
        );

        let initialized = match self.fiat.initialize(&payment).await {
            Ok(initialized) => initialized,
            Err(e) => {
                // A refusal ends this attempt; retrying needs a fresh reference.
                if e.kind() == ErrorKind::Terminal {
                    warn!(%reference, error = %e, "Provider refused the payment; attempt closed");
                    self.close_attempt(&reference, AttemptStatus::Failed);
                }
                return Err(e);
            }
        };
        match initialized {
            FiatInitOutcome::Verified { reference } => {
                let outcome = self.finalize_on_return(&reference.to_string()).await?;
                Ok(FiatCheckout::Finalized(outcome))
            }
            FiatInitOutcome::StillProcessing { reference } => {
                Ok(FiatCheckout::StillProcessing { reference })
            }
            FiatInitOutcome::Redirect {
                reference,
                authorization_url,
            } => Ok(FiatCheckout::Redirect {
                reference,
                authorization_url,
            }),
        }
    }

    /// Reconciles a payment once the buyer returns from a gateway.
    ///
    /// Only a server-side verification can settle a booking. Calling this
    /// again for an already settled booking reports `AlreadySettled` without
    /// verifying or notifying again. A reference for the booking of this
    /// session's open attempt must be that attempt's reference.
    #[instrument(skip(self))]
    pub async fn finalize_on_return(&mut self, reference: &str) -> Result<FinalizeOutcome> {
        let reference: PaymentReference = reference.trim().parse()?;
        if let Some(attempt) = self.attempt.as_ref()
            && attempt.status == AttemptStatus::Open
            && attempt.reference.booking_id() == reference.booking_id()
            && attempt.reference != reference
        {
            warn!(%reference, open = %attempt.reference, "Return for a superseded attempt");
            return Err(CheckoutError::ReferenceMismatch(reference.to_string()));
        }
        let booking_id = reference.booking_id().clone();
        let booking = self
            .bookings
            .get_booking(&booking_id)
            .await?
            .ok_or_else(|| CheckoutError::BookingNotFound(booking_id.clone()))?;

        if booking.payment_status == PaymentStatus::Completed {
            info!(%reference, "Booking already settled");
            return Ok(FinalizeOutcome::AlreadySettled { reference });
        }
        if !booking.accepts_payment() {
            return Err(CheckoutError::BookingNotPayable {
                id: booking.id,
                status: booking.status,
                payment_status: booking.payment_status,
            });
        }

        let key = reference.to_string();
        let verified = match self.verifier.verify(&reference).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%reference, error = %e, "Verification failed; marking payment failed");
                self.bookings
                    .update_payment_status(&booking_id, &PaymentTransition::fail(&key))
                    .await?;
                self.close_attempt(&reference, AttemptStatus::Failed);
                return Err(e);
            }
        };

        match verified {
            VerificationOutcome::Success => {
                // Settles from pending or from a failure recorded earlier.
                let settled = self
                    .bookings
                    .update_payment_status(&booking_id, &PaymentTransition::settle(&key))
                    .await?;
                if !settled {
                    info!(%reference, "Booking was settled concurrently");
                    return Ok(FinalizeOutcome::AlreadySettled { reference });
                }
                self.close_attempt(&reference, AttemptStatus::Succeeded);
                info!(%reference, "Booking confirmed");
                self.notify(&reference).await;
                Ok(FinalizeOutcome::Confirmed { reference })
            }
            VerificationOutcome::Pending => {
                info!(%reference, "Payment still processing");
                Ok(FinalizeOutcome::StillProcessing { reference })
            }
            VerificationOutcome::Failed => {
                self.bookings
                    .update_payment_status(&booking_id, &PaymentTransition::fail(&key))
                    .await?;
                self.close_attempt(&reference, AttemptStatus::Failed);
                warn!(%reference, "Payment failed");
                Ok(FinalizeOutcome::Failed { reference })
            }
        }
    }

    /// Runs the crypto capability check for the open crypto attempt.
    ///
    /// When the gateway is down the attempt is abandoned; a fiat attempt can
    /// still be started.
    pub async fn request_crypto(&mut self) -> Result<Step> {
        let checkout = self.crypto.as_mut().ok_or(CheckoutError::NoActiveAttempt)?;
        let step = checkout.request_crypto(&self.effects).await?;
        if step == Step::Unavailable {
            if let Some(attempt) = self.attempt.as_mut() {
                attempt.status = AttemptStatus::Abandoned;
            }
            warn!("Crypto payments unavailable; fiat remains open");
        }
        Ok(step)
    }

    /// Types `query` and waits for its own debounced result.
    pub async fn search_currency(&mut self, query: &str) -> Result<Vec<Ticker>> {
        let checkout = self.crypto.as_mut().ok_or(CheckoutError::NoActiveAttempt)?;
        checkout.search(&self.effects, query).await
    }

    /// Records one keystroke in the currency search box.
    ///
    /// The returned lookup may run on another task while typing continues;
    /// hand its completion to [`apply_search`](Self::apply_search). Within a
    /// burst only the last keystroke reaches the gateway.
    pub fn type_query(&mut self, query: &str) -> Result<PendingSearch> {
        let checkout = self.crypto.as_mut().ok_or(CheckoutError::NoActiveAttempt)?;
        checkout.set_query(query)?;
        Ok(self.effects.search_index().begin(query))
    }

    pub fn apply_search(&mut self, completion: SearchCompletion) -> Result<Applied> {
        let checkout = self.crypto.as_mut().ok_or(CheckoutError::NoActiveAttempt)?;
        Ok(checkout.finish_search(completion))
    }

    pub async fn select_currency(&mut self, ticker: Ticker) -> Result<Step> {
        let checkout = self.crypto.as_mut().ok_or(CheckoutError::NoActiveAttempt)?;
        checkout.select_currency(&self.effects, ticker).await
    }

    pub fn change_currency(&mut self) -> Result<()> {
        let checkout = self.crypto.as_mut().ok_or(CheckoutError::NoActiveAttempt)?;
        self.effects.search_index().cancel();
        checkout.change_currency()
    }

    /// Confirms the displayed amounts and creates the crypto invoice.
    pub async fn confirm_crypto(&mut self) -> Result<Step> {
        let checkout = self.crypto.as_mut().ok_or(CheckoutError::NoActiveAttempt)?;
        checkout.confirm(&self.effects).await
    }

    /// The delayed redirect to the invoice page, once an invoice exists.
    pub fn crypto_redirect(&self) -> Option<Redirect> {
        self.crypto
            .as_ref()
            .and_then(|checkout| checkout.redirect(self.config.redirect_delay))
    }

    /// Returns the crypto flow to its first step, discarding selection,
    /// amounts and any pending results.
    pub fn reset_crypto_flow(&mut self) -> Result<()> {
        let checkout = self.crypto.as_mut().ok_or(CheckoutError::NoActiveAttempt)?;
        self.effects.search_index().cancel();
        checkout.reset()
    }

    fn open_attempt(
        &self,
        method: PaymentMethod,
        action: &'static str,
    ) -> Result<(PaymentReference, &Booking)> {
        let attempt = self
            .attempt
            .as_ref()
            .filter(|attempt| attempt.status == AttemptStatus::Open)
            .ok_or(CheckoutError::NoActiveAttempt)?;
        if attempt.method != method {
            return Err(CheckoutError::InvalidStep {
                action,
                step: "crypto attempt",
            });
        }
        let booking = self.booking.as_ref().ok_or(CheckoutError::NoActiveAttempt)?;
        Ok((attempt.reference.clone(), booking))
    }

    fn close_attempt(&mut self, reference: &PaymentReference, status: AttemptStatus) {
        if let Some(attempt) = self.attempt.as_mut()
            && attempt.reference == *reference
            && attempt.status == AttemptStatus::Open
        {
            attempt.status = status;
        }
    }

    async fn notify(&self, reference: &PaymentReference) {
        let event = BookingConfirmed {
            booking_id: reference.booking_id().clone(),
            reference: reference.to_string(),
            method: reference.method(),
            confirmed_at: Utc::now(),
        };
        if let Err(e) = self.notifier.booking_confirmed(&event).await {
            error!(%reference, error = %e, "Failed to emit booking confirmation");
        }
    }

    /// Unix milliseconds, strictly increasing within this session so two quick
    /// attempts never share a reference.
    fn next_timestamp(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.last_reference_ms = now.max(self.last_reference_ms + 1);
        self.last_reference_ms
    }
}
