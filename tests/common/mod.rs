#![allow(dead_code)]

use async_trait::async_trait;
use booking_checkout::application::orchestrator::{CheckoutPorts, PaymentOrchestrator};
use booking_checkout::config::CheckoutConfig;
use booking_checkout::domain::booking::{Booking, BookingId};
use booking_checkout::domain::crypto::{CryptoInvoice, CurrencyDetails, InvoiceRequest};
use booking_checkout::domain::money::{Amount, CurrencyCode, Ticker};
use booking_checkout::domain::payment::{FiatPaymentData, FiatProvider};
use booking_checkout::domain::ports::{
    BookingConfirmed, BookingNotifier, BookingStore, ClientPaymentResult, CryptoGateway,
    ExchangeRateSource, FiatGateway,
};
use booking_checkout::error::{CheckoutError, GatewayError};
use booking_checkout::infrastructure::in_memory::InMemoryBookingStore;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub fn booking(id: &str, amount: Decimal, currency: &str) -> Booking {
    Booking::new(
        BookingId::new(id).unwrap(),
        Amount::new(amount).unwrap(),
        CurrencyCode::new(currency).unwrap(),
    )
}

pub fn ticker(symbol: &str) -> Ticker {
    Ticker::new(symbol).unwrap()
}

pub fn id(raw: &str) -> BookingId {
    BookingId::new(raw).unwrap()
}

#[derive(Default)]
pub struct Counter(AtomicUsize);

impl Counter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Card/bank gateway whose answers are scripted per test.
pub struct FakeFiatGateway {
    pub client_result: Mutex<Result<String, GatewayError>>,
    pub init_result: Mutex<Result<Url, GatewayError>>,
    pub verify_status: Mutex<Result<String, GatewayError>>,
    pub client_calls: Counter,
    pub init_calls: Counter,
    pub verify_calls: Counter,
    pub last_payment: Mutex<Option<(FiatProvider, FiatPaymentData)>>,
}

impl Default for FakeFiatGateway {
    fn default() -> Self {
        Self {
            client_result: Mutex::new(Err(GatewayError::Unavailable(
                "client channel closed".to_string(),
            ))),
            init_result: Mutex::new(Ok(
                Url::parse("https://checkout.paystack.example/authorize/abc").unwrap()
            )),
            verify_status: Mutex::new(Ok("pending".to_string())),
            client_calls: Counter::default(),
            init_calls: Counter::default(),
            verify_calls: Counter::default(),
            last_payment: Mutex::new(None),
        }
    }
}

impl FakeFiatGateway {
    pub fn client_reports(&self, status: &str) {
        *self.client_result.lock().unwrap() = Ok(status.to_string());
    }

    pub fn server_reports(&self, status: &str) {
        *self.verify_status.lock().unwrap() = Ok(status.to_string());
    }

    pub fn server_fails(&self, error: GatewayError) {
        *self.verify_status.lock().unwrap() = Err(error);
    }
}

#[async_trait]
impl FiatGateway for FakeFiatGateway {
    async fn check_client_payment(
        &self,
        payment: &FiatPaymentData,
        provider: FiatProvider,
    ) -> Result<ClientPaymentResult, GatewayError> {
        self.client_calls.hit();
        *self.last_payment.lock().unwrap() = Some((provider, payment.clone()));
        let status = self.client_result.lock().unwrap().clone()?;
        Ok(ClientPaymentResult {
            status,
            reference: payment.reference.clone(),
        })
    }

    async fn initialize_payment(
        &self,
        provider: FiatProvider,
        payment: &FiatPaymentData,
    ) -> Result<Url, GatewayError> {
        self.init_calls.hit();
        *self.last_payment.lock().unwrap() = Some((provider, payment.clone()));
        self.init_result.lock().unwrap().clone()
    }

    async fn verify(&self, _reference: &str) -> Result<String, GatewayError> {
        self.verify_calls.hit();
        self.verify_status.lock().unwrap().clone()
    }
}

/// Crypto gateway backed by a small in-memory catalogue.
///
/// Estimates are `amount * rate` where `rate` is crypto units per reference
/// currency unit.
pub struct FakeCryptoGateway {
    pub status: Mutex<Result<(), GatewayError>>,
    pub catalogue: Mutex<Vec<&'static str>>,
    pub minimums: Mutex<HashMap<String, Option<Decimal>>>,
    pub rates: Mutex<HashMap<String, Decimal>>,
    pub invoice_error: Mutex<Option<GatewayError>>,
    pub verify_status: Mutex<Result<String, GatewayError>>,
    pub details_delay: Mutex<Duration>,
    pub search_delay: Mutex<Duration>,
    pub search_queries: Mutex<Vec<String>>,
    pub invoice_requests: Mutex<Vec<InvoiceRequest>>,
    pub status_calls: Counter,
    pub details_calls: Counter,
    pub minimum_calls: Counter,
    pub estimate_calls: Counter,
    pub verify_calls: Counter,
}

impl Default for FakeCryptoGateway {
    fn default() -> Self {
        let minimums = HashMap::from([
            ("btc".to_string(), Some(dec!(5))),
            ("eth".to_string(), Some(dec!(3))),
            ("usdt".to_string(), Some(dec!(10))),
            ("usdc".to_string(), Some(dec!(1))),
        ]);
        let rates = HashMap::from([
            ("btc".to_string(), dec!(0.00001)),
            ("eth".to_string(), dec!(0.0003)),
            ("usdt".to_string(), dec!(1)),
            ("usdc".to_string(), dec!(1)),
        ]);
        Self {
            status: Mutex::new(Ok(())),
            catalogue: Mutex::new(vec!["btc", "bch", "eth", "usdt", "usdttrc20", "usdc"]),
            minimums: Mutex::new(minimums),
            rates: Mutex::new(rates),
            invoice_error: Mutex::new(None),
            verify_status: Mutex::new(Ok("waiting".to_string())),
            details_delay: Mutex::new(Duration::ZERO),
            search_delay: Mutex::new(Duration::ZERO),
            search_queries: Mutex::new(Vec::new()),
            invoice_requests: Mutex::new(Vec::new()),
            status_calls: Counter::default(),
            details_calls: Counter::default(),
            minimum_calls: Counter::default(),
            estimate_calls: Counter::default(),
            verify_calls: Counter::default(),
        }
    }
}

impl FakeCryptoGateway {
    pub fn search_calls(&self) -> usize {
        self.search_queries.lock().unwrap().len()
    }

    pub fn invoice_calls(&self) -> usize {
        self.invoice_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CryptoGateway for FakeCryptoGateway {
    async fn check_status(&self) -> Result<(), GatewayError> {
        self.status_calls.hit();
        self.status.lock().unwrap().clone()
    }

    async fn search_currencies(&self, query: &str) -> Result<Vec<Ticker>, GatewayError> {
        self.search_queries.lock().unwrap().push(query.to_string());
        let delay = *self.search_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        let catalogue = self.catalogue.lock().unwrap().clone();
        Ok(catalogue
            .into_iter()
            .filter(|symbol| symbol.contains(query))
            .map(ticker)
            .collect())
    }

    async fn get_currency_details(&self, ticker: &Ticker) -> Result<CurrencyDetails, GatewayError> {
        self.details_calls.hit();
        let delay = *self.details_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        let listed = self
            .catalogue
            .lock()
            .unwrap()
            .iter()
            .any(|symbol| *symbol == ticker.as_str());
        if !listed {
            return Err(GatewayError::Unsupported(ticker.to_string()));
        }
        Ok(CurrencyDetails {
            ticker: ticker.clone(),
            name: ticker.as_str().to_uppercase(),
            network: None,
        })
    }

    async fn get_minimum_amount(
        &self,
        _base: &CurrencyCode,
        ticker: &Ticker,
    ) -> Result<Option<Decimal>, GatewayError> {
        self.minimum_calls.hit();
        Ok(self
            .minimums
            .lock()
            .unwrap()
            .get(ticker.as_str())
            .copied()
            .flatten())
    }

    async fn get_estimate(
        &self,
        amount: Decimal,
        _base: &CurrencyCode,
        ticker: &Ticker,
    ) -> Result<Decimal, GatewayError> {
        self.estimate_calls.hit();
        let rate = self
            .rates
            .lock()
            .unwrap()
            .get(ticker.as_str())
            .copied()
            .ok_or_else(|| GatewayError::Unsupported(ticker.to_string()))?;
        Ok(amount * rate)
    }

    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<CryptoInvoice, GatewayError> {
        self.invoice_requests.lock().unwrap().push(request.clone());
        if let Some(error) = self.invoice_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(CryptoInvoice {
            id: "inv-1".to_string(),
            order_id: request.order_id.clone(),
            pay_amount: None,
            pay_currency: request.pay_currency.clone(),
            price_amount: request.price_amount,
            invoice_url: Url::parse("https://pay.crypto.example/invoice/inv-1").unwrap(),
            created_at: Utc::now(),
        })
    }

    async fn verify(&self, _reference: &str) -> Result<String, GatewayError> {
        self.verify_calls.hit();
        self.verify_status.lock().unwrap().clone()
    }
}

/// Fixed conversion table keyed by `(from, to)`.
pub struct FakeRates {
    pub rates: Mutex<HashMap<(String, String), Decimal>>,
    pub calls: Counter,
}

impl Default for FakeRates {
    fn default() -> Self {
        Self {
            rates: Mutex::new(HashMap::from([(
                ("NGN".to_string(), "USD".to_string()),
                dec!(0.00064),
            )])),
            calls: Counter::default(),
        }
    }
}

#[async_trait]
impl ExchangeRateSource for FakeRates {
    async fn get_rate(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Result<Decimal, GatewayError> {
        self.calls.hit();
        let key = (from.as_str().to_string(), to.as_str().to_string());
        let rate = self
            .rates
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .ok_or_else(|| GatewayError::Unsupported(format!("{from}->{to}")))?;
        Ok(amount * rate)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<BookingConfirmed>>,
    pub fail: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl BookingNotifier for RecordingNotifier {
    async fn booking_confirmed(&self, event: &BookingConfirmed) -> Result<(), CheckoutError> {
        self.events.lock().unwrap().push(event.clone());
        if *self.fail.lock().unwrap() {
            return Err(CheckoutError::InternalError(Box::new(std::io::Error::other(
                "mailer down",
            ))));
        }
        Ok(())
    }
}

/// Every fake behind one orchestrator, kept around for assertions.
pub struct Harness {
    pub store: Arc<InMemoryBookingStore>,
    pub fiat: Arc<FakeFiatGateway>,
    pub crypto: Arc<FakeCryptoGateway>,
    pub rates: Arc<FakeRates>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub async fn new(bookings: Vec<Booking>) -> Self {
        let store = Arc::new(InMemoryBookingStore::new());
        for booking in bookings {
            store.store(booking).await.unwrap();
        }
        Self {
            store,
            fiat: Arc::new(FakeFiatGateway::default()),
            crypto: Arc::new(FakeCryptoGateway::default()),
            rates: Arc::new(FakeRates::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn ports(&self) -> CheckoutPorts {
        CheckoutPorts {
            bookings: self.store.clone(),
            fiat: self.fiat.clone(),
            crypto: self.crypto.clone(),
            rates: self.rates.clone(),
            notifier: self.notifier.clone(),
        }
    }

    pub fn orchestrator(&self) -> PaymentOrchestrator {
        self.orchestrator_with(test_config())
    }

    pub fn orchestrator_with(&self, config: CheckoutConfig) -> PaymentOrchestrator {
        PaymentOrchestrator::new(self.ports(), config)
    }

    pub async fn booking(&self, raw: &str) -> Booking {
        self.store.get_booking(&id(raw)).await.unwrap().unwrap()
    }
}

pub fn test_config() -> CheckoutConfig {
    CheckoutConfig::builder()
        .callback_url("https://shop.example/payment-status")
        .build()
}
