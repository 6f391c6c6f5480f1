use booking_checkout::application::crypto_checkout::{CheckoutState, Step};
use booking_checkout::application::orchestrator::{
    CheckoutPorts, FiatCheckout, PaymentOrchestrator,
};
use booking_checkout::config::{CheckoutConfig, GatewayEndpoints};
use booking_checkout::domain::booking::BookingId;
use booking_checkout::domain::money::{CurrencyCode, Ticker};
use booking_checkout::domain::payment::{FiatProvider, PayerContact, PaymentMethod};
use booking_checkout::domain::ports::BookingStoreRef;
use booking_checkout::infrastructure::http::{
    HttpCryptoGateway, HttpExchangeRateSource, HttpFiatGateway,
};
use booking_checkout::infrastructure::in_memory::InMemoryBookingStore;
use booking_checkout::infrastructure::notifier::TracingNotifier;
use booking_checkout::interfaces::csv::{BookingReader, BookingWriter};
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Bookings CSV used to seed the store (id,amount,currency,status,payment_status,reference)
    #[arg(long, env = "CHECKOUT_BOOKINGS")]
    bookings: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "CHECKOUT_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Base URL of the card/bank payment backend
    #[arg(long, env = "CHECKOUT_FIAT_API")]
    fiat_api: Url,

    /// Base URL of the crypto payment gateway
    #[arg(long, env = "CHECKOUT_CRYPTO_API")]
    crypto_api: Url,

    /// Base URL of the exchange-rate service
    #[arg(long, env = "CHECKOUT_EXCHANGE_API")]
    exchange_api: Url,

    #[arg(long, env = "CHECKOUT_CRYPTO_API_KEY", hide_env_values = true)]
    crypto_api_key: Option<String>,

    #[arg(long, env = "CHECKOUT_FIAT_PROVIDER", value_enum, default_value_t = FiatProvider::Paystack)]
    provider: FiatProvider,

    /// Currency that crypto minimums and invoices are priced in
    #[arg(long, env = "CHECKOUT_REFERENCE_CURRENCY", default_value = "USD")]
    reference_currency: CurrencyCode,

    #[arg(long, env = "CHECKOUT_GATEWAY_TIMEOUT_SECS", default_value_t = 15)]
    gateway_timeout_secs: u64,

    #[arg(long, env = "CHECKOUT_SEARCH_DEBOUNCE_MS", default_value_t = 500)]
    search_debounce_ms: u64,

    #[arg(long, env = "CHECKOUT_REDIRECT_DELAY_MS", default_value_t = 2000)]
    redirect_delay_ms: u64,

    /// Smallest booking, in the reference currency, that crypto can pay
    #[arg(long, env = "CHECKOUT_GATEWAY_FLOOR")]
    gateway_floor: Option<Decimal>,

    /// Return URL; the payment reference is appended as `?reference=`
    #[arg(long, env = "CHECKOUT_CALLBACK_URL")]
    callback_url: Option<String>,

    #[arg(long, env = "CHECKOUT_CANCEL_URL")]
    cancel_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pay a booking by card or bank transfer
    Fiat {
        booking_id: BookingId,
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Pay a booking in cryptocurrency
    Crypto {
        booking_id: BookingId,
        /// Ticker or fragment to search for
        currency: String,
        /// Create the invoice after showing the amounts
        #[arg(long)]
        confirm: bool,
    },
    /// Reconcile a payment reference returned by a gateway
    Finalize { reference: String },
}

impl Cli {
    fn config(&self) -> CheckoutConfig {
        let mut builder = CheckoutConfig::builder()
            .reference_currency(self.reference_currency.clone())
            .gateway_timeout(Duration::from_secs(self.gateway_timeout_secs))
            .search_debounce(Duration::from_millis(self.search_debounce_ms))
            .redirect_delay(Duration::from_millis(self.redirect_delay_ms))
            .fiat_provider(self.provider);
        if let Some(floor) = self.gateway_floor {
            builder = builder.gateway_floor(floor);
        }
        if let Some(url) = &self.callback_url {
            builder = builder.callback_url(url.clone());
        }
        if let Some(url) = &self.cancel_url {
            builder = builder.cancel_url(url.clone());
        }
        builder.build()
    }

    fn endpoints(&self) -> GatewayEndpoints {
        GatewayEndpoints {
            fiat_api: self.fiat_api.clone(),
            crypto_api: self.crypto_api.clone(),
            exchange_api: self.exchange_api.clone(),
            crypto_api_key: self.crypto_api_key.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    let endpoints = cli.endpoints();
    let timeout = config.gateway_timeout;

    let bookings = open_store(cli.db_path.as_ref())?;
    if let Some(path) = &cli.bookings {
        let file = File::open(path).into_diagnostic()?;
        for booking in BookingReader::new(file).bookings() {
            match booking {
                Ok(booking) => bookings.store(booking).await.into_diagnostic()?,
                Err(e) => eprintln!("Error reading booking: {}", e),
            }
        }
    }

    let ports = CheckoutPorts {
        bookings: bookings.clone(),
        fiat: Arc::new(HttpFiatGateway::new(endpoints.fiat_api).with_timeout(timeout)),
        crypto: Arc::new(
            HttpCryptoGateway::new(endpoints.crypto_api, endpoints.crypto_api_key.as_deref())
                .with_timeout(timeout),
        ),
        rates: Arc::new(HttpExchangeRateSource::new(endpoints.exchange_api).with_timeout(timeout)),
        notifier: Arc::new(TracingNotifier),
    };
    let mut orchestrator = PaymentOrchestrator::new(ports, config);

    match cli.command {
        Command::Fiat {
            booking_id,
            email,
            name,
            phone,
        } => {
            orchestrator
                .choose_payment_method(&booking_id, PaymentMethod::Fiat)
                .await
                .into_diagnostic()?;
            let contact = PayerContact { email, name, phone };
            match orchestrator
                .handle_fiat_payment(contact)
                .await
                .into_diagnostic()?
            {
                FiatCheckout::Finalized(outcome) => println!("{outcome}"),
                FiatCheckout::StillProcessing { reference } => {
                    println!("still processing {reference}")
                }
                FiatCheckout::Redirect {
                    reference,
                    authorization_url,
                } => {
                    println!("reference: {reference}");
                    println!("redirect: {authorization_url}");
                }
            }
        }
        Command::Crypto {
            booking_id,
            currency,
            confirm,
        } => run_crypto(&mut orchestrator, &booking_id, &currency, confirm).await?,
        Command::Finalize { reference } => {
            let outcome = orchestrator
                .finalize_on_return(&reference)
                .await
                .into_diagnostic()?;
            eprintln!("{outcome}");

            let all = bookings.all_bookings().await.into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = BookingWriter::new(stdout.lock());
            writer.write_bookings(all).into_diagnostic()?;
        }
    }

    Ok(())
}

async fn run_crypto(
    orchestrator: &mut PaymentOrchestrator,
    booking_id: &BookingId,
    fragment: &str,
    confirm: bool,
) -> Result<()> {
    let reference = orchestrator
        .choose_payment_method(booking_id, PaymentMethod::Crypto)
        .await
        .into_diagnostic()?;
    println!("reference: {reference}");

    if orchestrator.request_crypto().await.into_diagnostic()? == Step::Unavailable {
        if let Some(CheckoutState::Unavailable { reason }) =
            orchestrator.crypto_checkout().map(|c| c.state())
        {
            println!("crypto payments unavailable: {reason}");
        }
        return Ok(());
    }

    let tickers = orchestrator
        .search_currency(fragment)
        .await
        .into_diagnostic()?;
    let wanted = fragment.trim().to_ascii_lowercase();
    let ticker: Ticker = tickers
        .iter()
        .find(|t| t.as_str() == wanted)
        .or_else(|| tickers.first())
        .cloned()
        .ok_or_else(|| miette!("No cryptocurrency matches '{fragment}'"))?;

    orchestrator
        .select_currency(ticker)
        .await
        .into_diagnostic()?;
    let Some(checkout) = orchestrator.crypto_checkout() else {
        return Ok(());
    };
    if let Some(notice) = checkout.state().notice() {
        println!("{notice}");
        return Ok(());
    }
    if let Some(details) = checkout.state().details() {
        let base = &details.conversion.to;
        let ticker = &details.currency.ticker;
        println!(
            "pay {} {ticker} for {} {base} (minimum {} {base}, about {} {ticker})",
            details.pay_estimate.crypto_amount.normalize(),
            details.conversion.amount_out.round_dp(2).normalize(),
            details.currency.minimum_amount.normalize(),
            details.minimum_estimate.crypto_amount.normalize(),
        );
    }
    if !confirm {
        return Ok(());
    }

    orchestrator.confirm_crypto().await.into_diagnostic()?;
    if let Some(notice) = orchestrator
        .crypto_checkout()
        .and_then(|c| c.state().notice())
    {
        println!("{notice}");
        return Ok(());
    }
    if let Some(redirect) = orchestrator.crypto_redirect() {
        println!("invoice created; redirecting in {:?}", redirect.delay);
        let url = redirect.wait().await;
        println!("redirect: {url}");
    }
    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<&PathBuf>) -> Result<BookingStoreRef> {
    use booking_checkout::infrastructure::rocksdb::RocksDbBookingStore;

    Ok(match db_path {
        Some(path) => Arc::new(RocksDbBookingStore::open(path).into_diagnostic()?),
        None => Arc::new(InMemoryBookingStore::new()),
    })
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<&PathBuf>) -> Result<BookingStoreRef> {
    if let Some(path) = db_path {
        tracing::warn!(
            path = %path.display(),
            "Built without the storage-rocksdb feature; using in-memory storage"
        );
    }
    Ok(Arc::new(InMemoryBookingStore::new()))
}
