//! reqwest-backed adapters for the remote payment APIs.

mod client;
pub mod crypto;
pub mod exchange;
pub mod fiat;

pub use client::JsonClient;
pub use crypto::HttpCryptoGateway;
pub use exchange::HttpExchangeRateSource;
pub use fiat::HttpFiatGateway;
