use super::bounded;
use crate::domain::money::Ticker;
use crate::domain::ports::CryptoGatewayRef;
use crate::error::{CheckoutError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Handle for one armed debounce period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceTicket(u64);

/// A cancellable quiet-window timer.
///
/// Each `start` supersedes every earlier ticket, so only the most recent
/// caller sees its window elapse.
#[derive(Debug)]
pub struct DebounceTimer {
    window: Duration,
    generation: AtomicU64,
}

impl DebounceTimer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            generation: AtomicU64::new(0),
        }
    }

    pub fn start(&self) -> DebounceTicket {
        DebounceTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Invalidates any armed ticket.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, ticket: DebounceTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.0
    }

    /// Waits out the quiet window. Returns `false` if the ticket was
    /// superseded or cancelled meanwhile.
    pub async fn elapsed(&self, ticket: DebounceTicket) -> bool {
        tokio::time::sleep(self.window).await;
        self.is_current(ticket)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The query is shorter than the minimum; nothing was sent.
    TooShort,
    /// A newer query (or a cancellation) replaced this one.
    Superseded,
    Results { query: String, tickers: Vec<Ticker> },
}

/// The answer to one keystroke's lookup, tagged with the query it was for.
#[derive(Debug)]
pub struct SearchCompletion {
    pub query: String,
    pub outcome: Result<SearchOutcome>,
}

/// A lookup armed by one keystroke.
///
/// Owns its index handle so it can run on another task while the buyer keeps
/// typing. Arming it already superseded every earlier keystroke.
pub struct PendingSearch {
    index: Arc<CurrencySearchIndex>,
    ticket: DebounceTicket,
    query: String,
}

impl PendingSearch {
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Waits out the quiet window and queries the gateway if still current.
    pub async fn run(self) -> SearchCompletion {
        let outcome = self.index.lookup(self.ticket, &self.query).await;
        SearchCompletion {
            query: self.query,
            outcome,
        }
    }
}

/// Debounced lookup of supported cryptocurrencies by ticker fragment.
pub struct CurrencySearchIndex {
    gateway: CryptoGatewayRef,
    timer: DebounceTimer,
    min_query_len: usize,
    timeout: Duration,
}

impl CurrencySearchIndex {
    pub fn new(
        gateway: CryptoGatewayRef,
        debounce: Duration,
        min_query_len: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            timer: DebounceTimer::new(debounce),
            min_query_len,
            timeout,
        }
    }

    /// Arms a lookup for `query`. Every keystroke supersedes pending
    /// searches, including short ones.
    pub fn begin(self: &Arc<Self>, query: &str) -> PendingSearch {
        PendingSearch {
            index: Arc::clone(self),
            ticket: self.timer.start(),
            query: normalize_query(query),
        }
    }

    /// Searches for `query` once the input has been quiet for the debounce
    /// window. Last request wins: a response for a query that has since been
    /// replaced is dropped, even if it arrives after the newer one.
    pub async fn search(&self, query: &str) -> Result<SearchOutcome> {
        let ticket = self.timer.start();
        self.lookup(ticket, &normalize_query(query)).await
    }

    async fn lookup(&self, ticket: DebounceTicket, query: &str) -> Result<SearchOutcome> {
        if query.chars().count() < self.min_query_len {
            return Ok(SearchOutcome::TooShort);
        }
        if !self.timer.elapsed(ticket).await {
            return Ok(SearchOutcome::Superseded);
        }

        let response = bounded(self.timeout, self.gateway.search_currencies(query)).await;
        if !self.timer.is_current(ticket) {
            debug!(%query, "Discarding stale currency search response");
            return Ok(SearchOutcome::Superseded);
        }
        let tickers = response.map_err(|e| CheckoutError::gateway("crypto", "search", e))?;
        debug!(%query, matches = tickers.len(), "Currency search completed");
        Ok(SearchOutcome::Results {
            query: query.to_string(),
            tickers,
        })
    }

    /// Drops any pending or in-flight search.
    pub fn cancel(&self) {
        self.timer.cancel();
    }
}

pub(crate) fn normalize_query(query: &str) -> String {
    query.trim().to_ascii_lowercase()
}
