// REST polling feed
//
// Polls the Kraken public Ticker endpoint on a fixed interval. Quotes that
// have not moved since the last poll are dropped so the engine only sees
// fresh data. Transient HTTP failures are tolerated up to the configured
// number of consecutive attempts.

use crate::config::FeedConfig;
use crate::error::{TradingError, TradingResult};
use crate::feed::{kraken_pair, FeedEvent};
use crate::types::Quote;
use chrono::Utc;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

pub struct RestPollingFeed {
    client: reqwest::Client,
    base_url: String,
    symbol: String,
    pair: String,
    poll_interval: Duration,
    max_attempts: u32,
}

impl RestPollingFeed {
    pub fn new(config: &FeedConfig, symbol: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.rest_url.trim_end_matches('/').to_string(),
            symbol: symbol.to_string(),
            pair: kraken_pair(symbol).replace('/', ""),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_attempts: config.max_reconnect_attempts,
        }
    }

    pub async fn run(
        self,
        tx: mpsc::Sender<FeedEvent>,
        mut stop: watch::Receiver<bool>,
    ) -> TradingResult<()> {
        info!(pair = %self.pair, interval_ms = self.poll_interval.as_millis() as u64, "📡 REST polling started");

        let mut consecutive_failures: u32 = 0;
        let mut last_sent: Option<(f64, f64)> = None;

        loop {
            if *stop.borrow() {
                return Ok(());
            }

            match self.fetch_quote().await {
                Ok(quote) => {
                    consecutive_failures = 0;

                    // Unchanged top of book is not worth a queue slot
                    let key = (quote.bid, quote.ask);
                    if last_sent != Some(key) {
                        last_sent = Some(key);
                        if tx.send(FeedEvent::Quote(quote)).await.is_err() {
                            return Ok(());
                        }
                    } else {
                        debug!("quote unchanged, skipping");
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    if consecutive_failures > self.max_attempts {
                        return Err(TradingError::FeedConnection(format!(
                            "gave up after {} consecutive poll failures: {}",
                            self.max_attempts, e
                        )));
                    }
                    warn!(attempt = consecutive_failures, error = %e, "poll failed");
                    let _ = tx.send(FeedEvent::Error(e)).await;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = stop.changed() => {
                    if *stop.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn fetch_quote(&self) -> TradingResult<Quote> {
        let url = format!("{}/0/public/Ticker?pair={}", self.base_url, self.pair);
        let response = self.client.get(&url).send().await?;
        let body: Value = response.json().await?;

        if let Some(errors) = body.get("error").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                return Err(TradingError::FeedParse(format!("Kraken error: {:?}", errors)));
            }
        }

        let result = body
            .get("result")
            .and_then(|r| r.as_object())
            .ok_or_else(|| TradingError::FeedParse("missing result object".to_string()))?;

        // Kraken keys the result by its own pair alias; take the first entry
        let ticker = result
            .values()
            .next()
            .ok_or_else(|| TradingError::FeedParse("empty ticker result".to_string()))?;

        parse_rest_ticker(ticker, &self.symbol)
    }
}

fn parse_rest_ticker(ticker: &Value, symbol: &str) -> TradingResult<Quote> {
    let bid = ticker
        .get("b")
        .and_then(|b| b.get(0))
        .and_then(|p| p.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| TradingError::FeedParse("missing bid".to_string()))?;

    let ask = ticker
        .get("a")
        .and_then(|a| a.get(0))
        .and_then(|p| p.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| TradingError::FeedParse("missing ask".to_string()))?;

    let quote = Quote::new(symbol, bid, ask, Utc::now());
    if !quote.is_valid() {
        return Err(TradingError::FeedParse(format!(
            "invalid quote bid={} ask={}",
            bid, ask
        )));
    }

    Ok(quote)
}
