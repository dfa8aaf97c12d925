// Kraken WebSocket ticker feed
//
// Connects, subscribes to the ticker channel and forwards best bid/ask
// quotes to the runner. Disconnects are retried up to the configured number
// of attempts; the attempt counter resets after a successful message.

use crate::config::FeedConfig;
use crate::error::{TradingError, TradingResult};
use crate::feed::{kraken_pair, FeedEvent};
use crate::types::Quote;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};

pub struct KrakenWebSocketFeed {
    url: String,
    symbol: String,
    pair: String,
    max_reconnect_attempts: u32,
    reconnect_delay: Duration,
}

impl KrakenWebSocketFeed {
    pub fn new(config: &FeedConfig, symbol: &str) -> Self {
        Self {
            url: config.ws_url.clone(),
            symbol: symbol.to_string(),
            pair: kraken_pair(symbol),
            max_reconnect_attempts: config.max_reconnect_attempts,
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
        }
    }

    /// Run until the stop flag is raised or reconnect attempts are exhausted
    pub async fn run(
        self,
        tx: mpsc::Sender<FeedEvent>,
        mut stop: watch::Receiver<bool>,
    ) -> TradingResult<()> {
        let mut attempts: u32 = 0;

        loop {
            if *stop.borrow() {
                return Ok(());
            }

            match self.session(&tx, &mut stop, &mut attempts).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempts += 1;
                    if attempts > self.max_reconnect_attempts {
                        return Err(TradingError::FeedConnection(format!(
                            "gave up after {} reconnect attempts: {}",
                            self.max_reconnect_attempts, e
                        )));
                    }

                    warn!(
                        attempt = attempts,
                        max = self.max_reconnect_attempts,
                        error = %e,
                        "🔄 feed disconnected, reconnecting"
                    );
                    let _ = tx.send(FeedEvent::Error(e)).await;

                    tokio::select! {
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                        _ = stop.changed() => return Ok(()),
                    }
                }
            }
        }
    }

    /// One connect/subscribe/read cycle; Ok means a clean stop
    async fn session(
        &self,
        tx: &mpsc::Sender<FeedEvent>,
        stop: &mut watch::Receiver<bool>,
        attempts: &mut u32,
    ) -> TradingResult<()> {
        let (ws_stream, _) = connect_async(&self.url).await?;
        info!(url = %self.url, "✅ connected to Kraken WebSocket");

        let (mut sender, mut receiver) = ws_stream.split();

        let subscribe = json!({
            "event": "subscribe",
            "pair": [self.pair],
            "subscription": { "name": "ticker" }
        });
        sender.send(Message::Text(subscribe.to_string())).await?;
        info!(pair = %self.pair, "📡 subscribed to ticker");

        loop {
            tokio::select! {
                _ = stop.changed() => {
                    if *stop.borrow() {
                        let _ = sender.send(Message::Close(None)).await;
                        return Ok(());
                    }
                }
                message = receiver.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            *attempts = 0;
                            match self.handle_text(&text, tx).await {
                                Ok(()) => {}
                                Err(e) if matches!(e, TradingError::FeedParse(_)) => {
                                    // Malformed payloads are skipped, not fatal
                                    warn!(error = %e, "skipping malformed feed message");
                                    let _ = tx.send(FeedEvent::Error(e)).await;
                                }
                                Err(e) => return Err(e),
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            sender.send(Message::Pong(payload)).await?;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Err(TradingError::FeedDisconnected(
                                "server closed the connection".to_string(),
                            ));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                    }
                }
            }
        }
    }

    async fn handle_text(&self, text: &str, tx: &mpsc::Sender<FeedEvent>) -> TradingResult<()> {
        let value: Value = serde_json::from_str(text)?;

        // Status events carry an "event" key; ticker updates are arrays
        if let Some(event) = value.get("event").and_then(|e| e.as_str()) {
            debug!(event, "feed status event");
            return Ok(());
        }

        if let Some(quote) = parse_ticker(&value, &self.symbol) {
            if !quote.is_valid() {
                return Err(TradingError::FeedParse(format!(
                    "invalid quote bid={} ask={}",
                    quote.bid, quote.ask
                )));
            }
            if tx.send(FeedEvent::Quote(quote)).await.is_err() {
                // Runner hung up; treat as a stop
                return Err(TradingError::FeedDisconnected("runner closed the queue".to_string()));
            }
        }

        Ok(())
    }
}

/// Parse a Kraken ticker array message into a quote for the engine symbol
pub fn parse_ticker(data: &Value, symbol: &str) -> Option<Quote> {
    let channel_name = data.get(2).and_then(|v| v.as_str())?;
    if channel_name != "ticker" {
        return None;
    }

    let ticker = data.get(1)?;
    let bid = ticker
        .get("b")
        .and_then(|b| b.get(0))
        .and_then(|p| p.as_str())?
        .parse::<f64>()
        .ok()?;
    let ask = ticker
        .get("a")
        .and_then(|a| a.get(0))
        .and_then(|p| p.as_str())?
        .parse::<f64>()
        .ok()?;

    Some(Quote::new(symbol, bid, ask, Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ticker_message() {
        let msg = json!([
            340,
            {
                "a": ["50100.10000", 1, "1.000"],
                "b": ["50099.90000", 2, "2.000"],
                "c": ["50100.00000", "0.010"]
            },
            "ticker",
            "XBT/USDT"
        ]);

        let quote = parse_ticker(&msg, "BTC-USDT").unwrap();
        assert_eq!(quote.symbol, "BTC-USDT");
        assert_eq!(quote.bid, 50099.9);
        assert_eq!(quote.ask, 50100.1);
    }

    #[test]
    fn test_non_ticker_messages_ignored() {
        let status = json!({"event": "systemStatus", "status": "online"});
        assert!(parse_ticker(&status, "BTC-USDT").is_none());

        let heartbeat = json!({"event": "heartbeat"});
        assert!(parse_ticker(&heartbeat, "BTC-USDT").is_none());
    }

    #[test]
    fn test_malformed_ticker_ignored() {
        let msg = json!([340, {"a": "nope"}, "ticker", "XBT/USDT"]);
        assert!(parse_ticker(&msg, "BTC-USDT").is_none());
    }
}
