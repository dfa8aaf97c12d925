// Replay feed
//
// Streams quotes from a CSV file with lines of the form
// `timestamp,symbol,bid,ask` (RFC 3339 timestamps, optional header).
// Reaching EOF is the normal end of a replay run. Pacing reproduces the
// recorded inter-quote gaps, capped so stale recordings do not stall a run.

use crate::error::{TradingError, TradingResult};
use crate::feed::FeedEvent;
use crate::types::Quote;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

const MAX_PACING_GAP: Duration = Duration::from_secs(5);

pub struct ReplayFeed {
    path: PathBuf,
    /// Sleep between quotes to mirror the recorded timestamps
    paced: bool,
}

impl ReplayFeed {
    pub fn new<P: AsRef<Path>>(path: P, paced: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            paced,
        }
    }

    pub async fn run(
        self,
        tx: mpsc::Sender<FeedEvent>,
        mut stop: watch::Receiver<bool>,
    ) -> TradingResult<()> {
        let file = File::open(&self.path).await.map_err(|e| {
            TradingError::FileNotFound(format!("{}: {}", self.path.display(), e))
        })?;
        info!(path = %self.path.display(), paced = self.paced, "▶️ replaying quotes");

        let mut lines = BufReader::new(file).lines();
        let mut previous_ts: Option<DateTime<Utc>> = None;
        let mut sent: u64 = 0;
        let mut skipped: u64 = 0;

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| TradingError::FileRead(e.to_string()))?
        {
            if *stop.borrow() {
                return Ok(());
            }

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("timestamp") {
                continue;
            }

            let quote = match parse_line(trimmed) {
                Ok(q) => q,
                Err(e) => {
                    skipped += 1;
                    warn!(error = %e, line = trimmed, "skipping malformed replay line");
                    let _ = tx.send(FeedEvent::Error(e)).await;
                    continue;
                }
            };

            if self.paced {
                if let Some(prev) = previous_ts {
                    let gap = (quote.timestamp - prev)
                        .to_std()
                        .unwrap_or(Duration::ZERO)
                        .min(MAX_PACING_GAP);
                    if !gap.is_zero() {
                        tokio::select! {
                            _ = tokio::time::sleep(gap) => {}
                            _ = stop.changed() => return Ok(()),
                        }
                    }
                }
            }
            previous_ts = Some(quote.timestamp);

            if tx.send(FeedEvent::Quote(quote)).await.is_err() {
                return Ok(());
            }
            sent += 1;
        }

        info!(sent, skipped, "✅ replay complete");
        Ok(())
    }
}

fn parse_line(line: &str) -> TradingResult<Quote> {
    let mut parts = line.split(',').map(str::trim);

    let timestamp = parts
        .next()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| TradingError::FeedParse("bad timestamp".to_string()))?;

    let symbol = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TradingError::FeedParse("missing symbol".to_string()))?;

    let bid = parts
        .next()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| TradingError::FeedParse("bad bid".to_string()))?;

    let ask = parts
        .next()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| TradingError::FeedParse("bad ask".to_string()))?;

    let quote = Quote::new(symbol, bid, ask, timestamp);
    if !quote.is_valid() {
        return Err(TradingError::FeedParse(format!(
            "invalid quote bid={} ask={}",
            bid, ask
        )));
    }

    Ok(quote)
}
