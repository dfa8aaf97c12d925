// Market data feeds
//
// Every feed pushes FeedEvents into a bounded channel owned by the runner
// and stops when asked via the shared watch flag. A feed returning Ok means
// it is exhausted (replay reached EOF, or the stop flag was raised); the
// runner treats the closed channel as a normal end of data.

pub mod replay;
pub mod rest;
pub mod websocket;

pub use replay::ReplayFeed;
pub use rest::RestPollingFeed;
pub use websocket::KrakenWebSocketFeed;

use crate::error::TradingError;
use crate::types::Quote;

/// What a feed delivers to the runner
#[derive(Debug)]
pub enum FeedEvent {
    Quote(Quote),
    /// A non-fatal feed problem the runner should know about (the feed
    /// itself decides whether to keep going)
    Error(TradingError),
}

/// Map an engine symbol like "BTC-USDT" to Kraken's pair notation
pub(crate) fn kraken_pair(symbol: &str) -> String {
    symbol.replace("BTC", "XBT").replace('-', "/")
}
