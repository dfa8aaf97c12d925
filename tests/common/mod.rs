// Common test utilities and helpers

use chrono::{DateTime, Duration, Utc};
use paper_trading_bot::{Config, Quote};
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a test configuration with sensible defaults
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.trading.symbol = "BTC-USDT".to_string();
    config.trading.starting_capital = 10_000.0;
    config.trading.trade_stake = 1_000.0;
    config.trading.maker_fee_bps = 0.0;
    config.trading.taker_fee_bps = 0.0;
    config.trading.order_ttl_quotes = 3;
    config.db_path = String::new();
    config
}

/// Create a temporary directory for test databases
pub fn create_temp_db_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");
    (temp_dir, db_path)
}

/// A quote at the given mid with a fixed 0.2 spread
pub fn quote_at(mid: f64) -> Quote {
    Quote::new("BTC-USDT", mid - 0.1, mid + 0.1, Utc::now())
}

/// Generate a random walk of quotes for feeding the engine
pub fn generate_test_quotes(base_mid: f64, count: usize, volatility: f64) -> Vec<Quote> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let mut quotes = Vec::with_capacity(count);
    let mut mid = base_mid;
    let start = Utc::now() - Duration::minutes(count as i64);

    for i in 0..count {
        let change_pct = rng.gen_range(-volatility..volatility);
        mid *= 1.0 + change_pct;
        let timestamp: DateTime<Utc> = start + Duration::minutes(i as i64);
        quotes.push(Quote::new(
            "BTC-USDT",
            mid * 0.9995,
            mid * 1.0005,
            timestamp,
        ));
    }

    quotes
}
