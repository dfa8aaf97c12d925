// Configuration management for the paper trading bot

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    pub symbol: String,
    pub tick_size: f64,
    pub lot_size: f64,
    pub starting_capital: f64,
    /// Notional committed per trade
    pub trade_stake: f64,
    pub maker_fee_bps: f64,
    pub taker_fee_bps: f64,
    /// Resting limit orders expire after this many quotes
    pub order_ttl_quotes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub ws_url: String,
    pub rest_url: String,
    /// Poll interval for the REST feed, in milliseconds
    pub poll_interval_ms: u64,
    pub max_reconnect_attempts: u32,
    /// Base delay between reconnect attempts, in milliseconds
    pub reconnect_delay_ms: u64,
    /// Bound on the runner's quote queue
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    /// Minimum position of price in the band channel before an entry (0..1)
    pub bb_channel_pos: f64,
    pub atr_period: usize,
    pub tp_atr_mult: f64,
    pub sl_atr_mult: f64,
}

/// Log-verbosity toggles; session persistence is governed by `db_path` alone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub enable_quote_logging: bool,
    pub enable_fill_logging: bool,
    pub enable_equity_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub trading: TradingConfig,
    pub feed: FeedConfig,
    pub strategy: StrategyConfig,
    pub logging: LoggingConfig,
    /// SQLite session store path; empty string disables persistence
    pub db_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trading: TradingConfig {
                symbol: "BTC-USDT".to_string(),
                tick_size: 0.1,
                lot_size: 0.0001,
                starting_capital: 2000.0,
                trade_stake: 2000.0,
                maker_fee_bps: 16.0,
                taker_fee_bps: 26.0,
                order_ttl_quotes: 3,
            },
            feed: FeedConfig {
                ws_url: "wss://ws.kraken.com".to_string(),
                rest_url: "https://api.kraken.com".to_string(),
                poll_interval_ms: 800,
                max_reconnect_attempts: 5,
                reconnect_delay_ms: 3000,
                queue_capacity: 1024,
            },
            strategy: StrategyConfig {
                macd_fast: 12,
                macd_slow: 26,
                macd_signal: 9,
                bb_period: 12,
                bb_std_dev: 2.0,
                bb_channel_pos: 0.6,
                atr_period: 14,
                tp_atr_mult: 1.0,
                sl_atr_mult: 0.25,
            },
            logging: LoggingConfig {
                enable_quote_logging: false,
                enable_fill_logging: true,
                enable_equity_logging: true,
            },
            db_path: "data/paperbot.db".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create default if file doesn't exist.
    /// A missing config is tolerated, not fatal.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            tracing::info!("📁 Created default config file: {}", path.as_ref().display());
            Ok(config)
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trading.symbol.trim().is_empty() {
            return Err(ConfigError::Validation("symbol must not be empty".to_string()));
        }

        if self.trading.tick_size <= 0.0 {
            return Err(ConfigError::Validation("tick_size must be positive".to_string()));
        }

        if self.trading.lot_size <= 0.0 {
            return Err(ConfigError::Validation("lot_size must be positive".to_string()));
        }

        if self.trading.starting_capital <= 0.0 {
            return Err(ConfigError::Validation("starting_capital must be positive".to_string()));
        }

        if self.trading.trade_stake <= 0.0 {
            return Err(ConfigError::Validation("trade_stake must be positive".to_string()));
        }

        if self.trading.trade_stake > self.trading.starting_capital {
            return Err(ConfigError::Validation(
                "trade_stake must not exceed starting_capital".to_string(),
            ));
        }

        if self.trading.maker_fee_bps < 0.0 || self.trading.taker_fee_bps < 0.0 {
            return Err(ConfigError::Validation("fee rates must be non-negative".to_string()));
        }

        if self.trading.order_ttl_quotes == 0 {
            return Err(ConfigError::Validation("order_ttl_quotes must be greater than 0".to_string()));
        }

        if self.feed.poll_interval_ms == 0 {
            return Err(ConfigError::Validation("poll_interval_ms must be greater than 0".to_string()));
        }

        if self.feed.queue_capacity == 0 {
            return Err(ConfigError::Validation("queue_capacity must be greater than 0".to_string()));
        }

        if self.strategy.macd_fast >= self.strategy.macd_slow {
            return Err(ConfigError::Validation(
                "macd_fast must be shorter than macd_slow".to_string(),
            ));
        }

        if self.strategy.bb_period < 2 {
            return Err(ConfigError::Validation("bb_period must be at least 2".to_string()));
        }

        if !(0.0..=1.0).contains(&self.strategy.bb_channel_pos) {
            return Err(ConfigError::Validation(
                "bb_channel_pos must be between 0 and 1".to_string(),
            ));
        }

        if self.strategy.tp_atr_mult <= 0.0 || self.strategy.sl_atr_mult <= 0.0 {
            return Err(ConfigError::Validation("ATR multipliers must be positive".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_stake_exceeding_capital_rejected() {
        let mut config = Config::default();
        config.trading.trade_stake = config.trading.starting_capital * 2.0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = Config::default();
        config.trading.order_ttl_quotes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_macd_periods_checked() {
        let mut config = Config::default();
        config.strategy.macd_fast = 30;
        assert!(config.validate().is_err());
    }
}
