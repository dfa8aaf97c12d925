//! Unified error handling for the paper trading bot
//!
//! A single error type replaces Box<dyn Error> throughout the application
//! with context-rich, actionable error messages.

use std::fmt;
use std::io;

/// Main error type for the paper trading bot
#[derive(Debug)]
pub enum TradingError {
    // Configuration errors
    ConfigNotFound(String),
    ConfigParse(String),
    ConfigValidation(String),

    // Feed errors
    FeedConnection(String),
    FeedDisconnected(String),
    FeedParse(String),
    FeedTimeout(String),
    FeedExhausted,

    // Order errors
    OrderRejected(String),
    OrderNotFound(String),
    UnknownInstrument(String),
    InvalidQuantity(f64, String), // (quantity, reason)
    NoQuote(String),

    // Ledger errors
    LedgerInconsistent(String),

    // Strategy errors
    StrategyFailed(String),

    // Persistence errors
    DatabaseConnection(String),
    DatabaseQuery(String),
    DatabaseMigration(String),

    // IO errors
    FileNotFound(String),
    FileRead(String),
    FileWrite(String),

    // General errors
    Internal(String),
}

impl TradingError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TradingError::FeedConnection(_)
                | TradingError::FeedDisconnected(_)
                | TradingError::FeedTimeout(_)
        )
    }

    /// Get error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            TradingError::ConfigNotFound(_)
            | TradingError::ConfigParse(_)
            | TradingError::ConfigValidation(_) => "config",

            TradingError::FeedConnection(_)
            | TradingError::FeedDisconnected(_)
            | TradingError::FeedParse(_)
            | TradingError::FeedTimeout(_)
            | TradingError::FeedExhausted => "feed",

            TradingError::OrderRejected(_)
            | TradingError::OrderNotFound(_)
            | TradingError::UnknownInstrument(_)
            | TradingError::InvalidQuantity(_, _)
            | TradingError::NoQuote(_) => "order",

            TradingError::LedgerInconsistent(_) => "ledger",

            TradingError::StrategyFailed(_) => "strategy",

            TradingError::DatabaseConnection(_)
            | TradingError::DatabaseQuery(_)
            | TradingError::DatabaseMigration(_) => "database",

            TradingError::FileNotFound(_)
            | TradingError::FileRead(_)
            | TradingError::FileWrite(_) => "io",

            TradingError::Internal(_) => "internal",
        }
    }

    /// True for errors that are reported back to the caller as a rejection
    /// rather than terminating the run
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TradingError::OrderRejected(_)
                | TradingError::UnknownInstrument(_)
                | TradingError::InvalidQuantity(_, _)
                | TradingError::NoQuote(_)
        )
    }

    /// Get a user-friendly error message with helpful context
    pub fn user_message(&self) -> String {
        match self {
            TradingError::ConfigNotFound(path) => {
                format!(
                    "Configuration file not found: {}\n\n\
                    💡 Quick fix:\n\
                    1. Run: paper-bot init\n\
                    2. Edit config.toml\n\
                    3. Try again",
                    path
                )
            }
            TradingError::ConfigValidation(msg) => {
                format!(
                    "Configuration validation error: {}\n\n\
                    💡 Check config.toml for:\n\
                    - Positive starting capital and trade stake\n\
                    - Non-negative fee rates\n\
                    - A valid feed URL or replay file",
                    msg
                )
            }
            TradingError::UnknownInstrument(symbol) => {
                format!(
                    "Unknown instrument: {}\n\n\
                    💡 Register the instrument in config.toml under [trading]",
                    symbol
                )
            }
            TradingError::DatabaseConnection(msg) => {
                format!(
                    "Database connection failed: {}\n\n\
                    💡 Try:\n\
                    1. Run: paper-bot init\n\
                    2. Check data/ directory permissions",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for TradingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path)
            }
            TradingError::ConfigParse(msg) => {
                write!(f, "Configuration parse error: {}", msg)
            }
            TradingError::ConfigValidation(msg) => {
                write!(f, "Configuration validation error: {}", msg)
            }

            TradingError::FeedConnection(msg) => {
                write!(f, "Feed connection error: {}", msg)
            }
            TradingError::FeedDisconnected(msg) => {
                write!(f, "Feed disconnected: {}", msg)
            }
            TradingError::FeedParse(msg) => {
                write!(f, "Malformed feed message: {}", msg)
            }
            TradingError::FeedTimeout(msg) => {
                write!(f, "Feed timeout: {}", msg)
            }
            TradingError::FeedExhausted => {
                write!(f, "Feed exhausted")
            }

            TradingError::OrderRejected(msg) => {
                write!(f, "Order rejected: {}", msg)
            }
            TradingError::OrderNotFound(id) => {
                write!(f, "Order not found: {}", id)
            }
            TradingError::UnknownInstrument(symbol) => {
                write!(f, "Unknown instrument: {}", symbol)
            }
            TradingError::InvalidQuantity(qty, reason) => {
                write!(f, "Invalid quantity {}: {}", qty, reason)
            }
            TradingError::NoQuote(symbol) => {
                write!(f, "No quote available for {}", symbol)
            }

            TradingError::LedgerInconsistent(msg) => {
                write!(f, "Ledger inconsistency: {}", msg)
            }

            TradingError::StrategyFailed(msg) => {
                write!(f, "Strategy error: {}", msg)
            }

            TradingError::DatabaseConnection(msg) => {
                write!(f, "Database connection error: {}", msg)
            }
            TradingError::DatabaseQuery(msg) => {
                write!(f, "Database query error: {}", msg)
            }
            TradingError::DatabaseMigration(msg) => {
                write!(f, "Database migration error: {}", msg)
            }

            TradingError::FileNotFound(path) => {
                write!(f, "File not found: {}", path)
            }
            TradingError::FileRead(msg) => {
                write!(f, "File read error: {}", msg)
            }
            TradingError::FileWrite(msg) => {
                write!(f, "File write error: {}", msg)
            }

            TradingError::Internal(msg) => {
                write!(f, "Internal error: {}", msg)
            }
        }
    }
}

impl std::error::Error for TradingError {}

// Conversion implementations for common error types

impl From<io::Error> for TradingError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => TradingError::FileNotFound(err.to_string()),
            io::ErrorKind::PermissionDenied => TradingError::FileRead(err.to_string()),
            io::ErrorKind::TimedOut => TradingError::FeedTimeout(err.to_string()),
            io::ErrorKind::ConnectionRefused => TradingError::FeedConnection(err.to_string()),
            _ => TradingError::Internal(format!("IO error: {}", err)),
        }
    }
}

impl From<rusqlite::Error> for TradingError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => TradingError::DatabaseQuery(msg),
            rusqlite::Error::QueryReturnedNoRows => {
                TradingError::DatabaseQuery("Query returned no rows".to_string())
            }
            _ => TradingError::DatabaseQuery(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for TradingError {
    fn from(err: serde_json::Error) -> Self {
        TradingError::FeedParse(format!("JSON parse error: {}", err))
    }
}

impl From<toml::de::Error> for TradingError {
    fn from(err: toml::de::Error) -> Self {
        TradingError::ConfigParse(format!("TOML parse error: {}", err))
    }
}

impl From<reqwest::Error> for TradingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TradingError::FeedTimeout(err.to_string())
        } else if err.is_connect() {
            TradingError::FeedConnection(err.to_string())
        } else {
            TradingError::FeedDisconnected(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TradingError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TradingError::FeedConnection(err.to_string())
    }
}

impl From<crate::config::ConfigError> for TradingError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::FileRead(msg) => TradingError::FileRead(msg),
            ConfigError::FileWrite(msg) => TradingError::FileWrite(msg),
            ConfigError::Parse(msg) => TradingError::ConfigParse(msg),
            ConfigError::Serialize(msg) => TradingError::ConfigParse(msg),
            ConfigError::Validation(msg) => TradingError::ConfigValidation(msg),
        }
    }
}

impl From<String> for TradingError {
    fn from(msg: String) -> Self {
        TradingError::Internal(msg)
    }
}

impl From<&str> for TradingError {
    fn from(msg: &str) -> Self {
        TradingError::Internal(msg.to_string())
    }
}

/// Result type alias using TradingError
pub type TradingResult<T> = Result<T, TradingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TradingError::ConfigNotFound("config.toml".to_string());
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_error_category() {
        let err = TradingError::ConfigValidation("test".to_string());
        assert_eq!(err.category(), "config");

        let err = TradingError::FeedDisconnected("test".to_string());
        assert_eq!(err.category(), "feed");

        let err = TradingError::UnknownInstrument("XYZ".to_string());
        assert_eq!(err.category(), "order");
    }

    #[test]
    fn test_retryable() {
        let err = TradingError::FeedTimeout("test".to_string());
        assert!(err.is_retryable());

        let err = TradingError::ConfigNotFound("test".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_rejection_classification() {
        assert!(TradingError::InvalidQuantity(0.0, "non-positive".to_string()).is_rejection());
        assert!(TradingError::UnknownInstrument("XYZ".to_string()).is_rejection());
        assert!(!TradingError::StrategyFailed("boom".to_string()).is_rejection());
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "test");
        let trading_err: TradingError = io_err.into();
        assert!(matches!(trading_err, TradingError::FileNotFound(_)));
    }
}
